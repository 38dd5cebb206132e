use futures_util::{stream, Stream, TryStreamExt};
use serde::Deserialize;

use crate::{
    constants::RECIPE_BATCH_SIZE,
    error::ServiceError,
    schema::{Id, Recipe, RecipeCursor, RecipeFilter},
    session::Viewer,
    store::{RelationKind, Store},
    views::RecipeView,
};

use super::recipes::recipe_view;

/// Listing predicates as a caller asks for them. The viewer-relative flags
/// only take effect for authenticated viewers.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RecipeQuery {
    pub author: Option<Id>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorited: bool,
    #[serde(default)]
    pub is_in_shopping_cart: bool,
}

impl RecipeQuery {
    pub fn resolve(&self, viewer: &Viewer) -> RecipeFilter {
        let user_id = viewer.user_id();

        RecipeFilter {
            author: self.author,
            tags: self.tags.to_owned(),
            favorited_by: user_id.filter(|_| self.is_favorited),
            in_basket_of: user_id.filter(|_| self.is_in_shopping_cart),
        }
    }
}

struct Pager {
    filter: RecipeFilter,
    after: Option<RecipeCursor>,
    exhausted: bool,
}

/// Lazily streams every recipe matching `filter`, newest first.
///
/// Rows are fetched in keyset batches of [`RECIPE_BATCH_SIZE`], so recipes
/// created while the stream is being consumed never shift later batches.
/// Calling this again restarts from the newest recipe.
pub fn recipes<'a, S: Store>(
    filter: RecipeFilter,
    store: &'a S,
) -> impl Stream<Item = Result<Recipe, ServiceError>> + 'a {
    let pager = Pager {
        filter,
        after: None,
        exhausted: false,
    };

    stream::try_unfold(pager, move |pager| next_batch(pager, store))
        .map_ok(|batch| stream::iter(batch.into_iter().map(Ok::<_, ServiceError>)))
        .try_flatten()
}

async fn next_batch<S: Store>(
    mut pager: Pager,
    store: &S,
) -> Result<Option<(Vec<Recipe>, Pager)>, ServiceError> {
    if pager.exhausted {
        return Ok(None);
    }

    let batch = store
        .list_recipes(&pager.filter, pager.after.as_ref(), RECIPE_BATCH_SIZE)
        .await?;
    log::trace!("Fetched {} recipes after {:?}", batch.len(), pager.after);

    let last = match batch.last() {
        Some(last) => RecipeCursor::from(last),
        None => return Ok(None),
    };
    pager.exhausted = (batch.len() as i64) < RECIPE_BATCH_SIZE;
    pager.after = Some(last);

    Ok(Some((batch, pager)))
}

/// Streams viewer-relative views of the recipes matching `query`.
pub fn list_recipes<'a, S: Store>(
    query: &RecipeQuery,
    viewer: &'a Viewer,
    store: &'a S,
) -> impl Stream<Item = Result<RecipeView, ServiceError>> + 'a {
    recipes(query.resolve(viewer), store)
        .and_then(move |recipe| recipe_view(recipe, viewer, store))
}

/// Always `false` for anonymous viewers.
pub async fn is_favorited_by<S: Store>(
    recipe_id: Id,
    viewer: &Viewer,
    store: &S,
) -> Result<bool, ServiceError> {
    match viewer.user_id() {
        Some(user_id) => Ok(store
            .relation_exists(RelationKind::Favorite, user_id, recipe_id)
            .await?),
        None => Ok(false),
    }
}

/// Always `false` for anonymous viewers.
pub async fn is_in_basket_of<S: Store>(
    recipe_id: Id,
    viewer: &Viewer,
    store: &S,
) -> Result<bool, ServiceError> {
    match viewer.user_id() {
        Some(user_id) => Ok(store
            .relation_exists(RelationKind::Basket, user_id, recipe_id)
            .await?),
        None => Ok(false),
    }
}
