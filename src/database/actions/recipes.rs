use std::collections::HashSet;

use crate::{
    authentication::permissions::ActionType,
    constants::{MIN_COMPONENT_AMOUNT, MIN_COOKING_TIME, RECIPE_TITLE_MAX_LENGTH},
    error::ServiceError,
    schema::{Id, Recipe, RecipeDraft},
    session::{SessionData, Viewer},
    store::{RelationKind, Store},
    views::{RecipeView, UserView},
};

use super::queries::{is_favorited_by, is_in_basket_of};

/// Checks a draft against the write rules. Tag and product references are
/// looked up here so the caller gets a message naming the bad id; storage
/// constraints still back every rule.
pub async fn validate_draft<S: Store>(draft: &RecipeDraft, store: &S) -> Result<(), ServiceError> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(ServiceError::validation("Recipe name can't be empty"));
    }
    if title.chars().count() > RECIPE_TITLE_MAX_LENGTH {
        return Err(ServiceError::validation(format!(
            "Recipe name can't be longer than {RECIPE_TITLE_MAX_LENGTH} characters"
        )));
    }

    if draft.cooking_time < MIN_COOKING_TIME {
        return Err(ServiceError::validation(format!(
            "Cooking time must be at least {MIN_COOKING_TIME}"
        )));
    }

    if draft.tags.is_empty() {
        return Err(ServiceError::validation("Recipe needs at least one tag"));
    }
    let mut tags = HashSet::new();
    for tag_id in &draft.tags {
        if !tags.insert(*tag_id) {
            return Err(ServiceError::validation(format!("Tag {tag_id} is repeated")));
        }
        if store.get_tag(*tag_id).await?.is_none() {
            return Err(ServiceError::validation(format!("Tag {tag_id} doesn't exist")));
        }
    }

    if draft.components.is_empty() {
        return Err(ServiceError::validation(
            "Recipe needs at least one ingredient",
        ));
    }
    let mut products = HashSet::new();
    for component in &draft.components {
        let product_id = component.product_id;
        if !products.insert(product_id) {
            return Err(ServiceError::validation(format!(
                "Ingredient {product_id} is repeated"
            )));
        }
        if component.amount < MIN_COMPONENT_AMOUNT {
            return Err(ServiceError::validation(format!(
                "Amount of ingredient {product_id} must be at least {MIN_COMPONENT_AMOUNT}"
            )));
        }
        if store.get_product(product_id).await?.is_none() {
            return Err(ServiceError::validation(format!(
                "Ingredient {product_id} doesn't exist"
            )));
        }
    }

    Ok(())
}

pub async fn get_recipe<S: Store>(id: Id, store: &S) -> Result<Recipe, ServiceError> {
    store
        .get_recipe(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("recipe".to_owned()))
}

/// Fetches a recipe the session is allowed to modify: its own, or any with
/// [`ActionType::ManageAllRecipes`].
async fn get_recipe_mut<S: Store>(
    id: Id,
    session: &SessionData,
    store: &S,
) -> Result<Recipe, ServiceError> {
    let recipe = get_recipe(id, store).await?;
    session.authenticate_owner(
        recipe.author_id,
        ActionType::ManageOwnRecipes,
        ActionType::ManageAllRecipes,
    )?;

    Ok(recipe)
}

/// Builds the full viewer-relative representation of a stored recipe.
pub async fn recipe_view<S: Store>(
    recipe: Recipe,
    viewer: &Viewer,
    store: &S,
) -> Result<RecipeView, ServiceError> {
    let author = store
        .get_user(recipe.author_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("user".to_owned()))?;

    let is_subscribed = match viewer.user_id() {
        Some(user_id) => {
            store
                .relation_exists(RelationKind::Follow, user_id, author.id)
                .await?
        }
        None => false,
    };

    let tags = store.recipe_tags(recipe.id).await?;
    let ingredients = store.recipe_components(recipe.id).await?;
    let is_favorited = is_favorited_by(recipe.id, viewer, store).await?;
    let is_in_shopping_cart = is_in_basket_of(recipe.id, viewer, store).await?;

    Ok(RecipeView {
        id: recipe.id,
        tags,
        author: UserView::new(author, is_subscribed),
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.title,
        image: recipe.picture,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn get_recipe_view<S: Store>(
    id: Id,
    viewer: &Viewer,
    store: &S,
) -> Result<RecipeView, ServiceError> {
    let recipe = get_recipe(id, store).await?;
    recipe_view(recipe, viewer, store).await
}

pub async fn create_recipe<S: Store>(
    draft: &RecipeDraft,
    session: &SessionData,
    store: &S,
) -> Result<RecipeView, ServiceError> {
    session.authenticate(ActionType::CreateRecipes)?;
    validate_draft(draft, store).await?;

    let recipe = store.insert_recipe(session.user_id, draft).await?;
    log::info!(
        "User {} created recipe {} ({})",
        session.user_id,
        recipe.id,
        recipe.title
    );

    recipe_view(recipe, &Viewer::from(session.to_owned()), store).await
}

/// Replaces the recipe's fields, tags and ingredients in one unit of work.
pub async fn update_recipe<S: Store>(
    id: Id,
    draft: &RecipeDraft,
    session: &SessionData,
    store: &S,
) -> Result<RecipeView, ServiceError> {
    get_recipe_mut(id, session, store).await?;
    validate_draft(draft, store).await?;

    let recipe = store.replace_recipe(id, draft).await?;
    log::info!("User {} updated recipe {id}", session.user_id);

    recipe_view(recipe, &Viewer::from(session.to_owned()), store).await
}

pub async fn delete_recipe<S: Store>(
    id: Id,
    session: &SessionData,
    store: &S,
) -> Result<(), ServiceError> {
    get_recipe_mut(id, session, store).await?;

    if !store.delete_recipe(id).await? {
        return Err(ServiceError::NotFound("recipe".to_owned()));
    }
    log::info!("User {} deleted recipe {id}", session.user_id);

    Ok(())
}
