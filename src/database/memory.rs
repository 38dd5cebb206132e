use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{
    error::StoreError,
    schema::{
        ComponentLine, Id, NewProduct, NewUser, Product, Recipe, RecipeCursor, RecipeDraft,
        RecipeFilter, Tag, User,
    },
    store::{constraints, RelationKind, RelationSide, Store},
};

#[derive(Debug, Default)]
struct Tables {
    sequence: Id,
    users: BTreeMap<Id, User>,
    products: BTreeMap<Id, Product>,
    tags: BTreeMap<Id, Tag>,
    recipes: BTreeMap<Id, Recipe>,
    /// (recipe, tag)
    recipe_tags: BTreeSet<(Id, Id)>,
    /// (recipe, product) -> amount
    components: BTreeMap<(Id, Id), i32>,
    follows: BTreeSet<(Id, Id)>,
    favorites: BTreeSet<(Id, Id)>,
    baskets: BTreeSet<(Id, Id)>,
}

impl Tables {
    fn next_id(&mut self) -> Id {
        self.sequence += 1;
        self.sequence
    }

    fn relation(&self, kind: RelationKind) -> &BTreeSet<(Id, Id)> {
        match kind {
            RelationKind::Follow => &self.follows,
            RelationKind::Favorite => &self.favorites,
            RelationKind::Basket => &self.baskets,
        }
    }

    fn relation_mut(&mut self, kind: RelationKind) -> &mut BTreeSet<(Id, Id)> {
        match kind {
            RelationKind::Follow => &mut self.follows,
            RelationKind::Favorite => &mut self.favorites,
            RelationKind::Basket => &mut self.baskets,
        }
    }

    fn target_exists(&self, kind: RelationKind, target: Id) -> bool {
        match kind {
            RelationKind::Follow => self.users.contains_key(&target),
            RelationKind::Favorite | RelationKind::Basket => self.recipes.contains_key(&target),
        }
    }

    /// Checks every constraint a recipe write touches before anything is mutated.
    fn check_recipe_draft(&self, draft: &RecipeDraft) -> Result<(), StoreError> {
        if draft.cooking_time < 1 {
            return Err(StoreError::check(constraints::RECIPES_COOKING_TIME_POSITIVE));
        }

        let mut seen_tags = HashSet::new();
        for tag_id in &draft.tags {
            if !self.tags.contains_key(tag_id) {
                return Err(StoreError::missing(constraints::RECIPE_TAGS_TAG_FKEY));
            }
            if !seen_tags.insert(*tag_id) {
                return Err(StoreError::unique(constraints::RECIPE_TAGS_UNIQUE));
            }
        }

        let mut seen_products = HashSet::new();
        for component in &draft.components {
            if !self.products.contains_key(&component.product_id) {
                return Err(StoreError::missing(constraints::COMPONENTS_PRODUCT_FKEY));
            }
            if component.amount < 1 {
                return Err(StoreError::check(constraints::COMPONENTS_AMOUNT_POSITIVE));
            }
            if !seen_products.insert(component.product_id) {
                return Err(StoreError::unique(constraints::COMPONENTS_UNIQUE));
            }
        }

        Ok(())
    }

    fn write_recipe_links(&mut self, recipe_id: Id, draft: &RecipeDraft) {
        self.recipe_tags
            .extend(draft.tags.iter().map(|tag_id| (recipe_id, *tag_id)));
        self.components.extend(
            draft
                .components
                .iter()
                .map(|component| ((recipe_id, component.product_id), component.amount)),
        );
    }

    fn clear_recipe_links(&mut self, recipe_id: Id) {
        self.recipe_tags.retain(|(recipe, _)| *recipe != recipe_id);
        self.components.retain(|(recipe, _), _| *recipe != recipe_id);
    }

    fn cascade_recipe(&mut self, recipe_id: Id) -> bool {
        if self.recipes.remove(&recipe_id).is_none() {
            return false;
        }

        self.clear_recipe_links(recipe_id);
        self.favorites.retain(|(_, recipe)| *recipe != recipe_id);
        self.baskets.retain(|(_, recipe)| *recipe != recipe_id);
        true
    }

    fn component_lines(&self, recipe_id: Id) -> Vec<ComponentLine> {
        self.components
            .range((recipe_id, Id::MIN)..=(recipe_id, Id::MAX))
            .filter_map(|((_, product_id), amount)| {
                self.products.get(product_id).map(|product| ComponentLine {
                    product_id: product.id,
                    name: product.name.to_owned(),
                    measurement_unit: product.measurement_unit.to_owned(),
                    amount: *amount,
                })
            })
            .collect()
    }

    fn matches(&self, recipe: &Recipe, filter: &RecipeFilter) -> bool {
        if filter.author.is_some_and(|author| recipe.author_id != author) {
            return false;
        }

        if !filter.tags.is_empty() {
            let tagged = self
                .recipe_tags
                .range((recipe.id, Id::MIN)..=(recipe.id, Id::MAX))
                .filter_map(|(_, tag_id)| self.tags.get(tag_id))
                .any(|tag| filter.tags.contains(&tag.slug));
            if !tagged {
                return false;
            }
        }

        if let Some(user_id) = filter.favorited_by {
            if !self.favorites.contains(&(user_id, recipe.id)) {
                return false;
            }
        }

        if let Some(user_id) = filter.in_basket_of {
            if !self.baskets.contains(&(user_id, recipe.id)) {
                return false;
            }
        }

        true
    }
}

/// In-process [`Store`] that enforces the same constraints and cascades as
/// the PostgreSQL schema. Every operation runs under one lock, so each call
/// is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;

        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::unique(constraints::USERS_USERNAME_KEY));
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::unique(constraints::USERS_EMAIL_KEY));
        }

        let row = User {
            id: tables.next_id(),
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            first_name: user.first_name.to_owned(),
            last_name: user.last_name.to_owned(),
            role: user.role,
        };
        tables.users.insert(row.id, row.clone());

        Ok(row)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn delete_user(&self, id: Id) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;

        if tables.users.remove(&id).is_none() {
            return Ok(false);
        }

        let authored: Vec<Id> = tables
            .recipes
            .values()
            .filter(|recipe| recipe.author_id == id)
            .map(|recipe| recipe.id)
            .collect();
        for recipe_id in authored {
            tables.cascade_recipe(recipe_id);
        }

        tables
            .follows
            .retain(|(follower, followee)| *follower != id && *followee != id);
        tables.favorites.retain(|(user, _)| *user != id);
        tables.baskets.retain(|(user, _)| *user != id);

        Ok(true)
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, StoreError> {
        let mut tables = self.tables.lock().await;

        if tables.products.values().any(|p| {
            p.name == product.name && p.measurement_unit == product.measurement_unit
        }) {
            return Err(StoreError::unique(constraints::PRODUCTS_NAME_UNIT_KEY));
        }

        let row = Product {
            id: tables.next_id(),
            name: product.name.to_owned(),
            measurement_unit: product.measurement_unit.to_owned(),
        };
        tables.products.insert(row.id, row.clone());

        Ok(row)
    }

    async fn get_product(&self, id: Id) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn list_products(&self, prefix: Option<&str>) -> Result<Vec<Product>, StoreError> {
        let tables = self.tables.lock().await;
        let prefix = prefix.map(str::to_lowercase);

        let mut rows: Vec<Product> = tables
            .products
            .values()
            .filter(|product| match &prefix {
                Some(prefix) => product.name.to_lowercase().starts_with(prefix.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (&a.name, &a.measurement_unit).cmp(&(&b.name, &b.measurement_unit))
        });

        Ok(rows)
    }

    async fn insert_tag(&self, name: &str, color: &str, slug: &str) -> Result<Tag, StoreError> {
        let mut tables = self.tables.lock().await;

        if tables.tags.values().any(|tag| tag.name == name) {
            return Err(StoreError::unique(constraints::TAGS_NAME_KEY));
        }
        if tables.tags.values().any(|tag| tag.slug == slug) {
            return Err(StoreError::unique(constraints::TAGS_SLUG_KEY));
        }

        let row = Tag {
            id: tables.next_id(),
            name: name.to_owned(),
            color: color.to_owned(),
            slug: slug.to_owned(),
        };
        tables.tags.insert(row.id, row.clone());

        Ok(row)
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, StoreError> {
        Ok(self.tables.lock().await.tags.get(&id).cloned())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let tables = self.tables.lock().await;

        let mut rows: Vec<Tag> = tables.tags.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(rows)
    }

    async fn insert_recipe(
        &self,
        author_id: Id,
        draft: &RecipeDraft,
    ) -> Result<Recipe, StoreError> {
        let mut tables = self.tables.lock().await;

        if !tables.users.contains_key(&author_id) {
            return Err(StoreError::missing(constraints::RECIPES_AUTHOR_FKEY));
        }
        tables.check_recipe_draft(draft)?;

        let recipe = Recipe {
            id: tables.next_id(),
            author_id,
            title: draft.title.to_owned(),
            text: draft.text.to_owned(),
            picture: draft.picture.to_owned(),
            cooking_time: draft.cooking_time,
            created_at: Utc::now(),
        };
        tables.recipes.insert(recipe.id, recipe.clone());
        tables.write_recipe_links(recipe.id, draft);

        Ok(recipe)
    }

    async fn replace_recipe(&self, id: Id, draft: &RecipeDraft) -> Result<Recipe, StoreError> {
        let mut tables = self.tables.lock().await;

        if !tables.recipes.contains_key(&id) {
            return Err(StoreError::missing(constraints::RECIPES_PKEY));
        }
        tables.check_recipe_draft(draft)?;

        tables.clear_recipe_links(id);
        tables.write_recipe_links(id, draft);

        let recipe = tables
            .recipes
            .get_mut(&id)
            .ok_or_else(|| StoreError::missing(constraints::RECIPES_PKEY))?;
        recipe.title = draft.title.to_owned();
        recipe.text = draft.text.to_owned();
        recipe.picture = draft.picture.to_owned();
        recipe.cooking_time = draft.cooking_time;

        Ok(recipe.clone())
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.cascade_recipe(id))
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, StoreError> {
        Ok(self.tables.lock().await.recipes.get(&id).cloned())
    }

    async fn recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, StoreError> {
        let tables = self.tables.lock().await;

        let mut rows: Vec<Tag> = tables
            .recipe_tags
            .range((recipe_id, Id::MIN)..=(recipe_id, Id::MAX))
            .filter_map(|(_, tag_id)| tables.tags.get(tag_id).cloned())
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(rows)
    }

    async fn recipe_components(&self, recipe_id: Id) -> Result<Vec<ComponentLine>, StoreError> {
        let tables = self.tables.lock().await;

        let mut rows = tables.component_lines(recipe_id);
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(rows)
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        after: Option<&RecipeCursor>,
        limit: i64,
    ) -> Result<Vec<Recipe>, StoreError> {
        let tables = self.tables.lock().await;

        let mut rows: Vec<Recipe> = tables
            .recipes
            .values()
            .filter(|recipe| after.map_or(true, |cursor| cursor.precedes(recipe)))
            .filter(|recipe| tables.matches(recipe, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows.truncate(usize::try_from(limit).unwrap_or(0));

        Ok(rows)
    }

    async fn count_recipes_by_author(&self, author_id: Id) -> Result<i64, StoreError> {
        let tables = self.tables.lock().await;

        let count = tables
            .recipes
            .values()
            .filter(|recipe| recipe.author_id == author_id)
            .count();

        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn insert_relation(
        &self,
        kind: RelationKind,
        subject: Id,
        target: Id,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;

        if kind == RelationKind::Follow && subject == target {
            return Err(StoreError::check(constraints::FOLLOWS_NO_SELF));
        }
        if !tables.users.contains_key(&subject) {
            return Err(StoreError::missing(kind.subject_constraint()));
        }
        if !tables.target_exists(kind, target) {
            return Err(StoreError::missing(kind.target_constraint()));
        }
        if !tables.relation_mut(kind).insert((subject, target)) {
            return Err(StoreError::unique(kind.unique_constraint()));
        }

        Ok(())
    }

    async fn delete_relation(
        &self,
        kind: RelationKind,
        subject: Id,
        target: Id,
    ) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .relation_mut(kind)
            .remove(&(subject, target)))
    }

    async fn relation_exists(
        &self,
        kind: RelationKind,
        subject: Id,
        target: Id,
    ) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .lock()
            .await
            .relation(kind)
            .contains(&(subject, target)))
    }

    async fn count_relations(
        &self,
        kind: RelationKind,
        side: RelationSide,
        id: Id,
    ) -> Result<i64, StoreError> {
        let tables = self.tables.lock().await;

        let count = tables
            .relation(kind)
            .iter()
            .filter(|(subject, target)| match side {
                RelationSide::Subject => *subject == id,
                RelationSide::Target => *target == id,
            })
            .count();

        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn list_followees(&self, follower: Id) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.lock().await;

        let mut rows: Vec<User> = tables
            .follows
            .range((follower, Id::MIN)..=(follower, Id::MAX))
            .filter_map(|(_, followee)| tables.users.get(followee).cloned())
            .collect();
        rows.sort_by(|a, b| a.username.cmp(&b.username));

        Ok(rows)
    }

    async fn basket_lines(&self, user_id: Id) -> Result<Vec<ComponentLine>, StoreError> {
        let tables = self.tables.lock().await;

        Ok(tables
            .baskets
            .range((user_id, Id::MIN)..=(user_id, Id::MAX))
            .flat_map(|(_, recipe_id)| tables.component_lines(*recipe_id))
            .collect())
    }
}
