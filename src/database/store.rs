//! Persistence port.
//!
//! Services talk to storage only through [`Store`]. Adapters must enforce the
//! unique, check and foreign-key constraints listed in [`constraints`] and
//! report violations with the same constraint names, so a violation that
//! slips past a service pre-check still surfaces as the right typed error.

use async_trait::async_trait;

use super::{
    error::StoreError,
    schema::{
        ComponentLine, Id, NewProduct, NewUser, Product, Recipe, RecipeCursor, RecipeDraft,
        RecipeFilter, Tag, User,
    },
};

/// The three user-owned relation sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// follower -> followee
    Follow,
    /// user -> recipe
    Favorite,
    /// user -> recipe
    Basket,
}

impl RelationKind {
    pub fn table(&self) -> &'static str {
        match self {
            RelationKind::Follow => "follows",
            RelationKind::Favorite => "favorites",
            RelationKind::Basket => "baskets",
        }
    }

    pub fn subject_column(&self) -> &'static str {
        match self {
            RelationKind::Follow => "follower_id",
            RelationKind::Favorite | RelationKind::Basket => "user_id",
        }
    }

    pub fn target_column(&self) -> &'static str {
        match self {
            RelationKind::Follow => "followee_id",
            RelationKind::Favorite | RelationKind::Basket => "recipe_id",
        }
    }

    pub fn unique_constraint(&self) -> &'static str {
        match self {
            RelationKind::Follow => constraints::FOLLOWS_UNIQUE,
            RelationKind::Favorite => constraints::FAVORITES_UNIQUE,
            RelationKind::Basket => constraints::BASKETS_UNIQUE,
        }
    }

    pub fn target_constraint(&self) -> &'static str {
        match self {
            RelationKind::Follow => constraints::FOLLOWS_FOLLOWEE_FKEY,
            RelationKind::Favorite => constraints::FAVORITES_RECIPE_FKEY,
            RelationKind::Basket => constraints::BASKETS_RECIPE_FKEY,
        }
    }

    pub fn subject_constraint(&self) -> &'static str {
        match self {
            RelationKind::Follow => constraints::FOLLOWS_FOLLOWER_FKEY,
            RelationKind::Favorite => constraints::FAVORITES_USER_FKEY,
            RelationKind::Basket => constraints::BASKETS_USER_FKEY,
        }
    }
}

/// Which column of a relation a count is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationSide {
    Subject,
    Target,
}

pub mod constraints {
    pub const USERS_PKEY: &str = "users_pkey";
    pub const USERS_USERNAME_KEY: &str = "users_username_key";
    pub const USERS_EMAIL_KEY: &str = "users_email_key";
    pub const PRODUCTS_NAME_UNIT_KEY: &str = "products_name_unit_key";
    pub const TAGS_NAME_KEY: &str = "tags_name_key";
    pub const TAGS_SLUG_KEY: &str = "tags_slug_key";
    pub const TAGS_COLOR_HEX: &str = "tags_color_hex";
    pub const RECIPES_PKEY: &str = "recipes_pkey";
    pub const RECIPES_AUTHOR_FKEY: &str = "recipes_author_fkey";
    pub const RECIPES_COOKING_TIME_POSITIVE: &str = "recipes_cooking_time_positive";
    pub const RECIPE_TAGS_UNIQUE: &str = "recipe_tags_unique";
    pub const RECIPE_TAGS_TAG_FKEY: &str = "recipe_tags_tag_fkey";
    pub const COMPONENTS_UNIQUE: &str = "components_unique";
    pub const COMPONENTS_PRODUCT_FKEY: &str = "components_product_fkey";
    pub const COMPONENTS_AMOUNT_POSITIVE: &str = "components_amount_positive";
    pub const FOLLOWS_UNIQUE: &str = "follows_unique";
    pub const FOLLOWS_FOLLOWER_FKEY: &str = "follows_follower_fkey";
    pub const FOLLOWS_FOLLOWEE_FKEY: &str = "follows_followee_fkey";
    pub const FOLLOWS_NO_SELF: &str = "follows_no_self";
    pub const FAVORITES_UNIQUE: &str = "favorites_unique";
    pub const FAVORITES_USER_FKEY: &str = "favorites_user_fkey";
    pub const FAVORITES_RECIPE_FKEY: &str = "favorites_recipe_fkey";
    pub const BASKETS_UNIQUE: &str = "baskets_unique";
    pub const BASKETS_USER_FKEY: &str = "baskets_user_fkey";
    pub const BASKETS_RECIPE_FKEY: &str = "baskets_recipe_fkey";

    /// Human-readable name of whatever a constraint guards.
    pub fn describe(constraint: &str) -> &'static str {
        match constraint {
            USERS_USERNAME_KEY => "username",
            USERS_EMAIL_KEY => "email",
            PRODUCTS_NAME_UNIT_KEY => "product",
            TAGS_NAME_KEY => "tag name",
            TAGS_SLUG_KEY => "tag slug",
            TAGS_COLOR_HEX => "tag color",
            RECIPES_COOKING_TIME_POSITIVE => "cooking time",
            RECIPE_TAGS_UNIQUE => "recipe tag",
            COMPONENTS_UNIQUE => "recipe ingredient",
            COMPONENTS_AMOUNT_POSITIVE => "ingredient amount",
            FOLLOWS_UNIQUE => "subscription",
            FAVORITES_UNIQUE => "favorite",
            BASKETS_UNIQUE => "basket entry",
            RECIPE_TAGS_TAG_FKEY => "tag",
            COMPONENTS_PRODUCT_FKEY => "product",
            USERS_PKEY | RECIPES_AUTHOR_FKEY | FOLLOWS_FOLLOWER_FKEY | FOLLOWS_FOLLOWEE_FKEY
            | FAVORITES_USER_FKEY | BASKETS_USER_FKEY => "user",
            RECIPES_PKEY | FAVORITES_RECIPE_FKEY | BASKETS_RECIPE_FKEY => "recipe",
            _ => "record",
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError>;
    async fn get_user(&self, id: Id) -> Result<Option<User>, StoreError>;
    /// Deletes the user together with their recipes and every relation row naming them.
    async fn delete_user(&self, id: Id) -> Result<bool, StoreError>;

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, StoreError>;
    async fn get_product(&self, id: Id) -> Result<Option<Product>, StoreError>;
    /// Products ordered by name, optionally restricted to a case-insensitive name prefix.
    async fn list_products(&self, prefix: Option<&str>) -> Result<Vec<Product>, StoreError>;

    async fn insert_tag(&self, name: &str, color: &str, slug: &str) -> Result<Tag, StoreError>;
    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, StoreError>;
    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError>;

    /// Inserts the recipe with its tags and components in one unit of work.
    async fn insert_recipe(&self, author_id: Id, draft: &RecipeDraft)
        -> Result<Recipe, StoreError>;
    /// Replaces the recipe's fields, tag set and component list atomically.
    async fn replace_recipe(&self, id: Id, draft: &RecipeDraft) -> Result<Recipe, StoreError>;
    async fn delete_recipe(&self, id: Id) -> Result<bool, StoreError>;
    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, StoreError>;
    async fn recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, StoreError>;
    async fn recipe_components(&self, recipe_id: Id) -> Result<Vec<ComponentLine>, StoreError>;
    /// Up to `limit` matching recipes newest-first, strictly after `after` when given.
    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        after: Option<&RecipeCursor>,
        limit: i64,
    ) -> Result<Vec<Recipe>, StoreError>;
    async fn count_recipes_by_author(&self, author_id: Id) -> Result<i64, StoreError>;

    async fn insert_relation(
        &self,
        kind: RelationKind,
        subject: Id,
        target: Id,
    ) -> Result<(), StoreError>;
    async fn delete_relation(
        &self,
        kind: RelationKind,
        subject: Id,
        target: Id,
    ) -> Result<bool, StoreError>;
    async fn relation_exists(
        &self,
        kind: RelationKind,
        subject: Id,
        target: Id,
    ) -> Result<bool, StoreError>;
    async fn count_relations(
        &self,
        kind: RelationKind,
        side: RelationSide,
        id: Id,
    ) -> Result<i64, StoreError>;
    /// Users followed by `follower`, ordered by username.
    async fn list_followees(&self, follower: Id) -> Result<Vec<User>, StoreError>;
    /// Every component of every recipe in the user's basket, unaggregated.
    async fn basket_lines(&self, user_id: Id) -> Result<Vec<ComponentLine>, StoreError>;
}
