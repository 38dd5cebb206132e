use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = i32;

#[derive(
    Clone, Copy, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default = "default_role")]
    pub role: UserRole,
}

fn default_role() -> UserRole {
    UserRole::User
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: Option<String>,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub title: String,
    pub text: String,
    pub picture: String,
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,
}

/// A recipe-product pair joined with the product's name and unit.
#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComponentLine {
    #[serde(rename = "id")]
    pub product_id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentDraft {
    #[serde(rename = "id")]
    pub product_id: Id,
    pub amount: i32,
}

/// Everything needed to create a recipe or replace its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDraft {
    pub title: String,
    pub text: String,
    pub picture: String,
    pub cooking_time: i32,
    pub tags: Vec<Id>,
    pub components: Vec<ComponentDraft>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Follow {
    pub follower_id: Id,
    pub followee_id: Id,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Favorite {
    pub user_id: Id,
    pub recipe_id: Id,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct BasketEntry {
    pub user_id: Id,
    pub recipe_id: Id,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShoppingListEntry {
    pub name: String,
    pub amount: i64,
    pub measurement_unit: String,
}

/// Store-level recipe predicates. All present predicates must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    /// Matches recipes carrying any of these tag slugs; empty means no tag filter.
    pub tags: Vec<String>,
    pub favorited_by: Option<Id>,
    pub in_basket_of: Option<Id>,
}

/// Keyset position in the newest-first recipe ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeCursor {
    pub created_at: DateTime<Utc>,
    pub id: Id,
}

impl From<&Recipe> for RecipeCursor {
    fn from(recipe: &Recipe) -> Self {
        Self {
            created_at: recipe.created_at,
            id: recipe.id,
        }
    }
}

impl RecipeCursor {
    /// True when `recipe` sorts strictly after this position.
    pub fn precedes(&self, recipe: &Recipe) -> bool {
        (recipe.created_at, recipe.id) < (self.created_at, self.id)
    }
}
