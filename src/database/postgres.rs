use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use super::{
    error::{QueryError, StoreError},
    schema::{
        ComponentLine, Id, NewProduct, NewUser, Product, Recipe, RecipeCursor, RecipeDraft,
        RecipeFilter, Tag, User,
    },
    store::{constraints, RelationKind, RelationSide, Store},
};

/// [`Store`] backed by PostgreSQL. Constraints and cascades live in
/// `migrations/`.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), QueryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| QueryError::new(format!("{e}")))?;

        Ok(())
    }
}

/// Escapes LIKE wildcards so user input is matched literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

async fn write_recipe_links(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    draft: &RecipeDraft,
) -> Result<(), StoreError> {
    if !draft.tags.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
        query_builder.push_values(draft.tags.iter(), |mut b, tag_id| {
            b.push_bind(recipe_id).push_bind(*tag_id);
        });
        query_builder.build().execute(&mut **tr).await?;
    }

    if !draft.components.is_empty() {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO components (recipe_id, product_id, amount) ");
        query_builder.push_values(draft.components.iter(), |mut b, component| {
            b.push_bind(recipe_id)
                .push_bind(component.product_id)
                .push_bind(component.amount);
        });
        query_builder.build().execute(&mut **tr).await?;
    }

    Ok(())
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let row: User = sqlx::query_as(
            "
            INSERT INTO users (username, email, first_name, last_name, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        ",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>, StoreError> {
        let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn delete_user(&self, id: Id) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, StoreError> {
        let row: Product = sqlx::query_as(
            "INSERT INTO products (name, measurement_unit) VALUES ($1, $2) RETURNING *",
        )
        .bind(&product.name)
        .bind(&product.measurement_unit)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn get_product(&self, id: Id) -> Result<Option<Product>, StoreError> {
        let row: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn list_products(&self, prefix: Option<&str>) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<Product> = match prefix {
            Some(prefix) => {
                sqlx::query_as(
                    "SELECT * FROM products WHERE LOWER(name) LIKE LOWER($1) || '%' ORDER BY name, measurement_unit",
                )
                .bind(escape_like(prefix))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM products ORDER BY name, measurement_unit")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows)
    }

    async fn insert_tag(&self, name: &str, color: &str, slug: &str) -> Result<Tag, StoreError> {
        let row: Tag =
            sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *")
                .bind(name)
                .bind(color)
                .bind(slug)
                .fetch_one(&self.pool)
                .await?;

        Ok(row)
    }

    async fn get_tag(&self, id: Id) -> Result<Option<Tag>, StoreError> {
        let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn insert_recipe(
        &self,
        author_id: Id,
        draft: &RecipeDraft,
    ) -> Result<Recipe, StoreError> {
        let mut tr = self.pool.begin().await?;

        let recipe: Recipe = sqlx::query_as(
            "
            INSERT INTO recipes (author_id, title, text, picture, cooking_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        ",
        )
        .bind(author_id)
        .bind(&draft.title)
        .bind(&draft.text)
        .bind(&draft.picture)
        .bind(draft.cooking_time)
        .fetch_one(&mut *tr)
        .await?;

        write_recipe_links(&mut tr, recipe.id, draft).await?;

        tr.commit().await?;
        Ok(recipe)
    }

    async fn replace_recipe(&self, id: Id, draft: &RecipeDraft) -> Result<Recipe, StoreError> {
        let mut tr = self.pool.begin().await?;

        let recipe: Option<Recipe> = sqlx::query_as(
            "
            UPDATE recipes SET title = $1, text = $2, picture = $3, cooking_time = $4
            WHERE id = $5
            RETURNING *
        ",
        )
        .bind(&draft.title)
        .bind(&draft.text)
        .bind(&draft.picture)
        .bind(draft.cooking_time)
        .bind(id)
        .fetch_optional(&mut *tr)
        .await?;

        let recipe = recipe.ok_or_else(|| StoreError::missing(constraints::RECIPES_PKEY))?;

        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tr)
            .await?;

        sqlx::query("DELETE FROM components WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tr)
            .await?;

        write_recipe_links(&mut tr, id, draft).await?;

        // Dropping `tr` on any error above rolls every statement back.
        tr.commit().await?;
        Ok(recipe)
    }

    async fn delete_recipe(&self, id: Id) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_recipe(&self, id: Id) -> Result<Option<Recipe>, StoreError> {
        let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn recipe_tags(&self, recipe_id: Id) -> Result<Vec<Tag>, StoreError> {
        let rows: Vec<Tag> = sqlx::query_as(
            "
            SELECT t.*
            FROM recipe_tags rt
            INNER JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = $1
            ORDER BY t.name
        ",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn recipe_components(&self, recipe_id: Id) -> Result<Vec<ComponentLine>, StoreError> {
        let rows: Vec<ComponentLine> = sqlx::query_as("
            SELECT p.id AS product_id, p.name AS name, p.measurement_unit AS measurement_unit, c.amount AS amount
            FROM components c
            INNER JOIN products p ON p.id = c.product_id
            WHERE c.recipe_id = $1
            ORDER BY p.name
        ")
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn list_recipes(
        &self,
        filter: &RecipeFilter,
        after: Option<&RecipeCursor>,
        limit: i64,
    ) -> Result<Vec<Recipe>, StoreError> {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT r.* FROM recipes r WHERE TRUE");

        if let Some(author) = filter.author {
            query_builder.push(" AND r.author_id = ").push_bind(author);
        }

        if !filter.tags.is_empty() {
            query_builder
                .push(
                    " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
                )
                .push_bind(filter.tags.clone())
                .push("))");
        }

        if let Some(user_id) = filter.favorited_by {
            query_builder
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }

        if let Some(user_id) = filter.in_basket_of {
            query_builder
                .push(" AND EXISTS (SELECT 1 FROM baskets b WHERE b.recipe_id = r.id AND b.user_id = ")
                .push_bind(user_id)
                .push(")");
        }

        if let Some(cursor) = after {
            query_builder
                .push(" AND (r.created_at, r.id) < (")
                .push_bind(cursor.created_at)
                .push(", ")
                .push_bind(cursor.id)
                .push(")");
        }

        query_builder
            .push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
            .push_bind(limit);

        let rows: Vec<Recipe> = query_builder
            .build_query_as::<Recipe>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn count_recipes_by_author(&self, author_id: Id) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn insert_relation(
        &self,
        kind: RelationKind,
        subject: Id,
        target: Id,
    ) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO {} ({}, {}) VALUES ($1, $2)",
            kind.table(),
            kind.subject_column(),
            kind.target_column()
        ))
        .bind(subject)
        .bind(target)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_relation(
        &self,
        kind: RelationKind,
        subject: Id,
        target: Id,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = $1 AND {} = $2",
            kind.table(),
            kind.subject_column(),
            kind.target_column()
        ))
        .bind(subject)
        .bind(target)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn relation_exists(
        &self,
        kind: RelationKind,
        subject: Id,
        target: Id,
    ) -> Result<bool, StoreError> {
        let row: (bool,) = sqlx::query_as(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1 AND {} = $2)",
            kind.table(),
            kind.subject_column(),
            kind.target_column()
        ))
        .bind(subject)
        .bind(target)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn count_relations(
        &self,
        kind: RelationKind,
        side: RelationSide,
        id: Id,
    ) -> Result<i64, StoreError> {
        let column = match side {
            RelationSide::Subject => kind.subject_column(),
            RelationSide::Target => kind.target_column(),
        };

        let count: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {} WHERE {column} = $1",
            kind.table()
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    async fn list_followees(&self, follower: Id) -> Result<Vec<User>, StoreError> {
        let rows: Vec<User> = sqlx::query_as(
            "
            SELECT u.*
            FROM follows f
            INNER JOIN users u ON u.id = f.followee_id
            WHERE f.follower_id = $1
            ORDER BY u.username
        ",
        )
        .bind(follower)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn basket_lines(&self, user_id: Id) -> Result<Vec<ComponentLine>, StoreError> {
        let rows: Vec<ComponentLine> = sqlx::query_as("
            SELECT p.id AS product_id, p.name AS name, p.measurement_unit AS measurement_unit, c.amount AS amount
            FROM baskets b
            INNER JOIN components c ON c.recipe_id = b.recipe_id
            INNER JOIN products p ON p.id = c.product_id
            WHERE b.user_id = $1
        ")
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
