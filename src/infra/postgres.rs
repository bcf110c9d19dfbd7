use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;

use crate::domain::interaction::{ActivityEvent, ActivityKind, Comment, Like};
use crate::domain::product::{NewProduct, Product, ProductChanges};
use crate::domain::search::SearchPlan;
use crate::infra::db::Db;
use crate::infra::store::{CatalogStore, InteractionStore, MissingProduct};

const PRODUCT_SELECT: &str = "SELECT p.id, p.user_id, p.product_name, p.description, p.category, \
            p.product_condition, p.price, p.currency, p.country, p.city, p.shop_name, \
            p.contact_phone, p.quantity, p.shipping_available, p.local_pickup, p.video_url, \
            p.created_at, p.updated_at, \
            COALESCE((SELECT array_agg(i.image_url ORDER BY i.image_order) \
                      FROM product_images i WHERE i.product_id = p.id), ARRAY[]::text[]) AS images, \
            (SELECT COUNT(*) FROM product_likes l WHERE l.product_id = p.id) AS likes_count, \
            (SELECT COUNT(*) FROM product_comments c WHERE c.product_id = p.id) AS comments_count \
     FROM products p";

const COMMENT_SELECT: &str = "SELECT pc.id, pc.product_id, pc.user_id, pc.comment, pc.commented_at, \
            pc.updated_at, u.username, u.email \
     FROM product_comments pc \
     LEFT JOIN users u ON pc.user_id = u.id";

// foreign_key_violation
const FK_VIOLATION: &str = "23503";

/// A product deleted between the existence check and the insert shows up as a
/// foreign key violation on the interaction table.
fn interaction_error(err: sqlx::Error, product_id: i64) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(FK_VIOLATION) => {
            MissingProduct(product_id).into()
        }
        _ => err.into(),
    }
}

/// PostgreSQL-backed catalog and interaction tables.
#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(product_from_row))
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_product(&self, product: NewProduct, now: OffsetDateTime) -> Result<Product> {
        let mut tx = self.db.pool().begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO products (user_id, product_name, description, category, product_condition, \
                                   price, currency, country, city, shop_name, contact_phone, quantity, \
                                   shipping_available, local_pickup, video_url, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16) \
             RETURNING id",
        )
        .bind(product.user_id)
        .bind(&product.product_name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(&product.condition)
        .bind(product.price)
        .bind(&product.currency)
        .bind(&product.country)
        .bind(&product.city)
        .bind(&product.shop_name)
        .bind(&product.contact_phone)
        .bind(product.quantity)
        .bind(product.shipping_available)
        .bind(product.local_pickup)
        .bind(&product.video_url)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        insert_images(&mut tx, id, &product.images).await?;

        tx.commit().await?;

        self.fetch_product(id)
            .await?
            .ok_or_else(|| anyhow!("product {} missing after insert", id))
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        self.fetch_product(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!("{PRODUCT_SELECT} ORDER BY p.id"))
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn list_by_owner(&self, user_id: i64) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!("{PRODUCT_SELECT} WHERE p.user_id = $1 ORDER BY p.id"))
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn update_product(
        &self,
        id: i64,
        changes: ProductChanges,
        now: OffsetDateTime,
    ) -> Result<Option<Product>> {
        let mut tx = self.db.pool().begin().await?;

        // Nullable columns take a (present, value) pair so that an explicit
        // clear can be told apart from an omitted field.
        let updated: Option<i64> = sqlx::query_scalar(
            "UPDATE products \
             SET product_name = COALESCE($2, product_name), \
                 description = CASE WHEN $3 THEN $4 ELSE description END, \
                 category = COALESCE($5, category), \
                 product_condition = COALESCE($6, product_condition), \
                 price = COALESCE($7, price), \
                 currency = COALESCE($8, currency), \
                 country = COALESCE($9, country), \
                 city = CASE WHEN $10 THEN $11 ELSE city END, \
                 shop_name = CASE WHEN $12 THEN $13 ELSE shop_name END, \
                 contact_phone = CASE WHEN $14 THEN $15 ELSE contact_phone END, \
                 quantity = COALESCE($16, quantity), \
                 shipping_available = COALESCE($17, shipping_available), \
                 local_pickup = COALESCE($18, local_pickup), \
                 video_url = CASE WHEN $19 THEN $20 ELSE video_url END, \
                 updated_at = GREATEST($21, updated_at) \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(id)
        .bind(&changes.product_name)
        .bind(changes.description.is_some())
        .bind(changes.description.clone().flatten())
        .bind(&changes.category)
        .bind(&changes.condition)
        .bind(changes.price)
        .bind(&changes.currency)
        .bind(&changes.country)
        .bind(changes.city.is_some())
        .bind(changes.city.clone().flatten())
        .bind(changes.shop_name.is_some())
        .bind(changes.shop_name.clone().flatten())
        .bind(changes.contact_phone.is_some())
        .bind(changes.contact_phone.clone().flatten())
        .bind(changes.quantity)
        .bind(changes.shipping_available)
        .bind(changes.local_pickup)
        .bind(changes.video_url.is_some())
        .bind(changes.video_url.clone().flatten())
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        if let Some(images) = &changes.images {
            sqlx::query("DELETE FROM product_images WHERE product_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_images(&mut tx, id, images).await?;
        }

        tx.commit().await?;

        self.fetch_product(id).await
    }

    async fn delete_product(&self, id: i64) -> Result<bool> {
        // Images, likes and comments cascade through their foreign keys.
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn search(&self, plan: &SearchPlan) -> Result<Vec<Product>> {
        let (predicate, binds) = plan_predicate(plan);
        let order = if plan.orders_by_recency() {
            "ORDER BY p.created_at DESC, p.id DESC"
        } else {
            "ORDER BY p.id"
        };
        let sql = format!("{PRODUCT_SELECT} {predicate} {order}");

        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let rows = query.fetch_all(self.db.pool()).await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn count_products(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    async fn count_by_condition(&self, condition: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE product_condition = $1")
                .bind(condition)
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    async fn count_by_category(&self) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT category, COUNT(*) AS total FROM products GROUP BY category",
        )
        .fetch_all(self.db.pool())
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(row.get("category"), row.get("total"));
        }

        Ok(counts)
    }

    async fn latest(&self, limit: i64) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "{PRODUCT_SELECT} ORDER BY p.created_at DESC, p.id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn recently_updated(&self, limit: i64) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "{PRODUCT_SELECT} ORDER BY p.updated_at DESC, p.id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(product_from_row).collect())
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }
}

#[async_trait]
impl InteractionStore for PgStore {
    async fn add_like(&self, product_id: i64, user_id: i64, now: OffsetDateTime) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO product_likes (product_id, user_id, liked_at) VALUES ($1, $2, $3) \
             ON CONFLICT ON CONSTRAINT product_likes_product_user_key DO NOTHING",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(now)
        .execute(self.db.pool())
        .await
        .map_err(|err| interaction_error(err, product_id))?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_like(&self, product_id: i64, user_id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM product_likes WHERE product_id = $1 AND user_id = $2")
                .bind(product_id)
                .bind(user_id)
                .execute(self.db.pool())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_comment(
        &self,
        product_id: i64,
        user_id: i64,
        body: String,
        now: OffsetDateTime,
    ) -> Result<Comment> {
        let row = sqlx::query(
            "WITH inserted AS ( \
                INSERT INTO product_comments (product_id, user_id, comment, commented_at) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, product_id, user_id, comment, commented_at, updated_at \
             ) \
             SELECT pc.*, u.username, u.email \
             FROM inserted pc \
             LEFT JOIN users u ON pc.user_id = u.id",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(body)
        .bind(now)
        .fetch_one(self.db.pool())
        .await
        .map_err(|err| interaction_error(err, product_id))?;

        Ok(comment_from_row(&row))
    }

    async fn remove_comment(&self, comment_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM product_comments WHERE id = $1")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_likes(&self, product_id: i64) -> Result<Vec<Like>> {
        let rows = sqlx::query(
            "SELECT pl.id, pl.product_id, pl.user_id, pl.liked_at, u.username, u.email \
             FROM product_likes pl \
             LEFT JOIN users u ON pl.user_id = u.id \
             WHERE pl.product_id = $1 \
             ORDER BY pl.liked_at DESC, pl.id DESC",
        )
        .bind(product_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut likes = Vec::with_capacity(rows.len());
        for row in rows {
            likes.push(Like {
                id: row.get("id"),
                product_id: row.get("product_id"),
                user_id: row.get("user_id"),
                liked_at: row.get("liked_at"),
                username: row.get("username"),
                email: row.get("email"),
            });
        }

        Ok(likes)
    }

    async fn list_comments(&self, product_id: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "{COMMENT_SELECT} WHERE pc.product_id = $1 ORDER BY pc.commented_at DESC, pc.id DESC"
        ))
        .bind(product_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    async fn count_likes(&self, product_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product_likes WHERE product_id = $1")
                .bind(product_id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    async fn count_comments(&self, product_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product_comments WHERE product_id = $1")
                .bind(product_id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(count)
    }

    async fn recent_activity(&self, product_id: i64, limit: i64) -> Result<Vec<ActivityEvent>> {
        let rows = sqlx::query(
            "SELECT 'like' AS kind, user_id, liked_at AS happened_at \
             FROM product_likes WHERE product_id = $1 \
             UNION ALL \
             SELECT 'comment' AS kind, user_id, commented_at AS happened_at \
             FROM product_comments WHERE product_id = $1 \
             ORDER BY happened_at DESC \
             LIMIT $2",
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.get("kind");
            let kind = ActivityKind::from_db(&kind)
                .ok_or_else(|| anyhow!("unknown activity kind: {}", kind))?;
            events.push(ActivityEvent {
                kind,
                user_id: row.get("user_id"),
                timestamp: row.get("happened_at"),
            });
        }

        Ok(events)
    }
}

async fn insert_images(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    product_id: i64,
    images: &[String],
) -> Result<()> {
    if images.is_empty() {
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO product_images (product_id, image_order, image_url) \
         SELECT $1, (t.ord - 1)::int, t.url \
         FROM UNNEST($2::text[]) WITH ORDINALITY AS t(url, ord)",
    )
    .bind(product_id)
    .bind(images.to_vec())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn plan_predicate(plan: &SearchPlan) -> (&'static str, Vec<String>) {
    match plan {
        SearchPlan::Keyword(term) => (
            "WHERE p.product_name ILIKE $1 ESCAPE '\\' \
                OR p.description ILIKE $1 ESCAPE '\\' \
                OR p.category ILIKE $1 ESCAPE '\\' \
                OR p.shop_name ILIKE $1 ESCAPE '\\'",
            vec![format!("%{}%", escape_like_pattern(term))],
        ),
        SearchPlan::CategoryCountryCity {
            category,
            country,
            city,
        } => (
            "WHERE p.category = $1 AND p.country = $2 AND p.city = $3",
            vec![category.clone(), country.clone(), city.clone()],
        ),
        SearchPlan::CategoryCountry { category, country } => (
            "WHERE p.category = $1 AND p.country = $2",
            vec![category.clone(), country.clone()],
        ),
        SearchPlan::Category(category) => ("WHERE p.category = $1", vec![category.clone()]),
        SearchPlan::CountryCity { country, city } => (
            "WHERE p.country = $1 AND p.city = $2",
            vec![country.clone(), city.clone()],
        ),
        SearchPlan::Country(country) => ("WHERE p.country = $1", vec![country.clone()]),
        SearchPlan::Condition(condition) => {
            ("WHERE p.product_condition = $1", vec![condition.clone()])
        }
        SearchPlan::All => ("", Vec::new()),
    }
}

fn product_from_row(row: &PgRow) -> Product {
    Product {
        id: row.get("id"),
        user_id: row.get("user_id"),
        product_name: row.get("product_name"),
        description: row.get("description"),
        category: row.get("category"),
        condition: row.get("product_condition"),
        price: row.get("price"),
        currency: row.get("currency"),
        country: row.get("country"),
        city: row.get("city"),
        shop_name: row.get("shop_name"),
        contact_phone: row.get("contact_phone"),
        quantity: row.get("quantity"),
        shipping_available: row.get("shipping_available"),
        local_pickup: row.get("local_pickup"),
        images: row.get("images"),
        video_url: row.get("video_url"),
        likes_count: row.get("likes_count"),
        comments_count: row.get("comments_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        product_id: row.get("product_id"),
        user_id: row.get("user_id"),
        comment: row.get("comment"),
        commented_at: row.get("commented_at"),
        updated_at: row.get("updated_at"),
        username: row.get("username"),
        email: row.get("email"),
    }
}

fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}
