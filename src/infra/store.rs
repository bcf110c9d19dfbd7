use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;

use crate::domain::interaction::{ActivityEvent, Comment, Like};
use crate::domain::product::{NewProduct, Product, ProductChanges};
use crate::domain::search::SearchPlan;

/// An interaction referenced a product that no longer exists. Backends return
/// it (wrapped in `anyhow`) so callers can tell it apart from a store outage.
#[derive(Debug, thiserror::Error)]
#[error("product {0} does not exist")]
pub struct MissingProduct(pub i64);

/// Durable product table plus the ordered image list of each product.
///
/// Every product returned carries `likes_count`/`comments_count` counted from
/// the interaction rows at read time.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Writes the product row and its images atomically, stamping both
    /// timestamps with `now`.
    async fn insert_product(&self, product: NewProduct, now: OffsetDateTime) -> Result<Product>;

    async fn get_product(&self, id: i64) -> Result<Option<Product>>;

    async fn list_products(&self) -> Result<Vec<Product>>;

    async fn list_by_owner(&self, user_id: i64) -> Result<Vec<Product>>;

    /// Returns `None` when no product has this id. `updated_at` becomes
    /// `max(now, previous)` even when `changes` is empty.
    async fn update_product(
        &self,
        id: i64,
        changes: ProductChanges,
        now: OffsetDateTime,
    ) -> Result<Option<Product>>;

    /// Removes the product together with its images, likes and comments.
    async fn delete_product(&self, id: i64) -> Result<bool>;

    async fn search(&self, plan: &SearchPlan) -> Result<Vec<Product>>;

    async fn count_products(&self) -> Result<i64>;

    async fn count_by_condition(&self, condition: &str) -> Result<i64>;

    async fn count_by_category(&self) -> Result<HashMap<String, i64>>;

    async fn latest(&self, limit: i64) -> Result<Vec<Product>>;

    async fn recently_updated(&self, limit: i64) -> Result<Vec<Product>>;

    async fn ping(&self) -> Result<()>;
}

/// Likes and comments, stored independently of the product row.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Returns `false` when the (product, user) pair already has a like.
    /// Fails with [`MissingProduct`] when the product is gone.
    async fn add_like(&self, product_id: i64, user_id: i64, now: OffsetDateTime) -> Result<bool>;

    async fn remove_like(&self, product_id: i64, user_id: i64) -> Result<bool>;

    /// Fails with [`MissingProduct`] when the product is gone.
    async fn add_comment(
        &self,
        product_id: i64,
        user_id: i64,
        body: String,
        now: OffsetDateTime,
    ) -> Result<Comment>;

    async fn remove_comment(&self, comment_id: i64) -> Result<bool>;

    async fn list_likes(&self, product_id: i64) -> Result<Vec<Like>>;

    async fn list_comments(&self, product_id: i64) -> Result<Vec<Comment>>;

    async fn count_likes(&self, product_id: i64) -> Result<i64>;

    async fn count_comments(&self, product_id: i64) -> Result<i64>;

    /// Likes and comments merged, newest first.
    async fn recent_activity(&self, product_id: i64, limit: i64) -> Result<Vec<ActivityEvent>>;
}
