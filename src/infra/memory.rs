use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use time::OffsetDateTime;

use crate::domain::interaction::{ActivityEvent, ActivityKind, Comment, Like, UserIdentity};
use crate::domain::product::{NewProduct, Product, ProductChanges};
use crate::domain::search::SearchPlan;
use crate::infra::store::{CatalogStore, InteractionStore, MissingProduct};

#[derive(Debug, Clone)]
struct LikeRow {
    id: i64,
    product_id: i64,
    user_id: i64,
    liked_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct CommentRow {
    id: i64,
    product_id: i64,
    user_id: i64,
    comment: String,
    commented_at: OffsetDateTime,
    updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
struct Tables {
    last_product_id: i64,
    last_like_id: i64,
    last_comment_id: i64,
    products: BTreeMap<i64, Product>,
    likes: Vec<LikeRow>,
    comments: Vec<CommentRow>,
    users: HashMap<i64, UserIdentity>,
}

/// Process-local catalog and interaction store.
///
/// Every operation runs under one lock, so multi-row writes are atomic and
/// the (product, user) like pair stays unique. Intended for tests and local
/// development; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the public identity joined onto likes and comments.
    pub fn register_user(&self, user: UserIdentity) -> Result<()> {
        let mut tables = self.write()?;
        tables.users.insert(user.id, user);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

impl Tables {
    fn hydrate(&self, product: &Product) -> Product {
        let mut product = product.clone();
        product.likes_count = self
            .likes
            .iter()
            .filter(|like| like.product_id == product.id)
            .count() as i64;
        product.comments_count = self
            .comments
            .iter()
            .filter(|comment| comment.product_id == product.id)
            .count() as i64;
        product
    }

    fn hydrate_all<'a>(&self, products: impl Iterator<Item = &'a Product>) -> Vec<Product> {
        products.map(|product| self.hydrate(product)).collect()
    }

    fn sorted_by<F>(&self, key: F, limit: i64) -> Vec<Product>
    where
        F: Fn(&Product) -> OffsetDateTime,
    {
        let mut products: Vec<&Product> = self.products.values().collect();
        products.sort_by(|a, b| key(*b).cmp(&key(*a)).then(b.id.cmp(&a.id)));
        let limit = usize::try_from(limit).unwrap_or(0);
        self.hydrate_all(products.into_iter().take(limit))
    }

    fn like_view(&self, row: &LikeRow) -> Like {
        let user = self.users.get(&row.user_id);
        Like {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            liked_at: row.liked_at,
            username: user.map(|user| user.username.clone()),
            email: user.map(|user| user.email.clone()),
        }
    }

    fn comment_view(&self, row: &CommentRow) -> Comment {
        let user = self.users.get(&row.user_id);
        Comment {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            comment: row.comment.clone(),
            commented_at: row.commented_at,
            updated_at: row.updated_at,
            username: user.map(|user| user.username.clone()),
            email: user.map(|user| user.email.clone()),
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_product(&self, product: NewProduct, now: OffsetDateTime) -> Result<Product> {
        let mut tables = self.write()?;
        tables.last_product_id += 1;
        let id = tables.last_product_id;

        let stored = Product {
            id,
            user_id: product.user_id,
            product_name: product.product_name,
            description: product.description,
            category: product.category,
            condition: product.condition,
            price: product.price,
            currency: product.currency,
            country: product.country,
            city: product.city,
            shop_name: product.shop_name,
            contact_phone: product.contact_phone,
            quantity: product.quantity,
            shipping_available: product.shipping_available,
            local_pickup: product.local_pickup,
            images: product.images,
            video_url: product.video_url,
            likes_count: 0,
            comments_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(id, stored.clone());

        Ok(stored)
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let tables = self.read()?;
        Ok(tables.products.get(&id).map(|product| tables.hydrate(product)))
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let tables = self.read()?;
        Ok(tables.hydrate_all(tables.products.values()))
    }

    async fn list_by_owner(&self, user_id: i64) -> Result<Vec<Product>> {
        let tables = self.read()?;
        Ok(tables.hydrate_all(
            tables
                .products
                .values()
                .filter(|product| product.user_id == user_id),
        ))
    }

    async fn update_product(
        &self,
        id: i64,
        changes: ProductChanges,
        now: OffsetDateTime,
    ) -> Result<Option<Product>> {
        let mut tables = self.write()?;
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(None);
        };

        changes.apply_to(product);
        product.updated_at = product.updated_at.max(now);

        let product = product.clone();
        Ok(Some(tables.hydrate(&product)))
    }

    async fn delete_product(&self, id: i64) -> Result<bool> {
        let mut tables = self.write()?;
        if tables.products.remove(&id).is_none() {
            return Ok(false);
        }
        tables.likes.retain(|like| like.product_id != id);
        tables.comments.retain(|comment| comment.product_id != id);
        Ok(true)
    }

    async fn search(&self, plan: &SearchPlan) -> Result<Vec<Product>> {
        let tables = self.read()?;
        let mut matched: Vec<&Product> = tables
            .products
            .values()
            .filter(|product| plan.matches(product))
            .collect();
        if plan.orders_by_recency() {
            matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        }
        Ok(tables.hydrate_all(matched.into_iter()))
    }

    async fn count_products(&self) -> Result<i64> {
        Ok(self.read()?.products.len() as i64)
    }

    async fn count_by_condition(&self, condition: &str) -> Result<i64> {
        let tables = self.read()?;
        Ok(tables
            .products
            .values()
            .filter(|product| product.condition == condition)
            .count() as i64)
    }

    async fn count_by_category(&self) -> Result<HashMap<String, i64>> {
        let tables = self.read()?;
        let mut counts = HashMap::new();
        for product in tables.products.values() {
            *counts.entry(product.category.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn latest(&self, limit: i64) -> Result<Vec<Product>> {
        Ok(self.read()?.sorted_by(|product| product.created_at, limit))
    }

    async fn recently_updated(&self, limit: i64) -> Result<Vec<Product>> {
        Ok(self.read()?.sorted_by(|product| product.updated_at, limit))
    }

    async fn ping(&self) -> Result<()> {
        self.read().map(|_| ())
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn add_like(&self, product_id: i64, user_id: i64, now: OffsetDateTime) -> Result<bool> {
        let mut tables = self.write()?;
        if !tables.products.contains_key(&product_id) {
            return Err(MissingProduct(product_id).into());
        }
        let exists = tables
            .likes
            .iter()
            .any(|like| like.product_id == product_id && like.user_id == user_id);
        if exists {
            return Ok(false);
        }

        tables.last_like_id += 1;
        let id = tables.last_like_id;
        tables.likes.push(LikeRow {
            id,
            product_id,
            user_id,
            liked_at: now,
        });
        Ok(true)
    }

    async fn remove_like(&self, product_id: i64, user_id: i64) -> Result<bool> {
        let mut tables = self.write()?;
        let before = tables.likes.len();
        tables
            .likes
            .retain(|like| !(like.product_id == product_id && like.user_id == user_id));
        Ok(tables.likes.len() < before)
    }

    async fn add_comment(
        &self,
        product_id: i64,
        user_id: i64,
        body: String,
        now: OffsetDateTime,
    ) -> Result<Comment> {
        let mut tables = self.write()?;
        if !tables.products.contains_key(&product_id) {
            return Err(MissingProduct(product_id).into());
        }

        tables.last_comment_id += 1;
        let row = CommentRow {
            id: tables.last_comment_id,
            product_id,
            user_id,
            comment: body,
            commented_at: now,
            updated_at: None,
        };
        let comment = tables.comment_view(&row);
        tables.comments.push(row);
        Ok(comment)
    }

    async fn remove_comment(&self, comment_id: i64) -> Result<bool> {
        let mut tables = self.write()?;
        let before = tables.comments.len();
        tables.comments.retain(|comment| comment.id != comment_id);
        Ok(tables.comments.len() < before)
    }

    async fn list_likes(&self, product_id: i64) -> Result<Vec<Like>> {
        let tables = self.read()?;
        let mut rows: Vec<&LikeRow> = tables
            .likes
            .iter()
            .filter(|like| like.product_id == product_id)
            .collect();
        rows.sort_by(|a, b| b.liked_at.cmp(&a.liked_at).then(b.id.cmp(&a.id)));
        Ok(rows.into_iter().map(|row| tables.like_view(row)).collect())
    }

    async fn list_comments(&self, product_id: i64) -> Result<Vec<Comment>> {
        let tables = self.read()?;
        let mut rows: Vec<&CommentRow> = tables
            .comments
            .iter()
            .filter(|comment| comment.product_id == product_id)
            .collect();
        rows.sort_by(|a, b| b.commented_at.cmp(&a.commented_at).then(b.id.cmp(&a.id)));
        Ok(rows.into_iter().map(|row| tables.comment_view(row)).collect())
    }

    async fn count_likes(&self, product_id: i64) -> Result<i64> {
        let tables = self.read()?;
        Ok(tables
            .likes
            .iter()
            .filter(|like| like.product_id == product_id)
            .count() as i64)
    }

    async fn count_comments(&self, product_id: i64) -> Result<i64> {
        let tables = self.read()?;
        Ok(tables
            .comments
            .iter()
            .filter(|comment| comment.product_id == product_id)
            .count() as i64)
    }

    async fn recent_activity(&self, product_id: i64, limit: i64) -> Result<Vec<ActivityEvent>> {
        let tables = self.read()?;
        let likes = tables
            .likes
            .iter()
            .filter(|like| like.product_id == product_id)
            .map(|like| ActivityEvent {
                kind: ActivityKind::Like,
                user_id: like.user_id,
                timestamp: like.liked_at,
            });
        let comments = tables
            .comments
            .iter()
            .filter(|comment| comment.product_id == product_id)
            .map(|comment| ActivityEvent {
                kind: ActivityKind::Comment,
                user_id: comment.user_id,
                timestamp: comment.commented_at,
            });

        let mut events: Vec<ActivityEvent> = likes.chain(comments).collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(events)
    }
}
