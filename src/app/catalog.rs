use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use time::OffsetDateTime;

use crate::app::error::{CatalogError, CatalogResult};
use crate::domain::interaction::{Comment, InteractionStats, Like};
use crate::domain::product::{
    NewProduct, Product, ProductChanges, ProductDraft, ProductPatch, DEFAULT_QUANTITY,
};
use crate::domain::search::{self, SearchFilter};
use crate::infra::storage::{ObjectStore, Upload, IMAGE_FOLDER, VIDEO_FOLDER};
use crate::infra::store::{CatalogStore, InteractionStore};

const RECENT_ACTIVITY_LIMIT: i64 = 5;
const PRICE_SCALE: u32 = 2;

#[derive(Clone)]
pub struct CatalogService {
    products: Arc<dyn CatalogStore>,
    interactions: Arc<dyn InteractionStore>,
    objects: Arc<dyn ObjectStore>,
}

impl CatalogService {
    pub fn new(
        products: Arc<dyn CatalogStore>,
        interactions: Arc<dyn InteractionStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            products,
            interactions,
            objects,
        }
    }

    pub async fn create_product(&self, draft: ProductDraft) -> CatalogResult<Product> {
        let product = validate_draft(draft)?;
        self.insert(product).await
    }

    /// Uploads the attached media, then creates the product pointing at the
    /// returned URLs. Nothing is written to the catalog if any upload fails.
    pub async fn create_product_with_media(
        &self,
        draft: ProductDraft,
        images: Vec<Upload>,
        video: Option<Upload>,
    ) -> CatalogResult<Product> {
        let mut product = validate_draft(draft)?;

        if !images.is_empty() {
            let mut urls = Vec::with_capacity(images.len());
            for image in images {
                urls.push(self.upload(image, IMAGE_FOLDER).await?);
            }
            product.images = urls;
        }
        if let Some(video) = video {
            product.video_url = Some(self.upload(video, VIDEO_FOLDER).await?);
        }

        self.insert(product).await
    }

    pub async fn get_product(&self, id: i64) -> CatalogResult<Product> {
        self.products
            .get_product(id)
            .await?
            .ok_or_else(|| CatalogError::product_not_found(id))
    }

    pub async fn list_products(&self) -> CatalogResult<Vec<Product>> {
        Ok(self.products.list_products().await?)
    }

    pub async fn list_by_owner(&self, user_id: i64) -> CatalogResult<Vec<Product>> {
        Ok(self.products.list_by_owner(user_id).await?)
    }

    pub async fn search(&self, filter: &SearchFilter) -> CatalogResult<Vec<Product>> {
        let plan = search::resolve(filter);
        tracing::debug!(plan = ?plan, "resolved product search");
        Ok(self.products.search(&plan).await?)
    }

    pub async fn update_product(&self, id: i64, patch: ProductPatch) -> CatalogResult<Product> {
        let changes = validate_patch(patch)?;
        let product = self
            .products
            .update_product(id, changes, now())
            .await?
            .ok_or_else(|| CatalogError::product_not_found(id))?;

        tracing::info!(product_id = %id, "product updated");
        Ok(product)
    }

    pub async fn delete_product(&self, id: i64) -> CatalogResult<()> {
        if !self.products.delete_product(id).await? {
            return Err(CatalogError::product_not_found(id));
        }

        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Returns whether a new like was recorded; a repeat like is `false`.
    pub async fn add_like(&self, product_id: i64, user_id: i64) -> CatalogResult<bool> {
        self.ensure_product(product_id).await?;
        let created = self.interactions.add_like(product_id, user_id, now()).await?;

        if created {
            tracing::info!(product_id = %product_id, user_id = %user_id, "product liked");
        }
        Ok(created)
    }

    pub async fn remove_like(&self, product_id: i64, user_id: i64) -> CatalogResult<bool> {
        Ok(self.interactions.remove_like(product_id, user_id).await?)
    }

    pub async fn add_comment(
        &self,
        product_id: i64,
        user_id: i64,
        body: String,
    ) -> CatalogResult<Comment> {
        self.ensure_product(product_id).await?;
        let comment = self
            .interactions
            .add_comment(product_id, user_id, body, now())
            .await?;

        tracing::info!(product_id = %product_id, comment_id = %comment.id, "comment added");
        Ok(comment)
    }

    pub async fn remove_comment(&self, comment_id: i64) -> CatalogResult<bool> {
        Ok(self.interactions.remove_comment(comment_id).await?)
    }

    pub async fn list_likes(&self, product_id: i64) -> CatalogResult<Vec<Like>> {
        self.ensure_product(product_id).await?;
        Ok(self.interactions.list_likes(product_id).await?)
    }

    pub async fn list_comments(&self, product_id: i64) -> CatalogResult<Vec<Comment>> {
        self.ensure_product(product_id).await?;
        Ok(self.interactions.list_comments(product_id).await?)
    }

    pub async fn interaction_stats(&self, product_id: i64) -> CatalogResult<InteractionStats> {
        self.ensure_product(product_id).await?;
        let likes_count = self.interactions.count_likes(product_id).await?;
        let comments_count = self.interactions.count_comments(product_id).await?;
        let recent_activity = self
            .interactions
            .recent_activity(product_id, RECENT_ACTIVITY_LIMIT)
            .await?;

        Ok(InteractionStats {
            likes_count,
            comments_count,
            recent_activity,
        })
    }

    pub async fn upload_image(&self, upload: Upload) -> CatalogResult<String> {
        self.standalone_upload(upload, IMAGE_FOLDER, "image").await
    }

    pub async fn upload_video(&self, upload: Upload) -> CatalogResult<String> {
        self.standalone_upload(upload, VIDEO_FOLDER, "video").await
    }

    pub async fn ping(&self) -> CatalogResult<()> {
        Ok(self.products.ping().await?)
    }

    async fn insert(&self, product: NewProduct) -> CatalogResult<Product> {
        let product = self.products.insert_product(product, now()).await?;
        tracing::info!(product_id = %product.id, user_id = %product.user_id, "product created");
        Ok(product)
    }

    async fn ensure_product(&self, id: i64) -> CatalogResult<()> {
        match self.products.get_product(id).await? {
            Some(_) => Ok(()),
            None => Err(CatalogError::product_not_found(id)),
        }
    }

    async fn standalone_upload(
        &self,
        upload: Upload,
        folder: &str,
        field: &'static str,
    ) -> CatalogResult<String> {
        if upload.bytes.is_empty() {
            return Err(CatalogError::validation(field, "file is empty"));
        }
        self.upload(upload, folder).await
    }

    async fn upload(&self, upload: Upload, folder: &str) -> CatalogResult<String> {
        self.objects
            .store(upload, folder)
            .await
            .map_err(CatalogError::Upstream)
    }
}

/// Postgres keeps microseconds; truncate here so both backends hand back the
/// same instant that was written.
fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

fn validate_draft(draft: ProductDraft) -> CatalogResult<NewProduct> {
    let user_id = draft
        .user_id
        .ok_or_else(|| CatalogError::validation("userId", "is required"))?;
    let price = parse_price(
        draft
            .price
            .as_deref()
            .ok_or_else(|| CatalogError::validation("price", "is required"))?,
    )?;
    let quantity = draft.quantity.unwrap_or(DEFAULT_QUANTITY);
    check_quantity(quantity)?;

    Ok(NewProduct {
        user_id,
        product_name: required("productName", draft.product_name)?,
        description: optional(draft.description),
        category: required("category", draft.category)?,
        condition: required("condition", draft.condition)?,
        price,
        currency: required("currency", draft.currency)?,
        country: required("country", draft.country)?,
        city: optional(draft.city),
        shop_name: optional(draft.shop_name),
        contact_phone: optional(draft.contact_phone),
        quantity,
        shipping_available: draft.shipping_available.unwrap_or(false),
        local_pickup: draft.local_pickup.unwrap_or(true),
        images: draft.images,
        video_url: optional(draft.video_url),
    })
}

fn validate_patch(patch: ProductPatch) -> CatalogResult<ProductChanges> {
    if let Some(quantity) = patch.quantity {
        check_quantity(quantity)?;
    }

    Ok(ProductChanges {
        product_name: present("productName", patch.product_name)?,
        description: patch.description.map(optional),
        category: present("category", patch.category)?,
        condition: present("condition", patch.condition)?,
        price: patch.price.as_deref().map(parse_price).transpose()?,
        currency: present("currency", patch.currency)?,
        country: present("country", patch.country)?,
        city: patch.city.map(optional),
        shop_name: patch.shop_name.map(optional),
        contact_phone: patch.contact_phone.map(optional),
        quantity: patch.quantity,
        shipping_available: patch.shipping_available,
        local_pickup: patch.local_pickup,
        images: patch.images,
        video_url: patch.video_url.map(optional),
    })
}

fn required(field: &'static str, value: Option<String>) -> CatalogResult<String> {
    optional(value).ok_or_else(|| CatalogError::validation(field, "must not be blank"))
}

/// A required field inside a patch: absent is fine, blank is not.
fn present(field: &'static str, value: Option<String>) -> CatalogResult<Option<String>> {
    value.map(|value| required(field, Some(value))).transpose()
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_price(raw: &str) -> CatalogResult<Decimal> {
    let price = Decimal::from_str(raw.trim())
        .map_err(|_| CatalogError::validation("price", "must be a decimal number"))?;
    if price.is_sign_negative() && !price.is_zero() {
        return Err(CatalogError::validation("price", "must not be negative"));
    }
    let mut price =
        price.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
    price.rescale(PRICE_SCALE);
    price.set_sign_positive(true);
    Ok(price)
}

fn check_quantity(quantity: i32) -> CatalogResult<()> {
    if quantity < 0 {
        return Err(CatalogError::validation("quantity", "must not be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::CONDITION_USED;
    use crate::infra::memory::MemoryStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        folders: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn store(&self, _upload: Upload, folder: &str) -> anyhow::Result<String> {
            let mut folders = self.folders.lock().unwrap();
            folders.push(folder.to_string());
            Ok(format!("https://cdn.test/{}/{}", folder, folders.len()))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn store(&self, _upload: Upload, _folder: &str) -> anyhow::Result<String> {
            Err(anyhow!("bucket unreachable"))
        }
    }

    fn service(objects: Arc<dyn ObjectStore>) -> (CatalogService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = CatalogService::new(store.clone(), store.clone(), objects);
        (service, store)
    }

    fn draft() -> ProductDraft {
        ProductDraft {
            user_id: Some(11),
            product_name: Some("Bicycle".into()),
            category: Some("Sports".into()),
            condition: Some(CONDITION_USED.into()),
            price: Some("45000".into()),
            currency: Some("XOF".into()),
            country: Some("Senegal".into()),
            city: Some("Thies".into()),
            ..Default::default()
        }
    }

    fn upload(name: &str) -> Upload {
        Upload {
            bytes: Bytes::from_static(b"\x89PNG"),
            content_type: Some("image/png".into()),
            file_name: Some(name.into()),
        }
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let (service, _) = service(Arc::new(RecordingStore::default()));

        let product = service.create_product(draft()).await.unwrap();

        assert_eq!(product.quantity, 1);
        assert!(!product.shipping_available);
        assert!(product.local_pickup);
        assert_eq!(product.created_at, product.updated_at);
        assert_eq!(product.likes_count, 0);
    }

    #[tokio::test]
    async fn blank_required_field_is_rejected() {
        let (service, store) = service(Arc::new(RecordingStore::default()));
        let mut draft = draft();
        draft.product_name = Some("   ".into());

        let err = service.create_product(draft).await.unwrap_err();

        assert!(matches!(
            err,
            CatalogError::Validation {
                field: "productName",
                ..
            }
        ));
        assert!(store.list_products().await.unwrap().is_empty());
    }

    #[test]
    fn prices_are_rounded_half_away_from_zero() {
        assert_eq!(parse_price("12.345").unwrap(), Decimal::new(1235, 2));
        assert_eq!(parse_price(" 7 ").unwrap(), Decimal::new(7, 0));
        assert!(matches!(
            parse_price("-0.01"),
            Err(CatalogError::Validation { field: "price", .. })
        ));
        assert!(matches!(
            parse_price("ten"),
            Err(CatalogError::Validation { field: "price", .. })
        ));
    }

    #[tokio::test]
    async fn media_is_uploaded_in_order() {
        let objects = Arc::new(RecordingStore::default());
        let (service, _) = service(objects.clone());

        let product = service
            .create_product_with_media(
                draft(),
                vec![upload("front.png"), upload("back.png")],
                Some(upload("ride.mp4")),
            )
            .await
            .unwrap();

        assert_eq!(
            product.images,
            vec![
                "https://cdn.test/products/1".to_string(),
                "https://cdn.test/products/2".to_string()
            ]
        );
        assert_eq!(
            product.video_url.as_deref(),
            Some("https://cdn.test/videos/3")
        );
        assert_eq!(
            *objects.folders.lock().unwrap(),
            vec!["products", "products", "videos"]
        );
    }

    #[tokio::test]
    async fn interaction_on_product_deleted_mid_request_is_not_found() {
        // The catalog still lists the product but the interaction table's
        // backend has already lost it.
        let catalog = Arc::new(MemoryStore::new());
        let interactions = Arc::new(MemoryStore::new());
        let service = CatalogService::new(
            catalog.clone(),
            interactions,
            Arc::new(RecordingStore::default()),
        );
        let product = service.create_product(draft()).await.unwrap();

        let like = service.add_like(product.id, 4).await.unwrap_err();
        let comment = service
            .add_comment(product.id, 4, "still there?".into())
            .await
            .unwrap_err();

        assert!(matches!(like, CatalogError::NotFound { id, .. } if id == product.id));
        assert!(matches!(comment, CatalogError::NotFound { id, .. } if id == product.id));
    }

    #[tokio::test]
    async fn failed_upload_writes_nothing() {
        let (service, store) = service(Arc::new(FailingStore));

        let err = service
            .create_product_with_media(draft(), vec![upload("front.png")], None)
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Upstream(_)));
        assert_eq!(store.count_products().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn patch_merges_and_clears() {
        let (service, _) = service(Arc::new(RecordingStore::default()));
        let created = service.create_product(draft()).await.unwrap();

        let patch: ProductPatch =
            serde_json::from_value(serde_json::json!({ "price": 12.5, "city": null })).unwrap();
        let updated = service.update_product(created.id, patch).await.unwrap();

        assert_eq!(updated.price, Decimal::new(1250, 2));
        assert_eq!(updated.category, "Sports");
        assert_eq!(updated.city, None);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let (service, _) = service(Arc::new(RecordingStore::default()));

        assert!(matches!(
            service.update_product(99, ProductPatch::default()).await,
            Err(CatalogError::NotFound { id: 99, .. })
        ));
        assert!(matches!(
            service.delete_product(99).await,
            Err(CatalogError::NotFound { id: 99, .. })
        ));
        assert!(matches!(
            service.add_like(99, 1).await,
            Err(CatalogError::NotFound { id: 99, .. })
        ));
    }

    #[tokio::test]
    async fn interaction_stats_match_product_counters() {
        let (service, _) = service(Arc::new(RecordingStore::default()));
        let product = service.create_product(draft()).await.unwrap();

        assert!(service.add_like(product.id, 1).await.unwrap());
        assert!(!service.add_like(product.id, 1).await.unwrap());
        service
            .add_comment(product.id, 2, "Still available?".into())
            .await
            .unwrap();

        let stats = service.interaction_stats(product.id).await.unwrap();
        let product = service.get_product(product.id).await.unwrap();

        assert_eq!(stats.likes_count, product.likes_count);
        assert_eq!(stats.comments_count, product.comments_count);
        assert_eq!(stats.recent_activity.len(), 2);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let (service, _) = service(Arc::new(RecordingStore::default()));
        let empty = Upload {
            bytes: Bytes::new(),
            content_type: None,
            file_name: None,
        };

        assert!(matches!(
            service.upload_image(empty).await,
            Err(CatalogError::Validation { field: "image", .. })
        ));
    }
}
