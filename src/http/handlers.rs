use std::collections::HashMap;

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::interaction::{Comment, InteractionStats, Like};
use crate::domain::product::{Product, ProductDraft, ProductPatch};
use crate::domain::search::SearchFilter;
use crate::domain::stats::GlobalStats;
use crate::http::AppError;
use crate::infra::storage::Upload;
use crate::AppState;

const DEFAULT_LIST_LIMIT: i64 = 10;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.catalog.ping().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::warn!(error = ?err, "store ping failed");
            "degraded"
        }
    };

    Json(HealthResponse { status })
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub product: Product,
}

#[derive(Serialize)]
pub struct ProductListResponse {
    pub success: bool,
    pub products: Vec<Product>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct StatisticsResponse {
    pub success: bool,
    pub statistics: GlobalStats,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

fn product_list(products: Vec<Product>) -> Json<ProductListResponse> {
    Json(ProductListResponse {
        success: true,
        products,
    })
}

pub async fn create_product(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProductResponse>, AppError> {
    let mut multipart = multipart?;
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut images = Vec::new();
    let mut video = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" | "video" => {
                let upload = read_upload(field).await?;
                if upload.bytes.is_empty() {
                    continue;
                }
                if name == "video" {
                    video = Some(upload);
                } else {
                    images.push(upload);
                }
            }
            _ => {
                let value = field.text().await?;
                fields.insert(name, value);
            }
        }
    }

    let draft = draft_from_fields(fields)?;
    let product = state
        .catalog
        .create_product_with_media(draft, images, video)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to create product"))?;

    Ok(Json(ProductResponse {
        success: true,
        message: Some("Product created successfully"),
        product,
    }))
}

pub async fn create_product_json(
    State(state): State<AppState>,
    payload: Result<Json<ProductDraft>, JsonRejection>,
) -> Result<Json<ProductResponse>, AppError> {
    let Json(draft) = payload?;
    let product = state
        .catalog
        .create_product(draft)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to create product"))?;

    Ok(Json(ProductResponse {
        success: true,
        message: Some("Product created successfully"),
        product,
    }))
}

pub async fn search_products(
    State(state): State<AppState>,
    query: Result<Query<SearchFilter>, QueryRejection>,
) -> Result<Json<ProductListResponse>, AppError> {
    let Query(filter) = query?;
    let products = state
        .catalog
        .search(&filter)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to fetch products"))?;

    Ok(product_list(products))
}

pub async fn get_product(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<ProductResponse>, AppError> {
    let Path(id) = path?;
    let product = state
        .catalog
        .get_product(id)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to fetch product"))?;

    Ok(Json(ProductResponse {
        success: true,
        message: None,
        product,
    }))
}

pub async fn list_user_products(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<ProductListResponse>, AppError> {
    let Path(user_id) = path?;
    let products = state
        .catalog
        .list_by_owner(user_id)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to fetch user products"))?;

    Ok(product_list(products))
}

pub async fn update_product(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> Result<Json<ProductResponse>, AppError> {
    let Path(id) = path?;
    let Json(patch) = payload?;
    let product = state
        .catalog
        .update_product(id, patch)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to update product"))?;

    Ok(Json(ProductResponse {
        success: true,
        message: Some("Product updated successfully"),
        product,
    }))
}

pub async fn delete_product(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = path?;
    state
        .catalog
        .delete_product(id)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to delete product"))?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Product deleted successfully",
    }))
}

pub async fn product_statistics(
    State(state): State<AppState>,
) -> Result<Json<StatisticsResponse>, AppError> {
    let statistics = state
        .stats
        .global_stats()
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to compute statistics"))?;

    Ok(Json(StatisticsResponse {
        success: true,
        statistics,
    }))
}

pub async fn latest_products(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<ProductListResponse>, AppError> {
    let Query(query) = query?;
    let products = state
        .stats
        .latest(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to fetch latest products"))?;

    Ok(product_list(products))
}

pub async fn recently_updated_products(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<Json<ProductListResponse>, AppError> {
    let Query(query) = query?;
    let products = state
        .stats
        .recently_updated(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await
        .map_err(|err| {
            AppError::from_catalog(err, "failed to fetch recently updated products")
        })?;

    Ok(product_list(products))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeRequest {
    pub user_id: i64,
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub success: bool,
    pub created: bool,
}

#[derive(Serialize)]
pub struct RemovedResponse {
    pub success: bool,
    pub removed: bool,
}

#[derive(Serialize)]
pub struct LikesResponse {
    pub success: bool,
    pub likes: Vec<Like>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    pub user_id: i64,
    pub comment: String,
}

#[derive(Serialize)]
pub struct CommentResponse {
    pub success: bool,
    pub comment: Comment,
}

#[derive(Serialize)]
pub struct CommentsResponse {
    pub success: bool,
    pub comments: Vec<Comment>,
}

#[derive(Serialize)]
pub struct InteractionStatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: InteractionStats,
}

pub async fn like_product(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
    payload: Result<Json<LikeRequest>, JsonRejection>,
) -> Result<Json<LikeResponse>, AppError> {
    let Path(id) = path?;
    let Json(payload) = payload?;
    let created = state
        .catalog
        .add_like(id, payload.user_id)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to like product"))?;

    Ok(Json(LikeResponse {
        success: true,
        created,
    }))
}

pub async fn unlike_product(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
    payload: Result<Json<LikeRequest>, JsonRejection>,
) -> Result<Json<RemovedResponse>, AppError> {
    let Path(id) = path?;
    let Json(payload) = payload?;
    let removed = state
        .catalog
        .remove_like(id, payload.user_id)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to unlike product"))?;

    Ok(Json(RemovedResponse {
        success: true,
        removed,
    }))
}

pub async fn list_product_likes(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<LikesResponse>, AppError> {
    let Path(id) = path?;
    let likes = state
        .catalog
        .list_likes(id)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to list likes"))?;

    Ok(Json(LikesResponse {
        success: true,
        likes,
    }))
}

pub async fn comment_product(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<Json<CommentResponse>, AppError> {
    let Path(id) = path?;
    let Json(payload) = payload?;
    let comment = state
        .catalog
        .add_comment(id, payload.user_id, payload.comment)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to add comment"))?;

    Ok(Json(CommentResponse {
        success: true,
        comment,
    }))
}

pub async fn list_product_comments(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<CommentsResponse>, AppError> {
    let Path(id) = path?;
    let comments = state
        .catalog
        .list_comments(id)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to list comments"))?;

    Ok(Json(CommentsResponse {
        success: true,
        comments,
    }))
}

pub async fn delete_comment(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<RemovedResponse>, AppError> {
    let Path(comment_id) = path?;
    let removed = state
        .catalog
        .remove_comment(comment_id)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to delete comment"))?;

    Ok(Json(RemovedResponse {
        success: true,
        removed,
    }))
}

pub async fn product_interactions(
    path: Result<Path<i64>, PathRejection>,
    State(state): State<AppState>,
) -> Result<Json<InteractionStatsResponse>, AppError> {
    let Path(id) = path?;
    let stats = state
        .catalog
        .interaction_stats(id)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to fetch interactions"))?;

    Ok(Json(InteractionStatsResponse {
        success: true,
        stats,
    }))
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
}

pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let multipart = multipart?;
    let upload = single_upload(multipart, "image").await?;
    let url = state
        .catalog
        .upload_image(upload)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to upload image"))?;

    Ok(Json(UploadResponse { success: true, url }))
}

pub async fn upload_video(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let multipart = multipart?;
    let upload = single_upload(multipart, "video").await?;
    let url = state
        .catalog
        .upload_video(upload)
        .await
        .map_err(|err| AppError::from_catalog(err, "failed to upload video"))?;

    Ok(Json(UploadResponse { success: true, url }))
}

async fn read_upload(field: axum::extract::multipart::Field<'_>) -> Result<Upload, AppError> {
    let content_type = field.content_type().map(str::to_string);
    let file_name = field.file_name().map(str::to_string);
    let bytes = field.bytes().await?;

    Ok(Upload {
        bytes,
        content_type,
        file_name,
    })
}

async fn single_upload(mut multipart: Multipart, part: &str) -> Result<Upload, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(part) {
            return read_upload(field).await;
        }
    }
    Err(AppError::bad_request("validation failed").with_details(format!("{}: is required", part)))
}

/// Turns multipart text parts into a draft. Parts that must be numbers or
/// booleans are rejected here; everything else is left to the service.
fn draft_from_fields(mut fields: HashMap<String, String>) -> Result<ProductDraft, AppError> {
    Ok(ProductDraft {
        user_id: parse_field(&mut fields, "userId")?,
        product_name: fields.remove("productName"),
        description: fields.remove("description"),
        category: fields.remove("category"),
        condition: fields.remove("condition"),
        price: fields.remove("price"),
        currency: fields.remove("currency"),
        country: fields.remove("country"),
        city: fields.remove("city"),
        shop_name: fields.remove("shopName"),
        contact_phone: fields.remove("contactPhone"),
        quantity: parse_field(&mut fields, "quantity")?,
        shipping_available: parse_field(&mut fields, "shippingAvailable")?,
        local_pickup: parse_field(&mut fields, "localPickup")?,
        images: Vec::new(),
        video_url: fields.remove("videoUrl"),
    })
}

fn parse_field<T: std::str::FromStr>(
    fields: &mut HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, AppError> {
    let Some(raw) = fields.remove(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>().map(Some).map_err(|_| {
        AppError::bad_request("validation failed")
            .with_details(format!("{}: has an invalid value", key))
    })
}
