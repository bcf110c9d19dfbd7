use axum::{routing::delete, routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn products() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            post(handlers::create_product).get(handlers::search_products),
        )
        .route("/products/json", post(handlers::create_product_json))
        .route("/products/statistics", get(handlers::product_statistics))
        .route("/products/latest", get(handlers::latest_products))
        .route(
            "/products/recently-updated",
            get(handlers::recently_updated_products),
        )
        .route("/products/user/:user_id", get(handlers::list_user_products))
        .route(
            "/products/:id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
}

pub fn interactions() -> Router<AppState> {
    Router::new()
        .route(
            "/products/:id/like",
            post(handlers::like_product).delete(handlers::unlike_product),
        )
        .route("/products/:id/likes", get(handlers::list_product_likes))
        .route(
            "/products/:id/comments",
            post(handlers::comment_product).get(handlers::list_product_comments),
        )
        .route(
            "/products/comments/:comment_id",
            delete(handlers::delete_comment),
        )
        .route(
            "/products/:id/interactions",
            get(handlers::product_interactions),
        )
}

pub fn uploads() -> Router<AppState> {
    Router::new()
        .route("/upload-image", post(handlers::upload_image))
        .route("/upload-video", post(handlers::upload_video))
}
