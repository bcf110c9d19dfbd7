use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::AppState;

mod error;
mod handlers;
mod routes;

pub use error::AppError;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::health())
        .merge(routes::products())
        .merge(routes::interactions())
        .merge(routes::uploads());

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(state.upload_max_bytes))
        .with_state(state)
}
