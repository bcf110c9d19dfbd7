use thiserror::Error;

use crate::infra::store::MissingProduct;

/// Failures surfaced by the catalog service.
///
/// Duplicate likes and removals of absent rows are not errors; they come back
/// as `false` outcomes.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{entity} not found with id: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("store operation failed")]
    Store(anyhow::Error),

    #[error("object storage upload failed")]
    Upstream(anyhow::Error),
}

impl CatalogError {
    pub fn product_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "Product",
            id,
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for CatalogError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<MissingProduct>() {
            Some(MissingProduct(id)) => Self::product_not_found(*id),
            None => Self::Store(err),
        }
    }
}


pub type CatalogResult<T> = Result<T, CatalogError>;
