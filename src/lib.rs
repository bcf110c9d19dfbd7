pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::app::catalog::CatalogService;
use crate::app::stats::StatisticsAggregator;
use crate::infra::storage::ObjectStore;
use crate::infra::store::{CatalogStore, InteractionStore};

#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub stats: StatisticsAggregator,
    pub upload_max_bytes: usize,
}

impl AppState {
    pub fn new(
        products: Arc<dyn CatalogStore>,
        interactions: Arc<dyn InteractionStore>,
        objects: Arc<dyn ObjectStore>,
        upload_max_bytes: usize,
        stats_max_limit: i64,
    ) -> Self {
        Self {
            catalog: CatalogService::new(products.clone(), interactions, objects),
            stats: StatisticsAggregator::new(products, stats_max_limit),
            upload_max_bytes,
        }
    }
}
