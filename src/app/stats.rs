use std::collections::BTreeMap;
use std::sync::Arc;

use crate::app::error::CatalogResult;
use crate::domain::product::{Product, CATEGORY_LABELS, CONDITION_NEW, CONDITION_USED};
use crate::domain::stats::GlobalStats;
use crate::infra::store::CatalogStore;

/// Read-only rollups over the catalog.
#[derive(Clone)]
pub struct StatisticsAggregator {
    products: Arc<dyn CatalogStore>,
    max_limit: i64,
}

impl StatisticsAggregator {
    pub fn new(products: Arc<dyn CatalogStore>, max_limit: i64) -> Self {
        Self {
            products,
            max_limit: max_limit.max(0),
        }
    }

    pub async fn global_stats(&self) -> CatalogResult<GlobalStats> {
        let total_products = self.products.count_products().await?;
        let new_products = self.products.count_by_condition(CONDITION_NEW).await?;
        let used_products = self.products.count_by_condition(CONDITION_USED).await?;
        let counts = self.products.count_by_category().await?;

        let by_category = CATEGORY_LABELS
            .iter()
            .filter_map(|label| {
                counts
                    .get(*label)
                    .filter(|count| **count > 0)
                    .map(|count| (label.to_string(), *count))
            })
            .collect();

        Ok(GlobalStats {
            total_products,
            new_products,
            used_products,
            by_category,
            top_countries: BTreeMap::new(),
        })
    }

    pub async fn latest(&self, limit: i64) -> CatalogResult<Vec<Product>> {
        let limit = self.clamp(limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.products.latest(limit).await?)
    }

    pub async fn recently_updated(&self, limit: i64) -> CatalogResult<Vec<Product>> {
        let limit = self.clamp(limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.products.recently_updated(limit).await?)
    }

    fn clamp(&self, limit: i64) -> i64 {
        limit.clamp(0, self.max_limit)
    }
}
