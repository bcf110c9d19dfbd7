use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    pub total_products: i64,
    pub new_products: i64,
    pub used_products: i64,
    /// Only configured labels with at least one product.
    pub by_category: BTreeMap<String, i64>,
    /// Not aggregated yet; always empty.
    pub top_countries: BTreeMap<String, i64>,
}
