use serde::Deserialize;

use crate::domain::product::Product;

/// Optional filters accepted by product search. Blank values count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilter {
    pub category: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub condition: Option<String>,
    pub search: Option<String>,
}

/// The single query a [`SearchFilter`] resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPlan {
    Keyword(String),
    CategoryCountryCity {
        category: String,
        country: String,
        city: String,
    },
    CategoryCountry {
        category: String,
        country: String,
    },
    Category(String),
    CountryCity {
        country: String,
        city: String,
    },
    Country(String),
    Condition(String),
    All,
}

/// Picks exactly one plan; the first matching branch wins and every other
/// filter is dropped. Condition only applies when nothing above it is set.
pub fn resolve(filter: &SearchFilter) -> SearchPlan {
    let search = present(&filter.search);
    let category = present(&filter.category);
    let country = present(&filter.country);
    let city = present(&filter.city);
    let condition = present(&filter.condition);

    if let Some(term) = search {
        return SearchPlan::Keyword(term);
    }

    match (category, country, city, condition) {
        (Some(category), Some(country), Some(city), _) => SearchPlan::CategoryCountryCity {
            category,
            country,
            city,
        },
        (Some(category), Some(country), None, _) => {
            SearchPlan::CategoryCountry { category, country }
        }
        (Some(category), None, _, _) => SearchPlan::Category(category),
        (None, Some(country), Some(city), _) => SearchPlan::CountryCity { country, city },
        (None, Some(country), None, _) => SearchPlan::Country(country),
        (None, None, _, Some(condition)) => SearchPlan::Condition(condition),
        (None, None, _, None) => SearchPlan::All,
    }
}

impl SearchPlan {
    /// Keyword results come back newest first; every other plan uses the
    /// store's natural order.
    pub fn orders_by_recency(&self) -> bool {
        matches!(self, SearchPlan::Keyword(_))
    }

    pub fn matches(&self, product: &Product) -> bool {
        match self {
            SearchPlan::Keyword(term) => {
                let needle = term.to_lowercase();
                let contains = |value: &str| value.to_lowercase().contains(&needle);
                contains(&product.product_name)
                    || product.description.as_deref().is_some_and(contains)
                    || contains(&product.category)
                    || product.shop_name.as_deref().is_some_and(contains)
            }
            SearchPlan::CategoryCountryCity {
                category,
                country,
                city,
            } => {
                product.category == *category
                    && product.country == *country
                    && product.city.as_deref() == Some(city.as_str())
            }
            SearchPlan::CategoryCountry { category, country } => {
                product.category == *category && product.country == *country
            }
            SearchPlan::Category(category) => product.category == *category,
            SearchPlan::CountryCity { country, city } => {
                product.country == *country && product.city.as_deref() == Some(city.as_str())
            }
            SearchPlan::Country(country) => product.country == *country,
            SearchPlan::Condition(condition) => product.condition == *condition,
            SearchPlan::All => true,
        }
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
