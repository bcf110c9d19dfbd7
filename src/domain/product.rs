use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

pub const CONDITION_NEW: &str = "New";
pub const CONDITION_USED: &str = "Second Hand";

/// Category labels counted by the global statistics rollup. Products filed
/// under any other label are stored and searchable but not counted.
pub const CATEGORY_LABELS: [&str; 16] = [
    "Electronics",
    "Clothing",
    "Shoes",
    "Agriculture/Elevage/Peche",
    "Sports",
    "Books",
    "Toys",
    "Automobile/Accessoires",
    "Moto/Accessoire",
    "Home & Garden",
    "Foods",
    "Beverages",
    "Quincaillerie",
    "House/Flats/Lands",
    "School Fournitures",
    "Jewelleries",
];

pub const DEFAULT_QUANTITY: i32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub user_id: i64,
    pub product_name: String,
    pub description: Option<String>,
    pub category: String,
    pub condition: String,
    pub price: Decimal,
    pub currency: String,
    pub country: String,
    pub city: Option<String>,
    pub shop_name: Option<String>,
    pub contact_phone: Option<String>,
    pub quantity: i32,
    pub shipping_available: bool,
    pub local_pickup: bool,
    pub images: Vec<String>,
    pub video_url: Option<String>,
    /// Counted from like rows on every read.
    pub likes_count: i64,
    /// Counted from comment rows on every read.
    pub comments_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Raw creation payload, as submitted over JSON or assembled from multipart
/// text fields. Nothing here is trusted until the catalog service validates
/// it into a [`NewProduct`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub user_id: Option<i64>,
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub price: Option<String>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub shop_name: Option<String>,
    pub contact_phone: Option<String>,
    pub quantity: Option<i32>,
    pub shipping_available: Option<bool>,
    pub local_pickup: Option<bool>,
    #[serde(default)]
    pub images: Vec<String>,
    pub video_url: Option<String>,
}

/// A validated product ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub user_id: i64,
    pub product_name: String,
    pub description: Option<String>,
    pub category: String,
    pub condition: String,
    pub price: Decimal,
    pub currency: String,
    pub country: String,
    pub city: Option<String>,
    pub shop_name: Option<String>,
    pub contact_phone: Option<String>,
    pub quantity: i32,
    pub shipping_available: bool,
    pub local_pickup: bool,
    pub images: Vec<String>,
    pub video_url: Option<String>,
}

/// Partial update payload.
///
/// Omitted fields are left untouched. For the nullable fields an explicit
/// JSON `null` clears the stored value (`Some(None)`); for required fields a
/// `null` is treated the same as omission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub condition: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub price: Option<String>,
    pub currency: Option<String>,
    pub country: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub city: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub shop_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub contact_phone: Option<Option<String>>,
    pub quantity: Option<i32>,
    pub shipping_available: Option<bool>,
    pub local_pickup: Option<bool>,
    pub images: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub video_url: Option<Option<String>>,
}

/// A validated patch. Same presence semantics as [`ProductPatch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    pub product_name: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub city: Option<Option<String>>,
    pub shop_name: Option<Option<String>>,
    pub contact_phone: Option<Option<String>>,
    pub quantity: Option<i32>,
    pub shipping_available: Option<bool>,
    pub local_pickup: Option<bool>,
    pub images: Option<Vec<String>>,
    pub video_url: Option<Option<String>>,
}

impl ProductChanges {
    /// Merges the present fields into `product`. Timestamps are the caller's job.
    pub fn apply_to(self, product: &mut Product) {
        if let Some(product_name) = self.product_name {
            product.product_name = product_name;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(condition) = self.condition {
            product.condition = condition;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(currency) = self.currency {
            product.currency = currency;
        }
        if let Some(country) = self.country {
            product.country = country;
        }
        if let Some(city) = self.city {
            product.city = city;
        }
        if let Some(shop_name) = self.shop_name {
            product.shop_name = shop_name;
        }
        if let Some(contact_phone) = self.contact_phone {
            product.contact_phone = contact_phone;
        }
        if let Some(quantity) = self.quantity {
            product.quantity = quantity;
        }
        if let Some(shipping_available) = self.shipping_available {
            product.shipping_available = shipping_available;
        }
        if let Some(local_pickup) = self.local_pickup {
            product.local_pickup = local_pickup;
        }
        if let Some(images) = self.images {
            product.images = images;
        }
        if let Some(video_url) = self.video_url {
            product.video_url = video_url;
        }
    }
}

/// Distinguishes a present `null` (`Some(None)`) from an omitted field, which
/// `#[serde(default)]` turns into `None`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Text(String),
    Number(serde_json::Number),
}

/// Prices arrive as either JSON strings or JSON numbers; keep the text and
/// let validation decide whether it parses.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawNumber>::deserialize(deserializer)?;
    Ok(raw.map(|raw| match raw {
        RawNumber::Text(text) => text,
        RawNumber::Number(number) => number.to_string(),
    }))
}
