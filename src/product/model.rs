use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for fields the site did not provide
pub const NO_DATA: &str = "Нет данных";

/// Title prefix of a product that could not be extracted
pub const ERROR_MARKER: &str = "Ошибка";

/// A normalized catalog product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub title: String,
    pub description: String,
    /// Stable identifier, unique per product
    pub article: String,
    pub brand: String,
    pub country_of_origin: String,
    pub warranty_months: String,
    pub category: String,
    pub attributes: Vec<Attribute>,
    pub suppliers: Vec<Supplier>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product with every descriptive field set to [`NO_DATA`]
    pub fn empty(article: impl Into<String>) -> Self {
        Self {
            title: NO_DATA.to_string(),
            description: NO_DATA.to_string(),
            article: article.into(),
            brand: NO_DATA.to_string(),
            country_of_origin: NO_DATA.to_string(),
            warranty_months: NO_DATA.to_string(),
            category: NO_DATA.to_string(),
            attributes: Vec::new(),
            suppliers: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns true if this product carries no usable data
    pub fn is_error_tagged(&self) -> bool {
        self.title.starts_with(ERROR_MARKER) || self.title == NO_DATA
    }
}

/// A named product characteristic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Who sells the product and on what terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_name: String,
    pub supplier_tel: String,
    pub offers: Vec<SupplierOffer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierOffer {
    /// Price tiers, base price first
    pub prices: Vec<PriceInfo>,
    pub stock: String,
    pub delivery_time: String,
    pub package_info: String,
    pub purchase_url: String,
}

/// Price for orders of at least `qty` units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub qty: u32,
    /// Percent off, two decimals
    pub discount: f64,
    pub price: f64,
}

impl PriceInfo {
    pub fn unknown() -> Self {
        Self {
            qty: 1,
            discount: 0.0,
            price: 0.0,
        }
    }
}
