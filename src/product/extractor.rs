//! Product detail extraction from the catalog's JSON API
//!
//! Two endpoints describe a product:
//! - `GET {api}/product/{article}?fields=...` returns name, description,
//!   trademark, categories and feature groups
//! - `POST {api}/priceBlock/{article}` returns name, prices, volume prices,
//!   stock level and unit
//!
//! Either may fail; the product is built from whatever arrived. Payloads are
//! decoded into records whose fields are all optional, and entries of an
//! unexpected shape are ignored rather than failing the whole product.

use crate::config::SupplierConfig;
use crate::crawler::HttpFetcher;
use crate::product::description::clean_description;
use crate::product::model::{Attribute, PriceInfo, Product, Supplier, SupplierOffer, NO_DATA};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Fields requested from the product endpoint
pub const PRODUCT_FIELDS: &str =
    "featureGroups,productSet,trademark,name,description,code,price,stock,images,categories";

/// Unit used when the price block does not name one
pub const DEFAULT_UNIT: &str = "шт.";

const BRAND_KEYS: &[&str] = &["Торговая марка", "Бренд", "Производитель", "Марка"];
const COUNTRY_KEYS: &[&str] = &[
    "Страна происхождения",
    "Страна-производитель",
    "Страна изготовления",
];
const WARRANTY_MONTHS_KEY: &str = "Гарантийный срок";
const WARRANTY_KEYS: &[&str] = &[WARRANTY_MONTHS_KEY, "Гарантия", "Срок гарантии"];

/// Errors raised while extracting a product
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("No data for product {article}: {reason}")]
    NoData { article: String, reason: String },
}

/// A product link reduced to its identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    pub article: String,
    pub url: String,
}

/// Produces a normalized product from its reference
#[async_trait]
pub trait ProductExtractor: Send + Sync {
    async fn extract(&self, product: &ProductRef) -> Result<Product, ExtractionError>;
}

// ===== API payloads =====

/// Keeps a value of the expected shape, or whatever arrived instead
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Known(T),
    Unknown(serde_json::Value),
}

impl<T> Lenient<T> {
    fn known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown(_) => None,
        }
    }
}

/// A number that may arrive as a JSON number or a string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Decimal {
    Number(f64),
    Text(String),
}

impl Decimal {
    fn value(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().replace(',', ".").parse().ok(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDetails {
    name: Option<String>,
    description: Option<String>,
    short_description: Option<String>,
    trademark: Option<Lenient<Named>>,
    categories: Option<Vec<Lenient<Named>>>,
    feature_groups: Option<Vec<Lenient<FeatureGroup>>>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureGroup {
    features: Option<Vec<Lenient<Feature>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Feature {
    name: Option<String>,
    feature_values: Option<Vec<FeatureValue>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureValue {
    Object { value: String },
    Text(String),
    Other(serde_json::Value),
}

#[derive(Debug, Default, Deserialize)]
struct PriceBlock {
    payload: Option<PriceBlockPayload>,
}

#[derive(Debug, Deserialize)]
struct PriceBlockPayload {
    product: Option<PricedProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricedProduct {
    name: Option<String>,
    price: Option<Price>,
    volume_prices: Option<Vec<Lenient<VolumePrice>>>,
    stock: Option<Stock>,
    unit_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Price {
    value: Option<Decimal>,
    crossed_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumePrice {
    min_quantity: Option<Decimal>,
    value: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Stock {
    stock_level: Option<serde_json::Value>,
}

// ===== Mapping =====

/// Percent saved going from `from` to `to`, rounded to two decimals
fn discount_percent(from: f64, to: f64) -> f64 {
    if from > to && from > 0.0 {
        round2((from - to) / from * 100.0)
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn attributes(details: Option<&ProductDetails>) -> Vec<Attribute> {
    let mut attributes: Vec<Attribute> = Vec::new();

    let features = details
        .and_then(|d| d.feature_groups.as_ref())
        .into_iter()
        .flatten()
        .filter_map(Lenient::known)
        .filter_map(|group| group.features.as_ref())
        .flatten()
        .filter_map(Lenient::known);

    for feature in features {
        let Some(name) = feature.name.as_deref().filter(|n| !n.is_empty()) else {
            continue;
        };

        let values: Vec<&str> = feature
            .feature_values
            .iter()
            .flatten()
            .filter_map(|v| match v {
                FeatureValue::Object { value } | FeatureValue::Text(value) => Some(value.as_str()),
                FeatureValue::Other(_) => None,
            })
            .collect();

        if values.is_empty() {
            continue;
        }

        let value = values.join(", ");
        match attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    attributes
}

fn find_attribute<'a>(attributes: &'a [Attribute], keys: &[&str]) -> Option<&'a Attribute> {
    keys.iter()
        .find_map(|key| attributes.iter().find(|a| a.name == *key))
}

fn prices(priced: Option<&PricedProduct>) -> Vec<PriceInfo> {
    let Some(price) = priced.and_then(|p| p.price.as_ref()) else {
        return vec![PriceInfo::unknown()];
    };

    let base = price.value.as_ref().and_then(Decimal::value).unwrap_or(0.0);
    let discount = price
        .crossed_price
        .as_ref()
        .and_then(Decimal::value)
        .map_or(0.0, |crossed| discount_percent(crossed, base));

    let mut tiers = vec![PriceInfo {
        qty: 1,
        discount,
        price: base,
    }];

    let volume = priced
        .and_then(|p| p.volume_prices.as_ref())
        .into_iter()
        .flatten()
        .filter_map(Lenient::known);

    for tier in volume {
        let qty = match &tier.min_quantity {
            Some(q) => match q.value() {
                Some(q) if q >= 1.0 => q as u32,
                _ => continue,
            },
            None => 1,
        };
        let value = match &tier.value {
            Some(v) => match v.value() {
                Some(v) => v,
                None => continue,
            },
            None => 0.0,
        };

        tiers.push(PriceInfo {
            qty,
            discount: discount_percent(base, value),
            price: value,
        });
    }

    tiers
}

fn stock_level(priced: Option<&PricedProduct>) -> String {
    match priced
        .and_then(|p| p.stock.as_ref())
        .and_then(|s| s.stock_level.as_ref())
    {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => NO_DATA.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Builds a product from whichever payloads were received
fn build_product(
    product: &ProductRef,
    details: Option<&ProductDetails>,
    price_block: Option<&PriceBlock>,
    supplier: &SupplierConfig,
) -> Product {
    let priced = price_block
        .and_then(|b| b.payload.as_ref())
        .and_then(|p| p.product.as_ref());

    let attributes = attributes(details);

    let title = details
        .and_then(|d| d.name.clone())
        .or_else(|| priced.and_then(|p| p.name.clone()))
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| NO_DATA.to_string());

    let description = details
        .and_then(|d| {
            d.description
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .or(d.short_description.as_deref())
        })
        .map_or_else(|| NO_DATA.to_string(), clean_description);

    let brand = details
        .and_then(|d| d.trademark.as_ref())
        .and_then(Lenient::known)
        .and_then(|t| t.name.clone())
        .or_else(|| find_attribute(&attributes, BRAND_KEYS).map(|a| a.value.clone()))
        .unwrap_or_else(|| NO_DATA.to_string());

    let country_of_origin = find_attribute(&attributes, COUNTRY_KEYS)
        .map_or_else(|| NO_DATA.to_string(), |a| a.value.clone());

    let warranty_months = match find_attribute(&attributes, WARRANTY_KEYS) {
        Some(a) if a.name == WARRANTY_MONTHS_KEY && a.value.chars().all(|c| c.is_ascii_digit()) => {
            format!("{} мес", a.value)
        }
        Some(a) => a.value.clone(),
        None => NO_DATA.to_string(),
    };

    let category = details
        .and_then(|d| d.categories.as_ref())
        .and_then(|c| c.last())
        .and_then(Lenient::known)
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| NO_DATA.to_string());

    let offer = SupplierOffer {
        prices: prices(priced),
        stock: stock_level(priced),
        delivery_time: NO_DATA.to_string(),
        package_info: priced
            .and_then(|p| p.unit_name.clone())
            .unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        purchase_url: product.url.clone(),
    };

    Product {
        title,
        description,
        brand,
        country_of_origin,
        warranty_months,
        category,
        attributes,
        suppliers: vec![Supplier {
            supplier_name: supplier.name.clone(),
            supplier_tel: supplier.phone.clone(),
            offers: vec![offer],
        }],
        ..Product::empty(product.article.clone())
    }
}

/// Extracts products through the catalog's JSON API
pub struct ApiProductExtractor {
    fetcher: Arc<HttpFetcher>,
    api_base_url: String,
    supplier: SupplierConfig,
}

impl ApiProductExtractor {
    pub fn new(fetcher: Arc<HttpFetcher>, api_base_url: &str, supplier: SupplierConfig) -> Self {
        Self {
            fetcher,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            supplier,
        }
    }

    async fn product_details(&self, article: &str) -> Result<ProductDetails, String> {
        let url = format!(
            "{}/product/{}?fields={}",
            self.api_base_url, article, PRODUCT_FIELDS
        );
        let body = self.fetcher.get(&url).await.map_err(|e| e.to_string())?;
        serde_json::from_str(&body).map_err(|e| format!("product API returned invalid JSON: {}", e))
    }

    async fn price_block(&self, article: &str) -> Result<PriceBlock, String> {
        let url = format!("{}/priceBlock/{}", self.api_base_url, article);
        let body = self
            .fetcher
            .post_empty(&url)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::from_str(&body).map_err(|e| format!("price API returned invalid JSON: {}", e))
    }
}

#[async_trait]
impl ProductExtractor for ApiProductExtractor {
    async fn extract(&self, product: &ProductRef) -> Result<Product, ExtractionError> {
        debug!("Extracting product {}", product.article);

        let price_block = self.price_block(&product.article).await;
        let details = self.product_details(&product.article).await;

        match (&details, &price_block) {
            (Err(details_err), Err(price_err)) => {
                return Err(ExtractionError::NoData {
                    article: product.article.clone(),
                    reason: format!("{}; {}", details_err, price_err),
                });
            }
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => {
                warn!("Partial data for product {}: {}", product.article, e);
            }
            (Ok(_), Ok(_)) => {}
        }

        Ok(build_product(
            product,
            details.as_ref().ok(),
            price_block.as_ref().ok(),
            &self.supplier,
        ))
    }
}
