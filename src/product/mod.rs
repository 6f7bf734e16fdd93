//! Product module: the normalized product record and how it is obtained
//!
//! - `model`: `Product` and its nested records
//! - `extractor`: `ProductExtractor` and the JSON API implementation
//! - `description`: HTML description cleanup
//! - `pipeline`: link → extract → upsert
//! - `repository`: upsert keyed by article

mod description;
mod extractor;
mod model;
mod pipeline;
mod repository;

pub use description::clean_description;
pub use extractor::{
    ApiProductExtractor, ExtractionError, ProductExtractor, ProductRef, DEFAULT_UNIT,
    PRODUCT_FIELDS,
};
pub use model::{Attribute, PriceInfo, Product, Supplier, SupplierOffer, ERROR_MARKER, NO_DATA};
pub use pipeline::{PipelineReport, ProductPipeline};
pub use repository::{DocumentProductRepository, ProductRepository, PRODUCT_COLLECTION};
