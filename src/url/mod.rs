//! URL handling module for catalog-crawler
//!
//! Category identity is the normalized URL string, so every link that enters
//! the traversal goes through [`normalize_category_url`] first. Product links
//! are reduced to their article with [`extract_product_id`].

mod normalize;
mod product_id;

pub use normalize::{normalize_absolute_url, normalize_category_url};
pub use product_id::extract_product_id;
