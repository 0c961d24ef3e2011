//! Product catalog: the pricing authority for order placement.

pub mod store;

pub use store::{CatalogError, CatalogProduct, CatalogResult, CatalogStore};
