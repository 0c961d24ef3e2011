//! redb-based product catalog
//!
//! One table: `products`, key = product_id, value = JSON-serialized
//! [`CatalogProduct`]. The catalog is the authority for unit prices and
//! purchasability; order placement never trusts client-supplied prices.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared::error::{AppError, ErrorCode};
use shared::util::now_millis;

/// Table for products: key = product_id, value = JSON-serialized CatalogProduct
const PRODUCTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("products");

/// A sellable product as known to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub product_id: String,
    pub seller_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current unit price. Orders copy this at placement time.
    pub price: f64,
    /// False hides the product from purchase without deleting it.
    pub is_purchasable: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Product not found: {0}")]
    ProductNotFound(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ProductNotFound(id) => {
                AppError::new(ErrorCode::ProductNotFound).with_detail("product_id", id)
            }
            other => AppError::database(other.to_string()),
        }
    }
}

/// Product catalog backed by redb.
#[derive(Clone)]
pub struct CatalogStore {
    db: Arc<Database>,
}

impl CatalogStore {
    /// Open or create the catalog database at the given path.
    pub fn open(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PRODUCTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Open an in-memory catalog (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> CatalogResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PRODUCTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Insert or replace a product. `created_at` of an existing product is
    /// preserved; `updated_at` is stamped here.
    pub fn upsert_product(&self, product: &CatalogProduct) -> CatalogResult<CatalogProduct> {
        let txn = self.db.begin_write()?;
        let stored = {
            let mut table = txn.open_table(PRODUCTS_TABLE)?;

            let created_at = match table.get(product.product_id.as_str())? {
                Some(value) => {
                    let existing: CatalogProduct = serde_json::from_slice(value.value())?;
                    existing.created_at
                }
                None => now_millis(),
            };

            let mut stored = product.clone();
            stored.created_at = created_at;
            stored.updated_at = now_millis();

            let value = serde_json::to_vec(&stored)?;
            table.insert(stored.product_id.as_str(), value.as_slice())?;
            stored
        };
        txn.commit()?;
        Ok(stored)
    }

    /// Look up a product by id.
    pub fn get_product(&self, product_id: &str) -> CatalogResult<Option<CatalogProduct>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRODUCTS_TABLE)?;

        match table.get(product_id)? {
            Some(value) => {
                let product: CatalogProduct = serde_json::from_slice(value.value())?;
                Ok(Some(product))
            }
            None => Ok(None),
        }
    }

    /// All products, ordered by product_id.
    pub fn list_products(&self) -> CatalogResult<Vec<CatalogProduct>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRODUCTS_TABLE)?;

        let mut products = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let product: CatalogProduct = serde_json::from_slice(value.value())?;
            products.push(product);
        }

        Ok(products)
    }

    /// Flip purchasability without touching the rest of the product.
    pub fn set_purchasable(&self, product_id: &str, purchasable: bool) -> CatalogResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PRODUCTS_TABLE)?;

            let mut product = match table.get(product_id)? {
                Some(value) => serde_json::from_slice::<CatalogProduct>(value.value())?,
                None => return Err(CatalogError::ProductNotFound(product_id.to_string())),
            };

            product.is_purchasable = purchasable;
            product.updated_at = now_millis();

            let value = serde_json::to_vec(&product)?;
            table.insert(product_id, value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product(product_id: &str, price: f64) -> CatalogProduct {
        CatalogProduct {
            product_id: product_id.to_string(),
            seller_id: "seller-1".to_string(),
            name: format!("Product {}", product_id),
            description: None,
            price,
            is_purchasable: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let store = CatalogStore::open_in_memory().unwrap();

        assert!(store.get_product("P1").unwrap().is_none());

        store.upsert_product(&sample_product("P1", 500.0)).unwrap();

        let product = store.get_product("P1").unwrap().unwrap();
        assert_eq!(product.price, 500.0);
        assert!(product.is_purchasable);
        assert!(product.created_at > 0);
    }

    #[test]
    fn test_upsert_preserves_created_at() {
        let store = CatalogStore::open_in_memory().unwrap();

        let first = store.upsert_product(&sample_product("P1", 500.0)).unwrap();

        let mut updated = sample_product("P1", 650.0);
        updated.created_at = 999_999; // must be ignored
        let second = store.upsert_product(&updated).unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.price, 650.0);
    }

    #[test]
    fn test_list_products() {
        let store = CatalogStore::open_in_memory().unwrap();
        store.upsert_product(&sample_product("P1", 100.0)).unwrap();
        store.upsert_product(&sample_product("P2", 200.0)).unwrap();

        let products = store.list_products().unwrap();
        assert_eq!(products.len(), 2);
    }

    #[test]
    fn test_set_purchasable() {
        let store = CatalogStore::open_in_memory().unwrap();
        store.upsert_product(&sample_product("P1", 100.0)).unwrap();

        store.set_purchasable("P1", false).unwrap();
        assert!(!store.get_product("P1").unwrap().unwrap().is_purchasable);

        let err = store.set_purchasable("missing", true).unwrap_err();
        assert!(matches!(err, CatalogError::ProductNotFound(_)));
    }
}
