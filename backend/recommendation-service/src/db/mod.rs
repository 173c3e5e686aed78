//! External collaborators: the purchase history source and the product
//! catalog. PostgreSQL implementations live in the submodules; the
//! in-memory ones back tests and embedded use.

pub mod product_repo;
pub mod purchase_repo;

pub use product_repo::PgProductCatalog;
pub use purchase_repo::PgPurchaseSource;

use crate::error::Result;
use crate::models::{ItemId, Product, PurchaseRecord};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Pull-based, read-only supplier of raw purchase rows.
///
/// No ordering or pagination is assumed; the stream is finite.
pub trait PurchaseSource: Send + Sync {
    fn purchases(&self) -> BoxStream<'_, Result<PurchaseRecord>>;
}

/// Catalog lookup from item id to product.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_by_id(&self, item_id: ItemId) -> Result<Option<Product>>;
}

/// Purchase source over a replaceable in-memory row set
#[derive(Default)]
pub struct InMemoryPurchaseSource {
    rows: RwLock<Vec<PurchaseRecord>>,
}

impl InMemoryPurchaseSource {
    pub fn new(rows: Vec<PurchaseRecord>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    pub fn replace(&self, rows: Vec<PurchaseRecord>) {
        *self.rows.write() = rows;
    }

    pub fn push(&self, row: PurchaseRecord) {
        self.rows.write().push(row);
    }
}

impl PurchaseSource for InMemoryPurchaseSource {
    fn purchases(&self) -> BoxStream<'_, Result<PurchaseRecord>> {
        let rows = self.rows.read().clone();
        stream::iter(rows.into_iter().map(Ok)).boxed()
    }
}

/// Catalog backed by a map
#[derive(Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<ItemId, Product>>,
}

impl InMemoryProductCatalog {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: RwLock::new(products.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub fn insert(&self, product: Product) {
        self.products.write().insert(product.id, product);
    }

    pub fn remove(&self, item_id: ItemId) -> Option<Product> {
        self.products.write().remove(&item_id)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn find_by_id(&self, item_id: ItemId) -> Result<Option<Product>> {
        Ok(self.products.read().get(&item_id).cloned())
    }
}
