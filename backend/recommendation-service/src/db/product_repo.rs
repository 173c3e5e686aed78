/// Product Repository
///
/// Catalog lookups used to turn recommended item ids into products.
use async_trait::async_trait;
use sqlx::PgPool;

use super::ProductCatalog;
use crate::error::{AppError, Result};
use crate::models::{ItemId, Product};

// Product ids may be stored as INT4; widen to match `ItemId`.
const SELECT_PRODUCT_BY_ID: &str = r#"
    SELECT id_product::BIGINT AS id_product, name, description
    FROM stock_product
    WHERE id_product = $1
"#;

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id_product: ItemId,
    name: String,
    description: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id_product,
            name: row.name,
            description: row.description,
        }
    }
}

pub struct PgProductCatalog {
    pool: PgPool,
}

impl PgProductCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn find_by_id(&self, item_id: ItemId) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(SELECT_PRODUCT_BY_ID)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Catalog(format!("product lookup {} failed: {}", item_id, e)))?;

        Ok(row.map(Product::from))
    }
}
