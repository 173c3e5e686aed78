/// Purchase Repository
///
/// Reads the purchase history (who bought which product) from PostgreSQL.
use futures::stream::{BoxStream, StreamExt};
use sqlx::PgPool;

use super::PurchaseSource;
use crate::error::{AppError, Result};
use crate::models::{ItemId, PurchaseRecord};

// Product ids may be stored as INT4; widen to match `ItemId`.
const SELECT_USER_ITEMS: &str = r#"
    SELECT p.user_name, p.id_product::BIGINT AS id_product
    FROM stock_purchase p
    WHERE p.user_name IS NOT NULL
"#;

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    user_name: String,
    id_product: ItemId,
}

pub struct PgPurchaseSource {
    pool: PgPool,
}

impl PgPurchaseSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PurchaseSource for PgPurchaseSource {
    fn purchases(&self) -> BoxStream<'_, Result<PurchaseRecord>> {
        sqlx::query_as::<_, PurchaseRow>(SELECT_USER_ITEMS)
            .fetch(&self.pool)
            .map(|row| {
                row.map(|r| PurchaseRecord::new(r.user_name, r.id_product))
                    .map_err(|e| AppError::Extraction(format!("purchase query failed: {}", e)))
            })
            .boxed()
    }
}
