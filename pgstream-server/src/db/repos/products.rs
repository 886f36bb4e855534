//! Product repository
//!
//! Paged reads over the `products` table:
//! - page: LIMIT/OFFSET over `ORDER BY id`, rows as JSON objects
//! - count: total rows for the pagination metadata

use sqlx::PgPool;

use super::DbError;
use crate::models::{Paginated, Pagination, Product};

const PAGE_SQL: &str = r#"
    SELECT row_to_json(p)::text
    FROM products p
    ORDER BY p.id
    LIMIT $1 OFFSET $2
"#;

const COUNT_SQL: &str = "SELECT COUNT(*) FROM products";

/// Product repository
pub struct ProductRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch one page of products plus the total count.
    ///
    /// The whole page is materialized before returning, so a failure in
    /// either query leaves nothing half-sent.
    pub async fn page(&self, pagination: Pagination) -> Result<Paginated<Product>, DbError> {
        let rows: Vec<String> = sqlx::query_scalar(PAGE_SQL)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(self.pool)
            .await?;

        let total = self.count().await?;

        let items = rows
            .into_iter()
            .map(Product::from_json_text)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Paginated {
            items,
            total,
            pagination,
        })
    }

    /// Total number of rows in `products`.
    pub async fn count(&self) -> Result<i64, DbError> {
        let total: i64 = sqlx::query_scalar(COUNT_SQL).fetch_one(self.pool).await?;
        Ok(total)
    }
}
