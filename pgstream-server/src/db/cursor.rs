//! Server-side cursor over `products`
//!
//! The cursor lives in its own read transaction, which owns the pooled
//! connection. Rows are pulled with `FETCH FORWARD n`, one batch at a time,
//! and only when the consumer has drained the previous batch.
//!
//! Dropping the cursor (or the row stream built from it) at any point rolls
//! the transaction back and hands the connection back to the pool. Reaching
//! the end does the same, so once the last row is out nothing can fail.

use std::collections::VecDeque;

use futures::stream::{self, BoxStream, StreamExt};
use sqlx::{PgPool, Postgres, Transaction};

use super::DbError;
use crate::models::Product;
use crate::stream::RowSource;

/// Rows requested per `FETCH`
pub const DEFAULT_BATCH_SIZE: u32 = 100;

const CURSOR_NAME: &str = "pgstream_products";

/// Open cursor over all products in `id` order
pub struct ProductCursor {
    tx: Transaction<'static, Postgres>,
    batch_size: u32,
}

impl ProductCursor {
    /// Lease a connection, start a transaction, and declare the cursor.
    ///
    /// Planning errors (missing table, bad column) surface here, before
    /// anything has been written to the client.
    pub async fn open(pool: &PgPool, batch_size: u32) -> Result<Self, DbError> {
        let mut tx = pool.begin().await?;

        let declare = format!(
            "DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR \
             SELECT row_to_json(p)::text FROM products p ORDER BY p.id"
        );
        sqlx::query(&declare)
            .persistent(false)
            .execute(&mut *tx)
            .await?;

        tracing::debug!(batch_size, "Declared product cursor");

        Ok(Self {
            tx,
            batch_size: batch_size.max(1),
        })
    }
}

struct CursorState {
    tx: Transaction<'static, Postgres>,
    fetch_sql: String,
    batch_size: usize,
    buffered: VecDeque<String>,
    exhausted: bool,
}

impl CursorState {
    async fn next_row(mut self) -> Result<Option<(Product, Self)>, DbError> {
        loop {
            if let Some(text) = self.buffered.pop_front() {
                let product = Product::from_json_text(text)?;
                return Ok(Some((product, self)));
            }

            if self.exhausted {
                // Read-only: ending here drops the transaction, which rolls
                // back and releases the connection without a fallible round trip.
                return Ok(None);
            }

            let batch: Vec<String> = sqlx::query_scalar(&self.fetch_sql)
                .persistent(false)
                .fetch_all(&mut *self.tx)
                .await?;

            self.exhausted = batch.len() < self.batch_size;
            self.buffered.extend(batch);
        }
    }
}

impl RowSource for ProductCursor {
    fn into_rows(self) -> BoxStream<'static, Result<Product, DbError>> {
        let state = CursorState {
            tx: self.tx,
            fetch_sql: format!("FETCH FORWARD {} FROM {CURSOR_NAME}", self.batch_size),
            batch_size: self.batch_size as usize,
            buffered: VecDeque::new(),
            exhausted: false,
        };

        stream::try_unfold(state, CursorState::next_row).boxed()
    }
}
