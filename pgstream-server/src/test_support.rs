//! Helpers for database-backed tests
//!
//! Each call gets its own schema holding a fresh `products` table, and a pool
//! whose connections resolve `products` to that schema. Tests can then run in
//! parallel against one database.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

static NEXT_SCHEMA: AtomicUsize = AtomicUsize::new(0);

/// Build a pool of `max_connections` over a schema seeded with `rows`
/// products (ids `1..=rows`, names `"Product {id}"`).
///
/// Returns the pool and the schema name.
pub async fn isolated_pool(rows: i64, max_connections: u32) -> (PgPool, String) {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let schema = format!(
        "pgstream_test_{}_{}_{}",
        std::process::id(),
        NEXT_SCHEMA.fetch_add(1, Ordering::Relaxed),
        nanos
    );

    let admin = PgPool::connect(&url).await.expect("admin connection failed");
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .expect("create schema");
    sqlx::query(&format!(
        "CREATE TABLE {schema}.products (id BIGINT PRIMARY KEY, name TEXT NOT NULL)"
    ))
    .execute(&admin)
    .await
    .expect("create table");
    // Inserted in reverse so that heap order differs from id order.
    sqlx::query(&format!(
        "INSERT INTO {schema}.products (id, name) \
         SELECT g, 'Product ' || g FROM generate_series($1::bigint, 1, -1) AS g"
    ))
    .bind(rows)
    .execute(&admin)
    .await
    .expect("seed rows");
    admin.close().await;

    let options = PgConnectOptions::from_str(&url)
        .expect("DATABASE_URL should parse")
        .options([("search_path", schema.as_str())]);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .expect("pool creation failed");

    (pool, schema)
}

/// Wait until every connection the pool opened is idle again.
pub async fn wait_for_idle(pool: &PgPool) -> bool {
    for _ in 0..100 {
        if pool.num_idle() as u32 == pool.size() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
