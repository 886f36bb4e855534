//! pgstream-server: HTTP access to a Postgres `products` table
//!
//! Two read paths over the same table:
//! - `/products` returns one LIMIT/OFFSET page plus pagination metadata
//! - `/products/stream` streams every row as a JSON array while a
//!   server-side cursor is open

pub mod db;
pub mod http;
pub mod models;
pub mod stream;

#[cfg(test)]
mod test_support;

pub use db::{create_pool, DbError, PoolSettings};
pub use http::{build_router, run_server, AppState, ServerConfig, ServerError};
pub use stream::{JsonArrayStream, RowSource, StreamOptions};
