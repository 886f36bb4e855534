//! Database layer - connection pool, repository, and streaming cursor
//!
//! # Design Principles
//!
//! - The pool is built once by the caller and handed to the router as state
//! - Every leased connection is owned by exactly one value; dropping that
//!   value is the only way it goes back to the pool
//! - Rows are serialized to JSON by Postgres, so the table schema is not
//!   mirrored in Rust

pub mod cursor;
pub mod pool;
pub mod repos;

pub use cursor::{ProductCursor, DEFAULT_BATCH_SIZE};
pub use pool::{create_lazy_pool, create_pool, create_pool_with_options, PoolSettings};
pub use repos::{DbError, ProductRepo};
