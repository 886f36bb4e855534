//! Repository implementations for database access

pub mod products;

pub use products::ProductRepo;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("malformed row: {0}")]
    Json(#[from] serde_json::Error),
}
