//! Domain models
//!
//! - pagination: page/limit parsing and page metadata
//! - product: a product row as serialized by the database

pub mod pagination;
pub mod product;

pub use pagination::{PageInfo, Paginated, Pagination, PaginationParams};
pub use product::Product;
