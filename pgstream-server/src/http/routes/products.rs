//! Product endpoints
//!
//! - GET /products: one page, fully buffered, plus pagination metadata
//! - GET /products/stream: every row, streamed from a cursor

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::db::{ProductCursor, ProductRepo};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::models::{PageInfo, Pagination, PaginationParams, Product};
use crate::stream::JsonArrayStream;

/// Page of products
#[derive(Serialize)]
pub struct ProductPageResponse {
    pub products: Vec<Product>,
    pub pagination: PageInfo,
}

/// GET /products?page=&limit=
async fn list_products(
    State(state): State<Arc<AppState>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<ProductPageResponse>, ApiError> {
    let params = match query {
        Ok(Query(pairs)) => PaginationParams::from_pairs(pairs),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable query string, using default pagination");
            PaginationParams::default()
        }
    };
    let pagination = Pagination::from(params);
    let page = ProductRepo::new(&state.pool)
        .page(pagination)
        .await
        .map_err(ApiError::FetchProducts)?;

    let pagination = page.page_info();
    Ok(Json(ProductPageResponse {
        products: page.items,
        pagination,
    }))
}

/// GET /products/stream
///
/// Errors raised before the first row is read become a 500. Once the body
/// has started, a failing row aborts the transfer instead.
async fn stream_products(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let cursor = ProductCursor::open(&state.pool, state.batch_size)
        .await
        .map_err(ApiError::StreamProducts)?;

    let stream = JsonArrayStream::open(cursor, state.stream)
        .await
        .map_err(ApiError::StreamProducts)?;

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        stream.into_body(),
    )
        .into_response())
}

/// Product routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/stream", get(stream_products))
}
