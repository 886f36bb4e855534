//! API error type with IntoResponse
//!
//! Errors become `{"error": "..."}` with a status code. Database causes are
//! logged and never sent to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::DbError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Listing query failed (500, logged)
    FetchProducts(DbError),

    /// Stream could not be started (500, logged)
    StreamProducts(DbError),
}

impl ApiError {
    fn client_message(&self) -> &'static str {
        match self {
            Self::FetchProducts(_) => "An error occurred while fetching products",
            Self::StreamProducts(_) => "An error occurred while streaming products",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let cause = match &self {
            Self::FetchProducts(e) | Self::StreamProducts(e) => e,
        };
        tracing::error!(error = %cause, "{}", self.client_message());

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.client_message() })),
        )
            .into_response()
    }
}
