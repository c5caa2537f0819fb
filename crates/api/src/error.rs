//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CheckoutError, WorkflowError};
use market_store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Order creation failed.
    Checkout(CheckoutError),
    /// Status workflow rejection.
    Workflow(WorkflowError),
    /// Store infrastructure failure.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Workflow(err) => workflow_error_to_response(err),
            ApiError::Store(err) => {
                tracing::error!(error = %err, "store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        // The caller should re-read cart and catalog before trying again.
        CheckoutError::ProductsUnavailable { .. }
        | CheckoutError::InsufficientStock { .. }
        | CheckoutError::StockChanged => (StatusCode::CONFLICT, err.to_string()),
        CheckoutError::Store(store_err) => {
            tracing::error!(error = %store_err, "checkout aborted by store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn workflow_error_to_response(err: WorkflowError) -> (StatusCode, String) {
    match &err {
        WorkflowError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        WorkflowError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
        WorkflowError::Store(store_err) => {
            tracing::error!(error = %store_err, "workflow aborted by store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        ApiError::Workflow(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
