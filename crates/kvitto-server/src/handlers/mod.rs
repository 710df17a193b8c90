//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod categories;
pub mod expenses;
pub mod health;
pub mod payment_methods;

// Re-export all handlers for use in router
pub use categories::*;
pub use expenses::*;
pub use health::*;
pub use payment_methods::*;

use axum::extract::Request;
use serde::de::DeserializeOwned;

use crate::{AppError, MAX_BODY_SIZE};

/// Read a JSON request body, answering malformed input with 400
pub(crate) async fn read_json<T: DeserializeOwned>(request: Request) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::bad_request(&format!("Invalid JSON: {}", e)))
}
