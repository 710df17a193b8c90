//! Health check

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{AppError, AppState};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub encrypted: bool,
    pub categories: usize,
    pub payment_methods: usize,
}

/// GET /api/health - Store status
pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, AppError> {
    let encrypted = state.db.is_encrypted().map_err(AppError::from_core)?;
    let categories = state.db.list_categories().map_err(AppError::from_core)?;
    let payment_methods = state
        .db
        .list_payment_methods()
        .map_err(AppError::from_core)?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        encrypted,
        categories: categories.len(),
        payment_methods: payment_methods.len(),
    }))
}
