//! Payment method handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::read_json;
use crate::{AppError, AppState, SuccessResponse};
use kvitto_core::models::PaymentMethod;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentMethodRequest {
    pub name: String,
}

/// GET /api/payment_methods
pub async fn list_payment_methods(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PaymentMethod>>, AppError> {
    let methods = state
        .db
        .list_payment_methods()
        .map_err(AppError::from_core)?;
    Ok(Json(methods))
}

/// POST /api/payment_methods
pub async fn create_payment_method(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<PaymentMethod>), AppError> {
    let req: CreatePaymentMethodRequest = read_json(request).await?;

    let method = state
        .db
        .create_payment_method(&req.name)
        .map_err(AppError::from_core)?;

    info!(id = method.id, name = %method.name, "Created payment method");
    Ok((StatusCode::CREATED, Json(method)))
}

/// DELETE /api/payment_methods/:id
pub async fn delete_payment_method(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .db
        .delete_payment_method(id)
        .map_err(AppError::from_core)?;

    info!(id, "Deleted payment method");
    Ok(Json(SuccessResponse { success: true }))
}
