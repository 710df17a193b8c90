//! Category handlers

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
use kvitto_core::models::Category;

/// Request body for creating a category
#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

/// GET /api/categories - List all categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = state.db.list_categories().map_err(AppError::from_core)?;
    Ok(Json(categories))
}

/// POST /api/categories - Create a category
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let req: CreateCategoryRequest = read_json(request).await?;

    let category = state
        .db
        .create_category(&req.name)
        .map_err(AppError::from_core)?;

    info!(id = category.id, name = %category.name, "Created category");
    Ok((StatusCode::CREATED, Json(category)))
}

/// DELETE /api/categories/:name - Delete a category by name
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .db
        .delete_category(&name)
        .map_err(AppError::from_core)?;

    info!(name = %name, "Deleted category");
    Ok(Json(SuccessResponse { success: true }))
}
