//! Expense handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use super::read_json;
use crate::{AppError, AppState, SuccessResponse};
use kvitto_core::models::{Expense, ExpenseFilter, NewExpense};

/// Query parameters for listing expenses
#[derive(Debug, Default, Deserialize)]
pub struct ExpenseQuery {
    pub category_id: Option<i64>,
    pub payment_method_id: Option<i64>,
    /// Inclusive, YYYY-MM-DD
    pub start_date: Option<NaiveDate>,
    /// Inclusive, YYYY-MM-DD
    pub end_date: Option<NaiveDate>,
}

impl From<ExpenseQuery> for ExpenseFilter {
    fn from(q: ExpenseQuery) -> Self {
        ExpenseFilter {
            category_id: q.category_id,
            payment_method_id: q.payment_method_id,
            start_date: q.start_date,
            end_date: q.end_date,
        }
    }
}

/// GET /api/expenses - List expenses matching the filters
///
/// Answers 404 when nothing matches.
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExpenseQuery>,
) -> Result<Json<Vec<Expense>>, AppError> {
    let filter = ExpenseFilter::from(query);
    if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        if start > end {
            return Err(AppError::bad_request("start_date is after end_date"));
        }
    }

    let expenses = state
        .db
        .list_expenses(&filter)
        .map_err(AppError::from_core)?;

    if expenses.is_empty() {
        return Err(AppError::not_found("No expenses found"));
    }
    Ok(Json(expenses))
}

/// POST /api/expenses - Store an expense
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<Expense>), AppError> {
    let req: NewExpense = read_json(request).await?;

    let expense = state.db.create_expense(&req).map_err(AppError::from_core)?;

    info!(
        transaction_id = expense.transaction_id,
        amount = %expense.amount,
        "Created expense"
    );
    Ok((StatusCode::CREATED, Json(expense)))
}

/// GET /api/expenses/:id
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Expense>, AppError> {
    let expense = state
        .db
        .get_expense(id)
        .map_err(AppError::from_core)?
        .ok_or_else(|| AppError::not_found(&format!("Expense {} not found", id)))?;

    Ok(Json(expense))
}

/// DELETE /api/expenses/:id
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_expense(id).map_err(AppError::from_core)?;

    info!(transaction_id = id, "Deleted expense");
    Ok(Json(SuccessResponse { success: true }))
}
