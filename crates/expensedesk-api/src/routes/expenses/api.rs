//! Expense JSON endpoints
//!
//! Endpoints:
//! - list_expenses: `GET /expenses?page&size&sort&filter`
//! - get_expense: `GET /expenses/{id}`
//! - create_expense: `POST /expenses`
//! - update_expense: `PUT /expenses/{id}`
//! - delete_expense: `DELETE /expenses/{id}`

use crate::error::ApiError;
use crate::routes::respond;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use expensedesk_core::{ExpenseRequest, PageQuery, SortSpec};
use std::collections::HashMap;

/// Page size when the request names none
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Read `page`, `size`, `sort` and `filter`; blank `sort`/`filter` count as absent
pub fn page_query(params: &HashMap<String, String>) -> Result<PageQuery, ApiError> {
    let number = |key: &str, default: u32| -> Result<u32, ApiError> {
        match params.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ApiError::bad_request(format!("Invalid {} '{}'", key, raw))),
            None => Ok(default),
        }
    };
    let page = number("page", 0)?;
    let size = number("size", DEFAULT_PAGE_SIZE)?;
    if size == 0 {
        return Err(ApiError::bad_request("size must be greater than 0"));
    }

    let sort = params
        .get("sort")
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| SortSpec::parse(raw))
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let filter = params.get("filter").filter(|raw| !raw.trim().is_empty()).cloned();

    Ok(PageQuery::new(page, size).with_sort(sort).with_filter(filter))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = page_query(&params)?;
    let store = state.store.read().await;
    let page = store.list(&query)?;
    Ok(respond(StatusCode::OK, "Fetched all expenses".to_string(), Some(page)))
}

pub async fn get_expense(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let expense = state.store.read().await.get(id)?;
    Ok(respond(StatusCode::OK, format!("Fetched expense with ID: {}", id), Some(expense)))
}

pub async fn create_expense(
    State(state): State<AppState>,
    Json(request): Json<ExpenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let expense = state.store.write().await.create(request);
    Ok(respond(StatusCode::CREATED, "Expense created successfully".to_string(), Some(expense)))
}

pub async fn update_expense(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ExpenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let expense = state.store.write().await.update(id, request)?;
    Ok(respond(
        StatusCode::OK,
        format!("Expense updated successfully for ID: {}", id),
        Some(expense),
    ))
}

/// Answers 204 without a body
pub async fn delete_expense(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.write().await.delete(id)?;
    log::info!("Expense deleted successfully with ID: {}", id);
    Ok(StatusCode::NO_CONTENT)
}
