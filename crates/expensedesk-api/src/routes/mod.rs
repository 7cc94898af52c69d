//! Route modules for the development backend
//!
//! - expenses: paged listing and CRUD of the expense collection
//! - auth: login, logout and identity of the caller
//! - health: liveness check
//!
//! Each area keeps its handlers in `api.rs` and re-exports them from `mod.rs`.

pub mod auth;
pub mod expenses;
pub mod health;

use axum::http::StatusCode;
use axum::Json;
use expensedesk_core::ApiResponse;
use serde::Serialize;

/// Wrap `data` in the response envelope and log the outcome
pub fn respond<T: Serialize>(
    status: StatusCode,
    message: String,
    data: Option<T>,
) -> (StatusCode, Json<ApiResponse<T>>) {
    log::info!("{}", message);
    (status, Json(ApiResponse::new(status.as_u16(), message, data)))
}
