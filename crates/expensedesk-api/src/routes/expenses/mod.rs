//! Expense routes - paged listing with filter and sort, CRUD by id
//!
//! Structure:
//! - api.rs: JSON endpoints

pub mod api;

pub use api::{create_expense, delete_expense, get_expense, list_expenses, update_expense};
