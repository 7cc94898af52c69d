//! Paginated collection query controller and expense domain types

pub mod client;
pub mod controller;
pub mod editor;
pub mod error;
pub mod expr;
pub mod filter;
pub mod models;
pub mod paging;
pub mod query;
pub mod scheduler;
pub mod session;
pub mod sort;
pub mod summary;
pub mod url;

pub use client::{AccountClient, AccountRef, CollectionClient};
pub use controller::{CollectionController, ControllerOptions, TableUpdate};
pub use editor::{DeleteConfirmation, Editor, EditorMode, ExpenseForm};
pub use error::{CoreError, CoreResult, ErrorSeverity};
pub use filter::{FilterSet, FilterTerm, Operator};
pub use models::{
    find_column, ApiResponse, AuthToken, Column, ColumnKind, Credentials, Expense, ExpenseRequest,
    PageResult, User, EXPENSE_COLUMNS,
};
pub use paging::Pagination;
pub use query::PageQuery;
pub use session::Session;
pub use sort::{SortDirection, SortSpec, SortState};
pub use summary::{fetch_summary, summary_query, ExpenseSummary, YearWeek, SUMMARY_DAYS};
