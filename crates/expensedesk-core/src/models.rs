//! Core data models: table columns, expense records and wire envelopes

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Value type of a column
///
/// The controller treats every filter value as opaque text; the kind only
/// tells renderers and the development backend how to compare values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Date,
}

/// A statically declared table column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Field name used on the wire
    pub id: &'static str,
    /// Header label
    pub label: &'static str,
    pub kind: ColumnKind,
}

/// Columns of the expense table, in declaration order
pub const EXPENSE_COLUMNS: &[Column] = &[
    Column { id: "title", label: "Title", kind: ColumnKind::Text },
    Column { id: "category", label: "Category", kind: ColumnKind::Text },
    Column { id: "amount", label: "Amount", kind: ColumnKind::Number },
    Column { id: "date", label: "Date", kind: ColumnKind::Date },
];

/// Look up a column by id
pub fn find_column(columns: &[Column], id: &str) -> Option<Column> {
    columns.iter().copied().find(|c| c.id == id)
}

/// Expense record as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Unique expense identifier
    pub id: i64,
    pub title: String,
    pub category: String,
    pub amount: Decimal,
    /// Moment of the expense (the editor works with its calendar day)
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Payload for creating or updating an expense
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRequest {
    pub title: String,
    pub category: String,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

impl ExpenseRequest {
    /// Materialize the request into a stored record
    pub fn into_expense(self, id: i64) -> Expense {
        Expense {
            id,
            title: self.title,
            category: self.category,
            amount: self.amount,
            date: self.date,
            description: if self.description.is_empty() {
                None
            } else {
                Some(self.description)
            },
        }
    }
}

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Username and password sent form-encoded to `/auth/login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Body of a successful login; the same token is also set as the `jwt` cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub access_token: String,
}

/// Envelope wrapping every backend response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Build an envelope stamped with the current time
    pub fn new(status_code: u16, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status_code,
            message: message.into(),
            timestamp: Some(Utc::now()),
            data,
        }
    }
}

/// One page of a collection (the server's page envelope)
///
/// Replaced wholesale on every applied fetch, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<R> {
    #[serde(rename = "content")]
    pub rows: Vec<R>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub size: u32,
    pub number: u32,
}

impl<R> PageResult<R> {
    /// An empty first page, used before anything was fetched
    pub fn empty(size: u32) -> Self {
        Self {
            rows: Vec::new(),
            total_elements: 0,
            total_pages: 0,
            size,
            number: 0,
        }
    }

    /// Slice `all` into the page `number` of `size` rows
    pub fn from_slice(all: &[R], number: u32, size: u32) -> Self
    where
        R: Clone,
    {
        let size = size.max(1);
        let total = all.len() as u64;
        let start = (number as usize).saturating_mul(size as usize);
        let rows = all.iter().skip(start).take(size as usize).cloned().collect();
        Self {
            rows,
            total_elements: total,
            total_pages: total.div_ceil(size as u64) as u32,
            size,
            number,
        }
    }
}
