//! Error types for expensedesk-core
//!
//! Every failure in the controller is per-operation and recoverable by
//! repeating the user action, so the taxonomy carries codes, severities and
//! suggestions instead of being fatal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Column id not declared by the table
    UnknownColumn,
    /// Page size of zero
    InvalidPageSize,
    /// Filter expression could not be parsed
    InvalidFilter,
    /// Sort parameter could not be parsed
    InvalidSort,
    /// Editor form failed validation
    ValidationError,
    /// Network or connection failure
    TransportError,
    /// Request exceeded the configured timeout
    Timeout,
    /// Backend answered with an error status
    ServerError,
    /// Session missing or expired
    Unauthorized,
    /// Record not found
    NotFound,
    /// Backend answered with something we cannot use
    ProtocolError,
    /// Operation attempted after the session was closed
    SessionClosed,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::UnknownColumn => write!(f, "UNKNOWN_COLUMN"),
            ErrorCode::InvalidPageSize => write!(f, "INVALID_PAGE_SIZE"),
            ErrorCode::InvalidFilter => write!(f, "INVALID_FILTER"),
            ErrorCode::InvalidSort => write!(f, "INVALID_SORT"),
            ErrorCode::ValidationError => write!(f, "VALIDATION_ERROR"),
            ErrorCode::TransportError => write!(f, "TRANSPORT_ERROR"),
            ErrorCode::Timeout => write!(f, "TIMEOUT"),
            ErrorCode::ServerError => write!(f, "SERVER_ERROR"),
            ErrorCode::Unauthorized => write!(f, "UNAUTHORIZED"),
            ErrorCode::NotFound => write!(f, "NOT_FOUND"),
            ErrorCode::ProtocolError => write!(f, "PROTOCOL_ERROR"),
            ErrorCode::SessionClosed => write!(f, "SESSION_CLOSED"),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Informational
    Info,
    /// Warning - the user can fix the input
    Warning,
    /// Error - operation failed
    Error,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "info"),
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
        }
    }
}

/// Detailed error information for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Suggestions for resolution
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ErrorDetails {
    /// Create a new error detail
    pub fn new(code: ErrorCode, message: String) -> Self {
        Self {
            code,
            message,
            suggestions: vec![],
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        for suggestion in &self.suggestions {
            write!(f, "\n  - {}", suggestion)?;
        }
        Ok(())
    }
}

/// Main error type for expensedesk-core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Unknown column: {column}")]
    UnknownColumn { column: String },

    #[error("Invalid page size: {size}")]
    InvalidPageSize { size: u32 },

    #[error("Invalid filter expression: {message}")]
    InvalidFilter { message: String },

    #[error("Invalid sort parameter: {value}")]
    InvalidSort { value: String },

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Expense not found: {id}")]
    NotFound { id: i64 },

    #[error("Unexpected response: {message}")]
    Protocol { message: String },

    #[error("Session closed")]
    SessionClosed,
}

impl CoreError {
    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::UnknownColumn { .. } => ErrorCode::UnknownColumn,
            CoreError::InvalidPageSize { .. } => ErrorCode::InvalidPageSize,
            CoreError::InvalidFilter { .. } => ErrorCode::InvalidFilter,
            CoreError::InvalidSort { .. } => ErrorCode::InvalidSort,
            CoreError::Validation { .. } => ErrorCode::ValidationError,
            CoreError::Transport { .. } => ErrorCode::TransportError,
            CoreError::Timeout { .. } => ErrorCode::Timeout,
            CoreError::Server { .. } => ErrorCode::ServerError,
            CoreError::Unauthorized => ErrorCode::Unauthorized,
            CoreError::NotFound { .. } => ErrorCode::NotFound,
            CoreError::Protocol { .. } => ErrorCode::ProtocolError,
            CoreError::SessionClosed => ErrorCode::SessionClosed,
        }
    }

    /// Get the severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::UnknownColumn { .. } => ErrorSeverity::Warning,
            CoreError::InvalidPageSize { .. } => ErrorSeverity::Warning,
            CoreError::InvalidFilter { .. } => ErrorSeverity::Warning,
            CoreError::InvalidSort { .. } => ErrorSeverity::Warning,
            CoreError::Validation { .. } => ErrorSeverity::Warning,
            CoreError::NotFound { .. } => ErrorSeverity::Info,
            CoreError::SessionClosed => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// True for failures a plain retry of the same action may fix
    pub fn is_transient(&self) -> bool {
        match self {
            CoreError::Transport { .. } | CoreError::Timeout { .. } => true,
            CoreError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Convert to detailed error info
    pub fn to_details(&self) -> ErrorDetails {
        let mut details = ErrorDetails::new(self.code(), self.to_string());

        match self {
            CoreError::UnknownColumn { .. } => {
                details = details.with_suggestion(
                    "Use one of: title, category, amount, date.".to_string(),
                );
            }
            CoreError::Validation { field, .. } => {
                details = details.with_suggestion(format!(
                    "Correct the '{}' field and save again.",
                    field
                ));
            }
            CoreError::Unauthorized => {
                details = details.with_suggestion(
                    "Log in again and update api.session_cookie in your config.".to_string(),
                );
            }
            CoreError::Transport { .. } | CoreError::Timeout { .. } => {
                details = details.with_suggestion(
                    "Check that the backend is running and api.base_url is correct.".to_string(),
                );
                details = details.with_suggestion("Repeat the action to retry.".to_string());
            }
            CoreError::Server { .. } => {
                details = details.with_suggestion("Repeat the action to retry.".to_string());
            }
            _ => {}
        }

        details
    }
}

/// Result type with CoreError
pub type CoreResult<T> = Result<T, CoreError>;

/// Error context for reporting
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Operation being performed
    pub operation: String,
    /// Canonical query string at the time of the failure
    pub location: Option<String>,
}

impl ErrorContext {
    /// Create a new error context
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            location: None,
        }
    }

    /// Add the current location
    pub fn with_location(mut self, location: String) -> Self {
        self.location = Some(location);
        self
    }
}

/// Error logger trait
pub trait ErrorLogger {
    /// Log an error
    fn log_error(&self, error: &CoreError, context: &ErrorContext);
    /// Log debug information
    fn log_debug(&self, message: &str, context: &ErrorContext);
}

/// Default error logger using log crate
#[derive(Default)]
pub struct DefaultErrorLogger;

impl ErrorLogger for DefaultErrorLogger {
    fn log_error(&self, error: &CoreError, context: &ErrorContext) {
        match error.severity() {
            ErrorSeverity::Error => log::error!(
                target: "expensedesk::error",
                "ERROR [{}] {} - Operation: {} - Location: {:?}",
                error.code(),
                error,
                context.operation,
                context.location
            ),
            _ => log::warn!(
                target: "expensedesk::error",
                "WARNING [{}] {} - Operation: {} - Location: {:?}",
                error.code(),
                error,
                context.operation,
                context.location
            ),
        }
    }

    fn log_debug(&self, message: &str, context: &ErrorContext) {
        log::debug!(
            target: "expensedesk::error",
            "DEBUG: {} - Operation: {} - Location: {:?}",
            message,
            context.operation,
            context.location
        );
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::UnknownColumn.to_string(), "UNKNOWN_COLUMN");
        assert_eq!(ErrorCode::TransportError.to_string(), "TRANSPORT_ERROR");
        assert_eq!(ErrorCode::Unauthorized.to_string(), "UNAUTHORIZED");
    }

    #[test]
    fn test_core_error_code_and_severity() {
        let error = CoreError::UnknownColumn { column: "payee".to_string() };
        assert_eq!(error.code(), ErrorCode::UnknownColumn);
        assert_eq!(error.severity(), ErrorSeverity::Warning);

        let error = CoreError::Transport { message: "refused".to_string() };
        assert_eq!(error.severity(), ErrorSeverity::Error);
        assert!(error.is_transient());

        let error = CoreError::Server { status: 400, message: "bad".to_string() };
        assert!(!error.is_transient());
        let error = CoreError::Server { status: 503, message: "down".to_string() };
        assert!(error.is_transient());
    }

    #[test]
    fn test_error_details() {
        let error = CoreError::Validation {
            field: "amount".to_string(),
            message: "not a number".to_string(),
        };
        let details = error.to_details();
        assert_eq!(details.code, ErrorCode::ValidationError);
        assert!(details.message.contains("amount"));
        assert_eq!(details.suggestions.len(), 1);
        assert!(details.to_string().starts_with("[VALIDATION_ERROR]"));
    }

    #[test]
    fn test_error_context() {
        let context = ErrorContext::new("fetch").with_location("page=2".to_string());
        assert_eq!(context.operation, "fetch");
        assert_eq!(context.location, Some("page=2".to_string()));
    }
}
