//! Auth routes - login, logout and identity of the session cookie holder

pub mod api;

pub use api::{current_user, login, logout, require_session, SESSION_COOKIE};
