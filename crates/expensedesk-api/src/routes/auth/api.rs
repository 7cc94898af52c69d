//! Login, logout, session check and current-user endpoint
//!
//! Endpoints:
//! - login: `POST /auth/login` (form-encoded), sets the `jwt` cookie
//! - logout: `POST /auth/logout`, clears it
//! - current_user: `GET /auth/me`

use crate::error::ApiError;
use crate::routes::respond;
use crate::AppState;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Form;
use expensedesk_core::{AuthToken, Credentials};
use std::sync::atomic::Ordering;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "jwt";

/// Lifetime of an issued cookie, one day
const SESSION_MAX_AGE_SECS: u64 = 24 * 60 * 60;

/// Reject requests without a valid session token; open when none is configured
///
/// Valid tokens are the configured one and any issued by `login` and not
/// logged out since.
pub async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.config.server.session_token {
        let presented = cookie_value(request.headers(), SESSION_COOKIE).map(str::to_string);
        let accepted = match presented {
            Some(token) if token == *expected => true,
            Some(token) => state.sessions.read().await.contains(&token),
            None => false,
        };
        if !accepted {
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

fn session_cookie(token: &str, max_age: u64) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
        SESSION_COOKIE, token, max_age
    )
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    Form(credentials): Form<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    if credentials.username != state.user.username
        || credentials.password != state.config.server.demo_password
    {
        log::warn!("Rejected login for '{}'", credentials.username);
        return Err(ApiError::Unauthorized);
    }

    let serial = state.next_token.fetch_add(1, Ordering::Relaxed);
    let issued_at = chrono::Utc::now().timestamp_millis();
    let token = format!("{}.{}.{}", state.user.id, issued_at, serial);
    state.sessions.write().await.insert(token.clone());

    let cookie = session_cookie(&token, SESSION_MAX_AGE_SECS);
    let body = respond(
        StatusCode::OK,
        format!("User '{}' logged in successfully", credentials.username),
        Some(AuthToken { access_token: token }),
    );
    Ok(([(SET_COOKIE, cookie)], body))
}

/// `POST /auth/logout`; forgets the presented token, if any
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = cookie_value(&headers, SESSION_COOKIE) {
        state.sessions.write().await.remove(token);
    }
    let body = respond::<()>(StatusCode::OK, "User logged out successfully".to_string(), None);
    ([(SET_COOKIE, session_cookie("", 0))], body)
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// `GET /auth/me`
pub async fn current_user(State(state): State<AppState>) -> impl IntoResponse {
    let user = state.user.clone();
    respond(
        StatusCode::OK,
        format!("Fetched current user: {}", user.username),
        Some(user),
    )
}
