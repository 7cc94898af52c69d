//! Development REST backend
//!
//! Serves the expense collection from memory under the configured base path,
//! with the same envelope, paging, sort and filter grammar the console speaks.
//!
//! Routes are organized into modules:
//! - routes::expenses: paged listing and CRUD
//! - routes::auth: session check and current user
//! - routes::health: liveness check

pub mod error;
pub mod query;
pub mod routes;
pub mod store;

use anyhow::Context;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use expensedesk_config::Config;
use expensedesk_core::User;
use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

pub use error::ApiError;
pub use store::ExpenseStore;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<ExpenseStore>>,
    pub config: Config,
    /// Identity reported by `/auth/me`, the only user that can log in
    pub user: User,
    /// Tokens issued by `/auth/login` and not yet logged out
    pub sessions: Arc<RwLock<HashSet<String>>>,
    pub next_token: Arc<AtomicU64>,
}

impl AppState {
    /// State with the store seeded according to `config.server.seed_demo_data`
    pub fn new(config: Config) -> Self {
        let store = if config.server.seed_demo_data {
            ExpenseStore::with_demo_data()
        } else {
            ExpenseStore::new()
        };
        Self {
            store: Arc::new(RwLock::new(store)),
            config,
            user: demo_user(),
            sessions: Arc::new(RwLock::new(HashSet::new())),
            next_token: Arc::new(AtomicU64::new(1)),
        }
    }
}

fn demo_user() -> User {
    User {
        id: 1,
        username: "demo".to_string(),
        email: "demo@example.com".to_string(),
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    use routes::auth::{current_user, login, logout, require_session};
    use routes::expenses::{create_expense, delete_expense, get_expense, list_expenses, update_expense};
    use routes::health::ping;

    let protected = Router::new()
        .route("/expenses", get(list_expenses).post(create_expense))
        .route(
            "/expenses/:id",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
        .route("/auth/me", get(current_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let api = Router::new()
        .route("/health/ping", get(ping))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .merge(protected);

    let base_path = state.config.api.base_path.trim_end_matches('/').to_string();
    let router = if base_path.is_empty() {
        api
    } else {
        Router::new().nest(&base_path, api)
    };

    router.layer(CorsLayer::permissive()).with_state(state)
}

/// Serve `state` on an already bound listener until the process stops
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, create_router(state)).await
}

/// Start the HTTP server
///
/// Binds `server.host:server.port`, serves until Ctrl-C and then shuts down
/// gracefully.
pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let base = format!("http://{}{}", addr, config.api.base_path.trim_end_matches('/'));
    let state = AppState::new(config);
    let seeded = state.store.read().await.len();

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("Starting expensedesk development server on {}", base);
    log::info!("Available routes:");
    log::info!("  - {}/expenses ({} seeded)", base, seeded);
    log::info!("  - {}/auth/login, {}/auth/logout, {}/auth/me", base, base, base);
    log::info!("  - {}/health/ping", base);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    log::info!("Server stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
    }
}
