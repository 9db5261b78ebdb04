mod accounts;
mod config_routes;
mod health;
mod proposals;
mod sessions;
pub mod ws;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` sub-router with all API routes.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(config_routes::router())
        .merge(proposals::router())
        .merge(accounts::router())
        .merge(sessions::router())
        .with_state(state)
}
