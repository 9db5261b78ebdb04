//! Backend for the ENS self-delegation wizard.
//!
//! Serves the wizard HTTP API, proxies governance proposal counts and pushes
//! session updates over WebSocket. Wizard semantics live in
//! `ens_delegate_core`.

pub mod chain;
pub mod config;
pub mod gas;
pub mod price;
pub mod proposals;
pub mod routes;
pub mod session;
pub mod state;
pub mod wallet;

use std::sync::Arc;

use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use chain::ChainClient;
use config::ServerConfig;
use price::PriceClient;
use proposals::ProposalService;
use session::{SessionStore, StoreConfig};
use state::AppState;
use wallet::WalletProvider;

/// Wire up clients and the session store from configuration.
pub fn build_state(config: ServerConfig) -> Arc<AppState> {
    // Broadcast channel for WebSocket events (session updates, transactions)
    let (event_tx, _) = broadcast::channel::<String>(256);

    let chain = Arc::new(ChainClient::new(config.rpc_url.clone(), config.token_address));
    let wallet = config
        .wallet_rpc_url
        .as_ref()
        .map(|url| Arc::new(WalletProvider::new(url.clone())));

    let sessions = SessionStore::new(
        chain.clone(),
        wallet.clone(),
        event_tx.clone(),
        StoreConfig {
            flow: config.flow,
            receipt_poll_interval: config.receipt_poll_interval,
            receipt_timeout: config.receipt_timeout,
            idle_timeout: config.session_idle_timeout,
        },
    );

    let proposals = ProposalService::new(
        config.proposals_url.clone(),
        config.proposal_filter,
        config.proposal_fallback_count,
        config.proposal_cache_ttl,
    );
    let prices = PriceClient::new(config.price_url.clone());

    Arc::new(AppState {
        config,
        chain,
        wallet,
        proposals,
        prices,
        sessions,
        event_tx,
    })
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = routes::api_router(state.clone());

    let mut app = Router::new()
        .nest("/api", api)
        .merge(routes::ws::router().with_state(state.clone()));

    // Serve static UI files if directory exists
    if state.config.ui_dir.is_dir() {
        let serve_dir = tower_http::services::ServeDir::new(&state.config.ui_dir).fallback(
            tower_http::services::ServeFile::new(state.config.ui_dir.join("index.html")),
        );
        app = app.fallback_service(serve_dir);
    }

    // CORS for local development
    let cors = CorsLayer::very_permissive();

    app.layer(cors)
}
