use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{
    chain::ChainClient, config::ServerConfig, price::PriceClient, proposals::ProposalService,
    session::SessionStore, wallet::WalletProvider,
};

/// Shared application state.
pub struct AppState {
    pub config: ServerConfig,
    /// Token contract reads and receipts.
    pub chain: Arc<ChainClient>,
    /// Signing wallet (optional).
    pub wallet: Option<Arc<WalletProvider>>,
    pub proposals: ProposalService,
    pub prices: PriceClient,
    pub sessions: Arc<SessionStore>,
    /// Broadcast channel for WebSocket events.
    pub event_tx: broadcast::Sender<String>,
}
