use std::{path::PathBuf, time::Duration};

use ens_delegate_core::{Address, FlowMode, ProposalFilter};

/// Default upstream governance proposal index.
pub const DEFAULT_PROPOSALS_URL: &str = "https://ponder-ens-governor.up.railway.app/proposals";

/// Default ETH/USD price endpoint.
pub const DEFAULT_PRICE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd";

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Ethereum JSON-RPC URL for reads and receipts.
    pub rpc_url: String,
    /// JSON-RPC endpoint of a signing wallet (optional).
    pub wallet_rpc_url: Option<String>,
    /// Governance token contract.
    pub token_address: Address,
    pub proposals_url: String,
    /// Canonical proposal filter for this deployment.
    pub proposal_filter: ProposalFilter,
    /// Count reported when the proposal index is unreachable and nothing is cached.
    pub proposal_fallback_count: u64,
    pub proposal_cache_ttl: Duration,
    /// ETH/USD price endpoint; `None` disables USD estimates.
    pub price_url: Option<String>,
    pub flow: FlowMode,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
    /// Sessions with no client request for this long are dropped.
    pub session_idle_timeout: Duration,
    /// Directory containing built UI static files.
    pub ui_dir: PathBuf,
}

impl ServerConfig {
    /// Configuration with production defaults for everything but the RPC URL.
    pub fn new(rpc_url: impl Into<String>, token_address: Address) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            wallet_rpc_url: None,
            token_address,
            proposals_url: DEFAULT_PROPOSALS_URL.to_string(),
            proposal_filter: ProposalFilter::Active,
            proposal_fallback_count: 0,
            proposal_cache_ttl: Duration::from_secs(300),
            price_url: Some(DEFAULT_PRICE_URL.to_string()),
            flow: FlowMode::ThreeStep,
            receipt_poll_interval: Duration::from_secs(4),
            receipt_timeout: Duration::from_secs(600),
            session_idle_timeout: Duration::from_secs(3600),
            ui_dir: PathBuf::from("/app/ui"),
        }
    }
}
