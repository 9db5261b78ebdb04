use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ens_delegate_core::{Address, FlowMode, ProposalFilter, ENS_TOKEN_ADDRESS};
use ens_delegate_server::{
    build_router, build_state,
    config::{ServerConfig, DEFAULT_PRICE_URL, DEFAULT_PROPOSALS_URL},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FlowArg {
    /// Connect, Confirm, Done.
    ThreeStep,
    /// Submit straight from Connect.
    Collapsed,
}

impl From<FlowArg> for FlowMode {
    fn from(arg: FlowArg) -> Self {
        match arg {
            FlowArg::ThreeStep => FlowMode::ThreeStep,
            FlowArg::Collapsed => FlowMode::Collapsed,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "ens-delegate-server")]
#[command(about = "Backend for the ENS self-delegation wizard")]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Ethereum JSON-RPC URL for token reads and receipts.
    #[arg(long, env = "RPC_URL")]
    rpc_url: String,

    /// JSON-RPC URL of a signing wallet. Without it, clients sign and
    /// report transaction hashes themselves.
    #[arg(long, env = "WALLET_RPC_URL")]
    wallet_rpc_url: Option<String>,

    /// Governance token contract address.
    #[arg(long, env = "TOKEN_ADDRESS", default_value = ENS_TOKEN_ADDRESS)]
    token_address: Address,

    /// Governance proposal index URL.
    #[arg(long, env = "PROPOSALS_URL", default_value = DEFAULT_PROPOSALS_URL)]
    proposals_url: String,

    /// Which proposals to count: `active` or `queued`.
    #[arg(long, env = "PROPOSAL_FILTER", default_value = "active")]
    proposal_filter: ProposalFilter,

    /// Count reported when the proposal index is unavailable.
    #[arg(long, default_value = "0")]
    proposal_fallback_count: u64,

    /// Seconds to cache the proposal count.
    #[arg(long, default_value = "300")]
    proposal_cache_secs: u64,

    /// ETH/USD price endpoint for gas estimates.
    #[arg(long, env = "PRICE_URL", default_value = DEFAULT_PRICE_URL)]
    price_url: String,

    /// Skip ETH/USD pricing entirely.
    #[arg(long)]
    no_price: bool,

    /// Wizard flow.
    #[arg(long, env = "WIZARD_FLOW", value_enum, default_value = "three-step")]
    flow: FlowArg,

    /// Milliseconds between receipt polls.
    #[arg(long, default_value = "4000")]
    receipt_poll_ms: u64,

    /// Seconds to wait for a receipt before reporting a timeout.
    #[arg(long, default_value = "600")]
    receipt_timeout_secs: u64,

    /// Seconds without a request after which a session is dropped.
    #[arg(long, default_value = "3600")]
    session_idle_secs: u64,

    /// Directory containing the built UI static files.
    #[arg(long, default_value = "/app/ui")]
    ui_dir: PathBuf,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            rpc_url: self.rpc_url,
            wallet_rpc_url: self.wallet_rpc_url,
            token_address: self.token_address,
            proposals_url: self.proposals_url,
            proposal_filter: self.proposal_filter,
            proposal_fallback_count: self.proposal_fallback_count,
            proposal_cache_ttl: Duration::from_secs(self.proposal_cache_secs),
            price_url: (!self.no_price).then_some(self.price_url),
            flow: self.flow.into(),
            receipt_poll_interval: Duration::from_millis(self.receipt_poll_ms),
            receipt_timeout: Duration::from_secs(self.receipt_timeout_secs),
            session_idle_timeout: Duration::from_secs(self.session_idle_secs),
            ui_dir: self.ui_dir,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ens_delegate_server=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let port = cli.port;
    let config = cli.into_config();

    tracing::info!(token = %config.token_address, "starting ens-delegate-server");
    tracing::info!(rpc_url = %config.rpc_url, "RPC endpoint configured");
    if let Some(ref wallet) = config.wallet_rpc_url {
        tracing::info!(wallet_rpc_url = %wallet, "signing wallet configured");
    }
    tracing::info!(filter = %config.proposal_filter, url = %config.proposals_url, "proposal index");

    let state = build_state(config);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "server listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("server error")?;

    Ok(())
}
