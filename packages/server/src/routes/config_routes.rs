use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use ens_delegate_core::{Address, FlowMode, ProposalFilter, GAS_THRESHOLD_WEI, TOKEN_DECIMALS};
use serde::Serialize;

use crate::state::AppState;

/// `GET /api/config`: returns server configuration and chain info.
async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let mut config = ConfigResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        token_address: state.chain.token(),
        token_decimals: TOKEN_DECIMALS,
        gas_threshold_wei: GAS_THRESHOLD_WEI.to_string(),
        chain_id: None,
        proposal_filter: state.proposals.filter(),
        flow: state.config.flow,
        signer: state.wallet.is_some(),
    };

    match state.chain.chain_id().await {
        Ok(id) => config.chain_id = Some(id),
        Err(e) => tracing::warn!(error = %e, "failed to read chain ID"),
    }

    Json(config)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigResponse {
    version: String,
    token_address: Address,
    token_decimals: u32,
    gas_threshold_wei: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    chain_id: Option<u64>,
    proposal_filter: ProposalFilter,
    flow: FlowMode,
    /// Whether the server can sign the delegate transaction itself.
    signer: bool,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/config", get(get_config))
}
