use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use ens_delegate_core::{format_units, Address, Eligibility, Read, TOKEN_DECIMALS, U256};
use serde::Serialize;

use crate::{
    gas::{self, GasEstimate},
    session::reads,
    state::AppState,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountStatusResponse {
    address: Address,
    token_balance: Read<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_balance_formatted: Option<String>,
    eth_balance: Read<U256>,
    delegate: Read<Option<Address>>,
    eligibility: Eligibility,
}

fn parse_address(raw: &str) -> Result<Address, (StatusCode, String)> {
    raw.parse()
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid address {}: {}", raw, e)))
}

/// `GET /api/accounts/:address/status`: one-shot eligibility for an address.
async fn account_status(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<AccountStatusResponse>, (StatusCode, String)> {
    let address = parse_address(&address)?;
    let (inputs, eligibility) = reads::account_status(&state.chain, address).await;

    Ok(Json(AccountStatusResponse {
        address,
        token_balance_formatted: inputs
            .token_balance
            .loaded()
            .map(|b| format_units(b, TOKEN_DECIMALS)),
        token_balance: inputs.token_balance,
        eth_balance: inputs.eth_balance,
        delegate: inputs.delegate,
        eligibility,
    }))
}

/// `GET /api/accounts/:address/gas`: cost estimate for `delegate(address)`.
async fn gas_estimate(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<GasEstimate>, (StatusCode, String)> {
    let address = parse_address(&address)?;
    gas::estimate_delegate(&state.chain, &state.prices, &address)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(error = %format!("{:#}", e), address = %address, "gas estimate failed");
            (StatusCode::BAD_GATEWAY, format!("gas estimate unavailable: {:#}", e))
        })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts/{address}/status", get(account_status))
        .route("/accounts/{address}/gas", get(gas_estimate))
}
