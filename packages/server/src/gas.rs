//! Cost estimate for the delegate transaction.

use anyhow::Result;
use ens_delegate_core::{format_units, units::ETH_DECIMALS, Address, U256};
use serde::Serialize;

use crate::{chain::ChainClient, price::PriceClient};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub gas_units: U256,
    pub gas_price_wei: U256,
    pub cost_wei: U256,
    /// Cost in ETH as a decimal string.
    pub cost_eth: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl GasEstimate {
    pub fn new(gas_units: U256, gas_price_wei: U256, eth_usd: Option<f64>) -> Self {
        let cost_wei = gas_units.saturating_mul(&gas_price_wei);
        let cost_eth = format_units(&cost_wei, ETH_DECIMALS);
        let cost_usd = eth_usd.map(|price| cost_wei.to_f64_units(ETH_DECIMALS) * price);
        Self {
            gas_units,
            gas_price_wei,
            cost_wei,
            cost_eth,
            cost_usd,
        }
    }
}

/// Estimate `delegate(holder)` sent by `holder`. The USD price is optional
/// decoration; only the chain reads can fail the estimate.
pub async fn estimate_delegate(
    chain: &ChainClient,
    prices: &PriceClient,
    holder: &Address,
) -> Result<GasEstimate> {
    let (gas, price, usd) = tokio::join!(
        chain.estimate_delegate_gas(holder),
        chain.gas_price(),
        prices.eth_usd(),
    );
    Ok(GasEstimate::new(gas?, price?, usd))
}
