//! On-chain queries for the governance token.
//!
//! Reads `balanceOf(holder)` and `delegates(holder)`, the holder's ETH
//! balance, gas price and gas estimate for `delegate(holder)`, and polls
//! transaction receipts.

use anyhow::{Context, Result};
use ens_delegate_core::{abi, Address, TxHash, U256};
use serde_json::{json, Value};

use super::rpc::{parse_hex_u64, RpcClient};

/// Outcome recorded in a mined transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Client for on-chain queries to the token contract.
pub struct ChainClient {
    rpc: RpcClient,
    token: Address,
}

impl ChainClient {
    pub fn new(rpc_url: String, token: Address) -> Self {
        Self {
            rpc: RpcClient::new(rpc_url),
            token,
        }
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let hex = self.rpc.call_str("eth_chainId", json!([])).await?;
        parse_hex_u64(&hex).context("eth_chainId: invalid hex")
    }

    /// Raw token balance (18 decimals).
    pub async fn balance_of(&self, holder: &Address) -> Result<U256> {
        let data = abi::balance_of_calldata(holder);
        let result = self.eth_call(&data).await.context("balanceOf call failed")?;
        abi::decode_uint(&result).context("balanceOf: malformed return data")
    }

    /// Current delegate of `holder`. Empty return data is treated as "no
    /// delegate"; the zero address is passed through as-is.
    pub async fn delegate_of(&self, holder: &Address) -> Result<Option<Address>> {
        let data = abi::delegates_calldata(holder);
        let result = self.eth_call(&data).await.context("delegates call failed")?;
        if result.trim_start_matches("0x").is_empty() {
            return Ok(None);
        }
        abi::decode_address(&result)
            .map(Some)
            .context("delegates: malformed return data")
    }

    /// ETH balance in wei.
    pub async fn eth_balance(&self, address: &Address) -> Result<U256> {
        let hex = self
            .rpc
            .call_str("eth_getBalance", json!([address.to_hex(), "latest"]))
            .await?;
        U256::from_hex_quantity(&hex).context("eth_getBalance: invalid quantity")
    }

    pub async fn gas_price(&self) -> Result<U256> {
        let hex = self.rpc.call_str("eth_gasPrice", json!([])).await?;
        U256::from_hex_quantity(&hex).context("eth_gasPrice: invalid quantity")
    }

    /// Gas units for `delegate(holder)` sent from `holder`.
    pub async fn estimate_delegate_gas(&self, holder: &Address) -> Result<U256> {
        let call = json!({
            "from": holder.to_hex(),
            "to": self.token.to_hex(),
            "data": abi::delegate_calldata(holder),
        });
        let hex = self.rpc.call_str("eth_estimateGas", json!([call])).await?;
        U256::from_hex_quantity(&hex).context("eth_estimateGas: invalid quantity")
    }

    /// Receipt status, or `None` while the transaction is not yet mined.
    pub async fn receipt_status(&self, tx_hash: &TxHash) -> Result<Option<ReceiptStatus>> {
        let result = self
            .rpc
            .call("eth_getTransactionReceipt", json!([tx_hash.to_hex()]))
            .await?;
        parse_receipt_status(&result)
    }

    async fn eth_call(&self, data: &str) -> Result<String> {
        self.rpc
            .call_str(
                "eth_call",
                json!([{"to": self.token.to_hex(), "data": data}, "latest"]),
            )
            .await
    }
}

fn parse_receipt_status(receipt: &Value) -> Result<Option<ReceiptStatus>> {
    if receipt.is_null() {
        return Ok(None);
    }
    let status = receipt
        .get("status")
        .and_then(|v| v.as_str())
        .context("receipt has no status")?;
    match parse_hex_u64(status)? {
        1 => Ok(Some(ReceiptStatus::Success)),
        _ => Ok(Some(ReceiptStatus::Reverted)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_status_values() {
        assert_eq!(parse_receipt_status(&Value::Null).unwrap(), None);
        assert_eq!(
            parse_receipt_status(&json!({"status": "0x1"})).unwrap(),
            Some(ReceiptStatus::Success)
        );
        assert_eq!(
            parse_receipt_status(&json!({"status": "0x0"})).unwrap(),
            Some(ReceiptStatus::Reverted)
        );
        assert!(parse_receipt_status(&json!({"blockNumber": "0x10"})).is_err());
    }
}
