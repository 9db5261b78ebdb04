//! Signing wallet reachable over JSON-RPC.
//!
//! Used when the server itself submits the delegate transaction. Browser
//! wallets sign on the client and report the transaction hash instead.

use anyhow::{bail, Context, Result};
use ens_delegate_core::{abi, Address, TxHash};
use serde_json::json;

use crate::chain::RpcClient;

pub struct WalletProvider {
    rpc: RpcClient,
}

impl WalletProvider {
    pub fn new(url: String) -> Self {
        Self {
            rpc: RpcClient::new(url),
        }
    }

    /// First account exposed by the wallet. Tries `eth_requestAccounts` and
    /// falls back to `eth_accounts` for nodes that do not implement it.
    pub async fn connect(&self) -> Result<Address> {
        let accounts = match self.rpc.call("eth_requestAccounts", json!([])).await {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "eth_requestAccounts failed, trying eth_accounts");
                self.rpc.call("eth_accounts", json!([])).await?
            }
        };

        let first = accounts
            .as_array()
            .and_then(|a| a.first())
            .and_then(|v| v.as_str())
            .context("wallet exposed no accounts")?;
        first
            .parse()
            .with_context(|| format!("wallet returned invalid account {}", first))
    }

    /// Ask the wallet to sign and broadcast `delegate(delegatee)` from `from`.
    pub async fn send_delegate(
        &self,
        from: &Address,
        token: &Address,
        delegatee: &Address,
    ) -> Result<TxHash> {
        let tx = json!({
            "from": from.to_hex(),
            "to": token.to_hex(),
            "data": abi::delegate_calldata(delegatee),
        });
        let hash = self.rpc.call_str("eth_sendTransaction", json!([tx])).await?;
        match hash.parse() {
            Ok(h) => Ok(h),
            Err(e) => bail!("wallet returned invalid transaction hash {}: {}", hash, e),
        }
    }
}
