//! Receipt polling for a broadcast delegate transaction.

use std::sync::Arc;

use ens_delegate_core::TxHash;
use tokio::time::Instant;

use super::SessionStore;
use crate::chain::ReceiptStatus;

pub(super) async fn watch_receipt(store: Arc<SessionStore>, id: String, tx_hash: TxHash) {
    let deadline = Instant::now() + store.config.receipt_timeout;
    tracing::debug!(session = %id, tx = %tx_hash, "watching receipt");

    loop {
        match store.chain.receipt_status(&tx_hash).await {
            Ok(Some(ReceiptStatus::Success)) => {
                store.finish_tx(&id, tx_hash, Ok(())).await;
                return;
            }
            Ok(Some(ReceiptStatus::Reverted)) => {
                store
                    .finish_tx(&id, tx_hash, Err("transaction reverted".to_string()))
                    .await;
                return;
            }
            Ok(None) => {}
            // Transient RPC errors are retried until the deadline.
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::warn!(session = %id, tx = %tx_hash, error = %message, "receipt query failed");
            }
        }

        if Instant::now() >= deadline {
            store
                .finish_tx(
                    &id,
                    tx_hash,
                    Err("transaction confirmation timed out".to_string()),
                )
                .await;
            return;
        }
        tokio::time::sleep(store.config.receipt_poll_interval).await;
    }
}
