//! Eligibility reads. Each one converts its own failure into
//! [`Read::Failed`] so callers never see an error.

use ens_delegate_core::{evaluate, Address, Eligibility, EligibilityInputs, Read, WalletState, U256};

use crate::chain::ChainClient;

pub async fn token_balance(chain: &ChainClient, holder: &Address) -> Read<U256> {
    into_read("balanceOf", holder, chain.balance_of(holder).await)
}

pub async fn eth_balance(chain: &ChainClient, holder: &Address) -> Read<U256> {
    into_read("eth_getBalance", holder, chain.eth_balance(holder).await)
}

pub async fn delegate(chain: &ChainClient, holder: &Address) -> Read<Option<Address>> {
    into_read("delegates", holder, chain.delegate_of(holder).await)
}

/// Run all reads for `holder` concurrently.
pub async fn load_all(chain: &ChainClient, holder: Address) -> EligibilityInputs {
    let (token_balance, eth_balance, delegate) = tokio::join!(
        token_balance(chain, &holder),
        eth_balance(chain, &holder),
        delegate(chain, &holder),
    );
    EligibilityInputs {
        wallet: WalletState::connected(holder),
        token_balance,
        eth_balance,
        delegate,
    }
}

/// Stateless eligibility for one address.
pub async fn account_status(chain: &ChainClient, holder: Address) -> (EligibilityInputs, Eligibility) {
    let inputs = load_all(chain, holder).await;
    let eligibility = evaluate(&inputs);
    (inputs, eligibility)
}

fn into_read<T>(what: &'static str, holder: &Address, result: anyhow::Result<T>) -> Read<T> {
    match result {
        Ok(v) => Read::Loaded(v),
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::warn!(read = what, address = %holder, error = %message, "chain read failed");
            Read::Failed(message)
        }
    }
}
