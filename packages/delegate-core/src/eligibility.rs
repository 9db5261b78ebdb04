//! Eligibility derivation: whether a connected holder can activate voting
//! power by self-delegating.
//!
//! [`evaluate`] is a pure function of the latest snapshot of reads. A read
//! that is still loading or has failed never counts as "loaded zero", and it
//! keeps `can_activate` false until every dependent read has resolved.

use serde::Serialize;

use crate::{address::Address, units::U256, GAS_THRESHOLD_WEI};

/// Async status of one on-chain read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Read<T> {
    Loading,
    Loaded(T),
    Failed(String),
}

impl<T> Read<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Read::Loaded(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Read::Loading)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Read::Failed(_))
    }
}

impl<T> Default for Read<T> {
    fn default() -> Self {
        Read::Loading
    }
}

/// Connection status as reported by the wallet provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    pub is_connected: bool,
}

impl WalletState {
    pub fn connected(address: Address) -> Self {
        Self {
            address: Some(address),
            is_connected: true,
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Address of a connected holder, `None` otherwise.
    pub fn holder(&self) -> Option<Address> {
        if self.is_connected {
            self.address
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibilityInputs {
    pub wallet: WalletState,
    pub token_balance: Read<U256>,
    pub eth_balance: Read<U256>,
    /// `delegates(holder)`; `None` when the contract returned nothing.
    pub delegate: Read<Option<Address>>,
}

/// Why activation is not currently possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Blocker {
    NotConnected,
    Loading,
    ReadFailed,
    NoTokens,
    InsufficientGas,
}

impl Blocker {
    pub const fn message(&self) -> &'static str {
        match self {
            Self::NotConnected => "Connect your wallet to continue.",
            Self::Loading => "Loading wallet details...",
            Self::ReadFailed => "Unable to load wallet details. Please try again.",
            Self::NoTokens => "You need ENS tokens to delegate. Get ENS tokens first.",
            Self::InsufficientGas => "You need at least 0.001 ETH for gas fees.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub has_tokens: bool,
    pub has_sufficient_gas: bool,
    pub is_self_delegated: bool,
    /// Delegated to any non-zero address, self or otherwise.
    pub is_delegated: bool,
    /// The delegate read has resolved for the current holder.
    pub delegation_known: bool,
    pub can_activate: bool,
    pub blockers: Vec<Blocker>,
}

pub fn evaluate(inputs: &EligibilityInputs) -> Eligibility {
    let holder = inputs.wallet.holder();

    let has_tokens = inputs
        .token_balance
        .loaded()
        .is_some_and(|balance| !balance.is_zero());

    let threshold = U256::from(GAS_THRESHOLD_WEI);
    let has_sufficient_gas = inputs
        .eth_balance
        .loaded()
        .is_some_and(|balance| *balance > threshold);

    let delegate = inputs.delegate.loaded().copied().flatten();
    let delegation_known = holder.is_some() && inputs.delegate.loaded().is_some();
    let is_delegated = delegate.is_some_and(|d| !d.is_zero());
    let is_self_delegated = match (delegate, holder) {
        (Some(d), Some(h)) => !d.is_zero() && d == h,
        _ => false,
    };

    let any_loading = inputs.token_balance.is_loading()
        || inputs.eth_balance.is_loading()
        || inputs.delegate.is_loading();
    let any_failed = inputs.token_balance.is_failed()
        || inputs.eth_balance.is_failed()
        || inputs.delegate.is_failed();

    let mut blockers = Vec::new();
    if holder.is_none() {
        blockers.push(Blocker::NotConnected);
    } else {
        if any_loading {
            blockers.push(Blocker::Loading);
        }
        if any_failed {
            blockers.push(Blocker::ReadFailed);
        }
        if inputs.token_balance.loaded().is_some() && !has_tokens {
            blockers.push(Blocker::NoTokens);
        }
        if has_tokens && inputs.eth_balance.loaded().is_some() && !has_sufficient_gas {
            blockers.push(Blocker::InsufficientGas);
        }
    }

    let can_activate = holder.is_some()
        && has_tokens
        && has_sufficient_gas
        && delegation_known
        && !any_loading
        && !any_failed;

    Eligibility {
        has_tokens,
        has_sufficient_gas,
        is_self_delegated,
        is_delegated,
        delegation_known,
        can_activate,
        blockers,
    }
}
