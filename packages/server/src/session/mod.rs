//! Per-browser wizard sessions.
//!
//! Each session owns a [`Wizard`] and the latest snapshot of its holder's
//! reads. Reads run as independent tasks and may land in any order; each one
//! re-derives eligibility on arrival. Session state is only locked for
//! in-memory updates, never across network calls.

pub mod reads;
mod watcher;

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use ens_delegate_core::{
    evaluate, format_units, Activation, Address, Eligibility, EligibilityInputs, FlowMode, Read,
    TxHash, TxLifecycle, WalletState, Wizard, WizardError, TOKEN_DECIMALS, U256,
};
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

use crate::{chain::ChainClient, wallet::WalletProvider};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("no wallet connected")]
    NotConnected,
    #[error("no signing wallet configured; connect with an address and submit a transaction hash")]
    NoSigner,
    #[error("wallet error: {0}")]
    Wallet(String),
    #[error("the signing wallet reports its own outcome")]
    SignerOwned,
    #[error(transparent)]
    Wizard(#[from] WizardError),
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub flow: FlowMode,
    pub receipt_poll_interval: Duration,
    pub receipt_timeout: Duration,
    /// Sessions untouched for this long are dropped.
    pub idle_timeout: Duration,
}

/// Snapshot of a session as returned by the API and pushed over WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    /// 1-based step number for step indicators.
    pub step: u8,
    pub wizard: Wizard,
    pub wallet: WalletState,
    pub token_balance: Read<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_balance_formatted: Option<String>,
    pub eth_balance: Read<U256>,
    pub delegate: Read<Option<Address>>,
    pub eligibility: Eligibility,
    pub can_submit: bool,
}

struct Session {
    wizard: Wizard,
    inputs: EligibilityInputs,
    eligibility: Eligibility,
    /// Bumped whenever the connected address changes.
    epoch: u64,
    /// Bumped whenever reads restart; stale read results are dropped.
    read_seq: u64,
    /// Last client request against this session.
    touched: Instant,
}

impl Session {
    fn new(flow: FlowMode) -> Self {
        let inputs = EligibilityInputs::default();
        let eligibility = evaluate(&inputs);
        Self {
            wizard: Wizard::new(flow),
            inputs,
            eligibility,
            epoch: 0,
            read_seq: 0,
            touched: Instant::now(),
        }
    }

    /// Reset wizard and reads for a new (or no) address.
    fn start_over(&mut self, address: Option<Address>) {
        self.wizard.reset();
        self.inputs = EligibilityInputs {
            wallet: address.map_or_else(WalletState::disconnected, WalletState::connected),
            ..EligibilityInputs::default()
        };
        self.epoch += 1;
        self.read_seq += 1;
        self.rederive();
    }

    /// Returns true if the wizard step changed.
    fn rederive(&mut self) -> bool {
        self.eligibility = evaluate(&self.inputs);
        self.wizard.observe(&self.eligibility)
    }

    fn view(&self, id: &str) -> SessionView {
        SessionView {
            id: id.to_string(),
            step: self.wizard.step().number(),
            wizard: self.wizard.clone(),
            wallet: self.inputs.wallet,
            token_balance: self.inputs.token_balance.clone(),
            token_balance_formatted: self
                .inputs
                .token_balance
                .loaded()
                .map(|b| format_units(b, TOKEN_DECIMALS)),
            eth_balance: self.inputs.eth_balance.clone(),
            delegate: self.inputs.delegate.clone(),
            eligibility: self.eligibility.clone(),
            can_submit: self.wizard.can_submit(),
        }
    }
}

enum AfterSubmit {
    Watch(TxHash),
    Dispatch { holder: Address, epoch: u64 },
}

/// In-memory store of all wizard sessions.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    chain: Arc<ChainClient>,
    wallet: Option<Arc<WalletProvider>>,
    event_tx: broadcast::Sender<String>,
    config: StoreConfig,
}

impl SessionStore {
    pub fn new(
        chain: Arc<ChainClient>,
        wallet: Option<Arc<WalletProvider>>,
        event_tx: broadcast::Sender<String>,
        config: StoreConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            chain,
            wallet,
            event_tx,
            config,
        })
    }

    pub async fn create(&self) -> SessionView {
        let id = new_session_id();
        let session = Session::new(self.config.flow);
        let view = session.view(&id);
        let dropped = {
            let mut sessions = self.sessions.lock().await;
            let dropped = sweep_idle(&mut sessions, Instant::now(), self.config.idle_timeout);
            sessions.insert(id.clone(), session);
            dropped
        };
        if dropped > 0 {
            tracing::info!(dropped, "idle sessions dropped");
        }
        tracing::info!(session = %id, "session created");
        view
    }

    pub async fn view(&self, id: &str) -> Result<SessionView, SessionError> {
        let mut sessions = self.sessions.lock().await;
        get_mut(&mut sessions, id).map(|s| s.view(id))
    }

    /// Connect a wallet. Without an explicit address the signing wallet is
    /// asked for its account. Connecting a different address discards all
    /// derived state and restarts reads.
    pub async fn connect(
        self: &Arc<Self>,
        id: &str,
        address: Option<Address>,
    ) -> Result<SessionView, SessionError> {
        self.view(id).await?;

        let address = match address {
            Some(a) => a,
            None => {
                let wallet = self.wallet.as_ref().ok_or(SessionError::NoSigner)?;
                wallet
                    .connect()
                    .await
                    .map_err(|e| SessionError::Wallet(format!("{:#}", e)))?
            }
        };

        let (view, read_seq) = {
            let mut sessions = self.sessions.lock().await;
            let session = get_mut(&mut sessions, id)?;
            if session.inputs.wallet.holder() == Some(address) {
                return Ok(session.view(id));
            }
            session.start_over(Some(address));
            (session.view(id), session.read_seq)
        };

        tracing::info!(session = %id, address = %address, "wallet connected");
        self.publish(&view);
        self.spawn_reads(id, read_seq, address);
        Ok(view)
    }

    pub async fn disconnect(&self, id: &str) -> Result<SessionView, SessionError> {
        let view = {
            let mut sessions = self.sessions.lock().await;
            let session = get_mut(&mut sessions, id)?;
            session.start_over(None);
            session.view(id)
        };
        tracing::info!(session = %id, "wallet disconnected");
        self.publish(&view);
        Ok(view)
    }

    /// Re-fetch all reads for the connected address.
    pub async fn refresh(self: &Arc<Self>, id: &str) -> Result<SessionView, SessionError> {
        let (view, read_seq, holder) = {
            let mut sessions = self.sessions.lock().await;
            let session = get_mut(&mut sessions, id)?;
            let holder = session
                .inputs
                .wallet
                .holder()
                .ok_or(SessionError::NotConnected)?;
            session.read_seq += 1;
            session.inputs.token_balance = Read::Loading;
            session.inputs.eth_balance = Read::Loading;
            session.inputs.delegate = Read::Loading;
            session.rederive();
            (session.view(id), session.read_seq, holder)
        };
        self.publish(&view);
        self.spawn_reads(id, read_seq, holder);
        Ok(view)
    }

    pub async fn activate(self: &Arc<Self>, id: &str) -> Result<SessionView, SessionError> {
        let (view, activation, dispatch) = {
            let mut sessions = self.sessions.lock().await;
            let session = get_mut(&mut sessions, id)?;
            let activation = session.wizard.activate(&session.eligibility)?;
            // Without a signer the lifecycle stays Pending until the client
            // reports the hash of the transaction it broadcast.
            let dispatch = match (activation, self.wallet.is_some()) {
                (Activation::Submit, true) => session
                    .inputs
                    .wallet
                    .holder()
                    .map(|holder| (holder, session.epoch)),
                _ => None,
            };
            (session.view(id), activation, dispatch)
        };

        match activation {
            Activation::AlreadyDelegated => {
                tracing::info!(session = %id, "holder already self-delegated")
            }
            Activation::AwaitConfirm => tracing::info!(session = %id, "activation confirmed"),
            Activation::Submit => tracing::info!(session = %id, "activation submitting"),
        }
        self.publish(&view);
        if let Some((holder, epoch)) = dispatch {
            self.spawn_dispatch(id, epoch, holder);
        }
        Ok(view)
    }

    pub async fn back(&self, id: &str) -> Result<SessionView, SessionError> {
        let view = {
            let mut sessions = self.sessions.lock().await;
            let session = get_mut(&mut sessions, id)?;
            session.wizard.back()?;
            session.view(id)
        };
        self.publish(&view);
        Ok(view)
    }

    /// Submit the delegate transaction.
    ///
    /// With `tx_hash` the transaction was signed and broadcast by the client
    /// and only its receipt is watched. Without one the signing wallet is
    /// asked to send it. Either way a second submission is rejected while
    /// one is pending or confirming.
    pub async fn submit(
        self: &Arc<Self>,
        id: &str,
        tx_hash: Option<TxHash>,
    ) -> Result<SessionView, SessionError> {
        let (view, next) = {
            let mut sessions = self.sessions.lock().await;
            let session = get_mut(&mut sessions, id)?;
            let next = match tx_hash {
                Some(hash) => {
                    if self.wallet.is_none()
                        && *session.wizard.lifecycle() == TxLifecycle::Pending
                    {
                        session.wizard.submitted(hash)?;
                    } else {
                        session.wizard.register_external(hash, &session.eligibility)?;
                    }
                    AfterSubmit::Watch(hash)
                }
                None => {
                    if self.wallet.is_none() {
                        return Err(SessionError::NoSigner);
                    }
                    let holder = session
                        .inputs
                        .wallet
                        .holder()
                        .ok_or(SessionError::NotConnected)?;
                    session.wizard.begin_submit(&session.eligibility)?;
                    AfterSubmit::Dispatch {
                        holder,
                        epoch: session.epoch,
                    }
                }
            };
            (session.view(id), next)
        };

        self.publish(&view);
        match next {
            AfterSubmit::Watch(hash) => {
                tracing::info!(session = %id, tx = %hash, "transaction registered");
                self.broadcast_event(serde_json::json!({
                    "type": "tx:submitted",
                    "sessionId": id,
                    "txHash": hash,
                }));
                self.spawn_watcher(id, hash);
            }
            AfterSubmit::Dispatch { holder, epoch } => self.spawn_dispatch(id, epoch, holder),
        }
        Ok(view)
    }

    /// The client's wallet declined to sign a submission this server is
    /// waiting on. Only valid without a signing wallet, before any hash.
    pub async fn reject(&self, id: &str, message: String) -> Result<SessionView, SessionError> {
        if self.wallet.is_some() {
            return Err(SessionError::SignerOwned);
        }
        let view = {
            let mut sessions = self.sessions.lock().await;
            let session = get_mut(&mut sessions, id)?;
            session.wizard.rejected(message.clone())?;
            session.view(id)
        };

        tracing::warn!(session = %id, error = %message, "wallet rejected delegate transaction");
        self.publish(&view);
        self.broadcast_event(serde_json::json!({
            "type": "tx:failed",
            "sessionId": id,
            "error": message,
        }));
        Ok(view)
    }

    fn spawn_reads(self: &Arc<Self>, id: &str, read_seq: u64, holder: Address) {
        let store = Arc::clone(self);
        let session_id = id.to_string();
        tokio::spawn(async move {
            let read = reads::token_balance(&store.chain, &holder).await;
            store
                .apply_read(&session_id, read_seq, |inputs| inputs.token_balance = read)
                .await;
        });

        let store = Arc::clone(self);
        let session_id = id.to_string();
        tokio::spawn(async move {
            let read = reads::eth_balance(&store.chain, &holder).await;
            store
                .apply_read(&session_id, read_seq, |inputs| inputs.eth_balance = read)
                .await;
        });

        let store = Arc::clone(self);
        let session_id = id.to_string();
        tokio::spawn(async move {
            let read = reads::delegate(&store.chain, &holder).await;
            store
                .apply_read(&session_id, read_seq, |inputs| inputs.delegate = read)
                .await;
        });
    }

    async fn apply_read<F>(&self, id: &str, read_seq: u64, update: F)
    where
        F: FnOnce(&mut EligibilityInputs),
    {
        let (view, advanced) = {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(id) else {
                return;
            };
            if session.read_seq != read_seq {
                tracing::debug!(session = %id, "dropping stale read");
                return;
            }
            update(&mut session.inputs);
            let advanced = session.rederive();
            (session.view(id), advanced)
        };
        if advanced {
            tracing::info!(session = %id, "holder already self-delegated, skipping to done");
        }
        self.publish(&view);
    }

    fn spawn_dispatch(self: &Arc<Self>, id: &str, epoch: u64, holder: Address) {
        let Some(wallet) = self.wallet.clone() else {
            return;
        };
        let store = Arc::clone(self);
        let session_id = id.to_string();
        tokio::spawn(async move {
            let token = store.chain.token();
            let result = wallet.send_delegate(&holder, &token, &holder).await;
            store.on_dispatched(&session_id, epoch, result).await;
        });
    }

    async fn on_dispatched(
        self: &Arc<Self>,
        id: &str,
        epoch: u64,
        result: anyhow::Result<TxHash>,
    ) {
        let (view, outcome) = {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(id) else {
                return;
            };
            if session.epoch != epoch {
                tracing::warn!(session = %id, "address changed while signing, dropping result");
                return;
            }
            let outcome = match result {
                Ok(hash) => session.wizard.submitted(hash).map(|_| Ok(hash)),
                Err(e) => {
                    let message = format!("{:#}", e);
                    session.wizard.failed(message.clone()).map(|_| Err(message))
                }
            };
            (session.view(id), outcome)
        };

        match outcome {
            Ok(Ok(hash)) => {
                tracing::info!(session = %id, tx = %hash, "delegate transaction broadcast");
                self.publish(&view);
                self.broadcast_event(serde_json::json!({
                    "type": "tx:submitted",
                    "sessionId": id,
                    "txHash": hash,
                }));
                self.spawn_watcher(id, hash);
            }
            Ok(Err(message)) => {
                tracing::warn!(session = %id, error = %message, "wallet rejected delegate transaction");
                self.publish(&view);
                self.broadcast_event(serde_json::json!({
                    "type": "tx:failed",
                    "sessionId": id,
                    "error": message,
                }));
            }
            Err(e) => tracing::warn!(session = %id, error = %e, "ignoring wallet result"),
        }
    }

    fn spawn_watcher(self: &Arc<Self>, id: &str, tx_hash: TxHash) {
        let store = Arc::clone(self);
        let session_id = id.to_string();
        tokio::spawn(watcher::watch_receipt(store, session_id, tx_hash));
    }

    /// Record the final outcome of `tx_hash`. Ignored unless that hash is
    /// still the one being confirmed.
    async fn finish_tx(&self, id: &str, tx_hash: TxHash, outcome: Result<(), String>) {
        let view = {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(id) else {
                return;
            };
            match session.wizard.lifecycle() {
                TxLifecycle::Confirming { tx_hash: pending } if *pending == tx_hash => {}
                _ => {
                    tracing::debug!(session = %id, tx = %tx_hash, "receipt no longer relevant");
                    return;
                }
            }
            let applied = match &outcome {
                Ok(()) => session.wizard.receipt_success(tx_hash),
                Err(message) => session.wizard.failed(message.clone()),
            };
            if let Err(e) = applied {
                tracing::warn!(session = %id, error = %e, "failed to apply receipt");
                return;
            }
            session.view(id)
        };

        self.publish(&view);
        match outcome {
            Ok(()) => {
                tracing::info!(session = %id, tx = %tx_hash, "delegation confirmed");
                self.broadcast_event(serde_json::json!({
                    "type": "tx:confirmed",
                    "sessionId": id,
                    "txHash": tx_hash,
                }));
            }
            Err(message) => {
                tracing::warn!(session = %id, tx = %tx_hash, error = %message, "delegation failed");
                self.broadcast_event(serde_json::json!({
                    "type": "tx:failed",
                    "sessionId": id,
                    "txHash": tx_hash,
                    "error": message,
                }));
            }
        }
    }

    fn publish(&self, view: &SessionView) {
        self.broadcast_event(serde_json::json!({
            "type": "session:updated",
            "session": view,
        }));
    }

    fn broadcast_event(&self, event: serde_json::Value) {
        let _ = self.event_tx.send(event.to_string());
    }
}

/// Look up a session on behalf of a client request, marking it as touched.
fn get_mut<'a>(
    sessions: &'a mut HashMap<String, Session>,
    id: &str,
) -> Result<&'a mut Session, SessionError> {
    let session = sessions
        .get_mut(id)
        .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
    session.touched = Instant::now();
    Ok(session)
}

/// Drop sessions idle for at least `idle`. Sessions with a transaction in
/// flight are kept so their outcome is not lost.
fn sweep_idle(sessions: &mut HashMap<String, Session>, now: Instant, idle: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, s| {
        s.wizard.lifecycle().in_flight() || now.saturating_duration_since(s.touched) < idle
    });
    before - sessions.len()
}

fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
