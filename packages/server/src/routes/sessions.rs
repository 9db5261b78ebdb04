use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ens_delegate_core::{Address, TxHash, WizardError};
use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    session::{SessionError, SessionView},
    state::AppState,
};

type ApiResult = Result<Json<SessionView>, (StatusCode, String)>;

fn to_response(result: Result<SessionView, SessionError>) -> ApiResult {
    result.map(Json).map_err(|e| {
        let status = match &e {
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::NotConnected | SessionError::NoSigner => StatusCode::BAD_REQUEST,
            SessionError::Wallet(_) => StatusCode::BAD_GATEWAY,
            SessionError::SignerOwned => StatusCode::CONFLICT,
            SessionError::Wizard(WizardError::UnknownTransaction(_)) => StatusCode::BAD_REQUEST,
            SessionError::Wizard(_) => StatusCode::CONFLICT,
        };
        (status, e.to_string())
    })
}

/// Bodies are optional; an empty body means "all defaults".
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, (StatusCode, String)> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid request body: {}", e)))
}

#[derive(Debug, Default, Deserialize)]
struct ConnectRequest {
    #[serde(default)]
    address: Option<Address>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    #[serde(default)]
    tx_hash: Option<TxHash>,
}

/// `POST /api/sessions`: start a new wizard session.
async fn create_session(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    Json(state.sessions.create().await)
}

/// `GET /api/sessions/:id`: current session state.
async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    to_response(state.sessions.view(&id).await)
}

/// `POST /api/sessions/:id/connect`: connect a wallet address, or ask the
/// signing wallet for one when the body omits it.
async fn connect(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let req: ConnectRequest = parse_body(&body)?;
    to_response(state.sessions.connect(&id, req.address).await)
}

/// `POST /api/sessions/:id/disconnect`
async fn disconnect(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    to_response(state.sessions.disconnect(&id).await)
}

/// `POST /api/sessions/:id/refresh`: re-run all reads.
async fn refresh(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    to_response(state.sessions.refresh(&id).await)
}

/// `POST /api/sessions/:id/activate`: leave the Connect step.
async fn activate(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    to_response(state.sessions.activate(&id).await)
}

/// `POST /api/sessions/:id/back`: return from Confirm to Connect.
async fn back(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult {
    to_response(state.sessions.back(&id).await)
}

/// `POST /api/sessions/:id/submit`: send the delegate transaction, or
/// register one the client already broadcast.
async fn submit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let req: SubmitRequest = parse_body(&body)?;
    to_response(state.sessions.submit(&id, req.tx_hash).await)
}

#[derive(Debug, Default, Deserialize)]
struct RejectRequest {
    #[serde(default)]
    message: Option<String>,
}

/// `POST /api/sessions/:id/reject`: the browser wallet declined to sign.
async fn reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let req: RejectRequest = parse_body(&body)?;
    let message = req
        .message
        .unwrap_or_else(|| "transaction rejected in wallet".to_string());
    to_response(state.sessions.reject(&id, message).await)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/connect", post(connect))
        .route("/sessions/{id}/disconnect", post(disconnect))
        .route("/sessions/{id}/refresh", post(refresh))
        .route("/sessions/{id}/activate", post(activate))
        .route("/sessions/{id}/back", post(back))
        .route("/sessions/{id}/submit", post(submit))
        .route("/sessions/{id}/reject", post(reject))
}
