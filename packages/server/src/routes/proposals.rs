use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};

use crate::{proposals::ProposalCount, state::AppState};

/// `GET /api/proposals`: proposal count for the configured filter. Always
/// succeeds; upstream outages are reported through `source`.
async fn proposal_count(State(state): State<Arc<AppState>>) -> Json<ProposalCount> {
    Json(state.proposals.count().await)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/proposals", get(proposal_count))
}
