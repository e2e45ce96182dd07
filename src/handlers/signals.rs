//! Signals endpoint handler.
//!
//! `/signals` returns the most recent lifecycle signals, oldest first.
//! `?family=<name>` restricts the list to one family and `?limit=<n>` keeps
//! only the newest `n`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use herakles_windows_collector::Family;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::state::{SharedState, SignalRecord};

#[derive(Debug, Default, Deserialize)]
pub struct SignalsQuery {
    pub family: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SignalsResponse {
    pub capacity: usize,
    pub count: usize,
    pub signals: Vec<SignalRecord>,
}

/// Handler for the /signals endpoint.
#[instrument(skip(state))]
pub async fn signals_handler(
    State(state): State<SharedState>,
    Query(query): Query<SignalsQuery>,
) -> Response {
    debug!("Processing /signals request");
    state.health_stats.record_http_request();

    let family = match query.family.as_deref().map(str::parse::<Family>) {
        Some(Ok(family)) => Some(family),
        Some(Err(e)) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        None => None,
    };

    let snapshot = state.snapshot.read().await;
    let mut signals: Vec<SignalRecord> = snapshot
        .signals
        .iter()
        .filter(|r| family.map_or(true, |f| r.family == f))
        .cloned()
        .collect();

    if let Some(limit) = query.limit {
        let skip = signals.len().saturating_sub(limit);
        signals.drain(..skip);
    }

    Json(SignalsResponse {
        capacity: snapshot.signal_capacity,
        count: signals.len(),
        signals,
    })
    .into_response()
}
