//! Values endpoint handler.
//!
//! `/values` returns the flattened metrics of the last successful poll as a
//! JSON object sorted by key.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::state::{PollStatus, SharedState};

#[derive(Debug, Serialize)]
pub struct ValuesResponse {
    pub poll: Option<u64>,
    pub status: PollStatus,
    pub count: usize,
    pub values: BTreeMap<String, i64>,
}

/// Handler for the /values endpoint.
#[instrument(skip(state))]
pub async fn values_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /values request");
    state.health_stats.record_http_request();

    let snapshot = state.snapshot.read().await;
    let values: BTreeMap<String, i64> = snapshot
        .metrics
        .iter()
        .map(|(key, value)| (key.clone(), *value))
        .collect();

    Json(ValuesResponse {
        poll: snapshot.last_poll,
        status: snapshot.status,
        count: values.len(),
        values,
    })
}
