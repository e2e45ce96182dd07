//! Entities endpoint handler.
//!
//! `/entities` lists the members of every entity family, as of the last
//! successful poll.

use axum::{extract::State, response::IntoResponse, Json};
use herakles_windows_collector::Family;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct EntitiesResponse {
    pub poll: Option<u64>,
    pub total: usize,
    pub families: BTreeMap<Family, Vec<String>>,
}

/// Handler for the /entities endpoint.
#[instrument(skip(state))]
pub async fn entities_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /entities request");
    state.health_stats.record_http_request();

    let snapshot = state.snapshot.read().await;
    let families = snapshot.entities.clone();
    let total = families.values().map(Vec::len).sum();

    Json(EntitiesResponse {
        poll: snapshot.last_poll,
        total,
        families,
    })
}
