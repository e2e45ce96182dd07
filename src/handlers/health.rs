//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! poll statistics and the status of the most recent poll.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::{PollStatus, SharedState};

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/cansp-dev/herakles-windows-collector | More info: https://www.herakles.now | Support: exporter@herakles.now";

/// Maps the last poll status to an HTTP status and a short heading.
fn status_line(status: PollStatus, last_error: Option<&str>) -> (StatusCode, String) {
    match status {
        PollStatus::Ok => (StatusCode::OK, "OK".to_string()),
        PollStatus::Pending => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Waiting for first poll".to_string(),
        ),
        PollStatus::NoMetrics => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Endpoint reachable - no metrics collected".to_string(),
        ),
        PollStatus::Failed => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Poll failed: {}", last_error.unwrap_or("unknown error")),
        ),
    }
}

fn format_uptime(uptime_seconds: u64) -> String {
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    }
}

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    state.health_stats.record_http_request();

    let (status, message, last_success) = {
        let snapshot = state.snapshot.read().await;
        let (status, message) = status_line(snapshot.status, snapshot.last_error.as_deref());
        let last_success = snapshot
            .last_success
            .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
        (status, message, last_success)
    };

    let uptime_str = format_uptime(state.health_stats.get_uptime_seconds());
    let table = state.health_stats.render_table();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nSource: {}\nLast successful poll: {last_success}\nUptime: {uptime_str}\n\n{table}\n{FOOTER_TEXT}",
            state.source
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_distinguishes_empty_from_failure() {
        let (code, message) = status_line(PollStatus::NoMetrics, None);
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert!(message.contains("no metrics collected"));

        let (code, message) = status_line(PollStatus::Failed, Some("connection refused"));
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert!(message.contains("connection refused"));

        let (code, _) = status_line(PollStatus::Ok, None);
        assert_eq!(code, StatusCode::OK);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(90), "1.5 minutes");
        assert_eq!(format_uptime(7200), "2.0 hours");
        assert_eq!(format_uptime(172800), "2.0 days");
    }
}
