//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with all available endpoints and descriptions.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let (status, metric_count, last_poll) = {
        let snapshot = state.snapshot.read().await;
        (
            format!("{:?}", snapshot.status),
            snapshot.metrics.len(),
            snapshot
                .last_poll
                .map_or_else(|| "none".to_string(), |n| n.to_string()),
        )
    };

    let health_item = if state.config.enable_health.unwrap_or(true) {
        r#"<li>
            <a href="/health">/health</a>
            <div class="endpoint-desc">Poll statistics and status (text)</div>
        </li>"#
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Herakles Windows Collector</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{
            color: #333;
            border-bottom: 3px solid #007bff;
            padding-bottom: 15px;
        }}
        .info {{
            background: #e9ecef;
            padding: 15px;
            border-radius: 4px;
            display: flex;
            justify-content: space-around;
            flex-wrap: wrap;
        }}
        .info-item {{ margin: 10px; }}
        .info-label {{ font-weight: 600; color: #555; display: block; font-size: 0.9em; }}
        .info-value {{ font-size: 1.2em; color: #007bff; }}
        .endpoint-list {{ list-style: none; padding: 0; }}
        .endpoint-list li {{
            margin: 20px 0;
            padding: 15px;
            background: #f8f9fa;
            border-left: 4px solid #007bff;
            border-radius: 4px;
        }}
        .endpoint-list a {{ color: #007bff; text-decoration: none; font-weight: 600; }}
        .endpoint-desc {{ color: #666; margin-top: 5px; }}
        .footer {{
            margin-top: 40px;
            padding-top: 20px;
            border-top: 1px solid #ddd;
            color: #666;
            font-size: 0.9em;
            text-align: center;
        }}
    </style>
</head>
<body>
<div class="container">
    <h1>Herakles Windows Collector</h1>
    <p>Source: <code>{source}</code></p>

    <div class="info">
        <div class="info-item">
            <span class="info-label">Version</span>
            <span class="info-value">{version}</span>
        </div>
        <div class="info-item">
            <span class="info-label">Uptime</span>
            <span class="info-value">{uptime}</span>
        </div>
        <div class="info-item">
            <span class="info-label">Last poll</span>
            <span class="info-value">{last_poll} ({status})</span>
        </div>
        <div class="info-item">
            <span class="info-label">Metrics</span>
            <span class="info-value">{metric_count}</span>
        </div>
    </div>

    <h2>Available Endpoints</h2>
    <ul class="endpoint-list">
        <li>
            <a href="/values">/values</a>
            <div class="endpoint-desc">Flattened metrics of the last successful poll (JSON)</div>
        </li>
        <li>
            <a href="/entities">/entities</a>
            <div class="endpoint-desc">Tracked entities per family (JSON)</div>
        </li>
        <li>
            <a href="/signals">/signals</a>
            <div class="endpoint-desc">Recent appeared/disappeared signals (JSON)</div>
        </li>
        <li>
            <a href="/metrics">/metrics</a>
            <div class="endpoint-desc">Collector self-telemetry in Prometheus format</div>
        </li>
        {health_item}
        <li>
            <a href="/config">/config</a>
            <div class="endpoint-desc">Active runtime configuration (read-only)</div>
        </li>
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</div>
</body>
</html>"#,
        source = state.source,
        version = version,
        uptime = uptime_str,
        last_poll = last_poll,
        status = status,
        metric_count = metric_count,
        health_item = health_item,
        footer = FOOTER_TEXT
    );

    Html(html)
}
