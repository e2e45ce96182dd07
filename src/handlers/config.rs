//! Configuration display endpoint handler.
//!
//! This module provides the `/config` endpoint handler that displays
//! the current collector configuration.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use herakles_windows_collector::Family;
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::config::{Config, DEFAULT_BIND_ADDR, DEFAULT_PORT};
use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

fn list_or(values: Option<&[String]>, empty: &str) -> String {
    match values {
        Some(values) if !values.is_empty() => values.join(", "),
        _ => empty.to_string(),
    }
}

/// Renders the configuration as a plain-text page. The password is masked.
fn render(cfg: &Config) -> String {
    let mut out = String::new();

    writeln!(out, "HERAKLES WINDOWS COLLECTOR - CONFIGURATION").ok();
    writeln!(out, "==========================================").ok();
    writeln!(out).ok();

    writeln!(out, "SERVER CONFIGURATION").ok();
    writeln!(out, "--------------------").ok();
    writeln!(
        out,
        "bind:                       {}",
        cfg.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    )
    .ok();
    writeln!(
        out,
        "port:                       {}",
        cfg.port.unwrap_or(DEFAULT_PORT)
    )
    .ok();
    writeln!(
        out,
        "enable_health:              {}",
        cfg.enable_health.unwrap_or(true)
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "SOURCE").ok();
    writeln!(out, "------").ok();
    match &cfg.payload_file {
        Some(path) => writeln!(out, "payload_file:               {}", path.display()).ok(),
        None => writeln!(out, "url:                        {}", cfg.url()).ok(),
    };
    writeln!(
        out,
        "update_every:               {} seconds",
        cfg.update_every().as_secs()
    )
    .ok();
    writeln!(
        out,
        "timeout:                    {} seconds",
        cfg.timeout().as_secs()
    )
    .ok();
    writeln!(
        out,
        "username:                   {}",
        cfg.username.as_deref().unwrap_or("none")
    )
    .ok();
    writeln!(
        out,
        "password:                   {}",
        if cfg.password.is_some() { "********" } else { "none" }
    )
    .ok();
    writeln!(
        out,
        "collectors:                 {}",
        list_or(cfg.collectors.as_deref(), "exporter defaults")
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "ENTITY TRACKING").ok();
    writeln!(out, "---------------").ok();
    writeln!(
        out,
        "include_families:           {}",
        list_or(cfg.include_families.as_deref(), "all")
    )
    .ok();
    writeln!(
        out,
        "exclude_families:           {}",
        list_or(cfg.exclude_families.as_deref(), "none")
    )
    .ok();
    writeln!(
        out,
        "signal_history:             {}",
        cfg.signal_history()
    )
    .ok();
    match cfg.family_filter() {
        Ok(filter) => {
            let enabled: Vec<&str> = filter.enabled().map(Family::as_str).collect();
            writeln!(
                out,
                "tracked ({:2}):               {}",
                enabled.len(),
                enabled.join(", ")
            )
            .ok();
        }
        Err(e) => {
            writeln!(out, "tracked:                    invalid ({})", e).ok();
        }
    }
    writeln!(out).ok();

    writeln!(out, "LOGGING").ok();
    writeln!(out, "-------").ok();
    writeln!(
        out,
        "log_level:                  {}",
        cfg.log_level.as_deref().unwrap_or("info")
    )
    .ok();
    writeln!(out).ok();

    writeln!(out, "{FOOTER_TEXT}").ok();
    out
}

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");

    state.health_stats.record_http_request();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        render(&state.config),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_is_masked() {
        let cfg = Config {
            username: Some("monitor".into()),
            password: Some("s3cret".into()),
            ..Config::default()
        };
        let page = render(&cfg);
        assert!(page.contains("monitor"));
        assert!(!page.contains("s3cret"));
    }

    #[test]
    fn test_lists_tracked_families() {
        let cfg = Config {
            include_families: Some(vec!["cores".into(), "volumes".into()]),
            ..Config::default()
        };
        let page = render(&cfg);
        assert!(page.contains("cores, volumes"));
    }
}
