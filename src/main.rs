//! herakles-windows-collector - version 0.1.0
//!
//! Entity-aware windows_exporter collector with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod poller;
mod state;

use axum::{routing::get, Router};
use clap::Parser;
use herakles_windows_collector::HealthStats;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::{
    net::TcpListener,
    signal,
    sync::{Mutex, RwLock},
};
use tracing::{debug, error, info, Level};

use cli::{Args, Commands};
use commands::{command_check, command_config, command_families, command_test};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};
use handlers::{
    config_handler, entities_handler, health_handler, metrics_handler, root_handler,
    signals_handler, values_handler,
};
use metrics::CollectorMetrics;
use state::{AppState, Snapshot};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let level_name = config.log_level.as_deref().unwrap_or("info");
    let log_level = match level_name {
        "off" | "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Logging initialized with level: {}", level_name);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        match command {
            Commands::Config {
                output,
                format,
                commented,
            } => return command_config(output.clone(), format.clone(), *commented),
            Commands::Families { verbose, family } => {
                return Ok(command_families(*verbose, family.clone())?);
            }
            _ => {
                // Polling commands need a valid config
            }
        }

        let config = load_validated_config(&args)?;
        setup_logging(&config);

        let result = match command {
            Commands::Check => command_check(&config).await,
            Commands::Test {
                iterations,
                verbose,
            } => command_test(*iterations, *verbose, &config).await,
            Commands::Config { .. } => unreachable!("Config handled above"),
            Commands::Families { .. } => unreachable!("Families handled above"),
        };

        if let Err(e) = result {
            eprintln!("\n❌ {:#}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;

    setup_logging(&config);

    info!("Starting herakles-windows-collector");

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);

    let collector = poller::build_collector(&config)?;
    let source = collector.source().unwrap_or_default();
    info!("Collecting from {}", source);

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics = CollectorMetrics::new(&registry)?;
    debug!("All metrics registered successfully");

    let state = Arc::new(AppState {
        registry,
        metrics,
        snapshot: RwLock::new(Snapshot::new(config.signal_history())),
        config: Arc::new(config.clone()),
        health_stats: Arc::new(HealthStats::new()),
        source,
        start_time: Instant::now(),
    });

    // The first tick fires immediately, so the initial poll happens here
    let collector = Arc::new(Mutex::new(collector));
    let poll_task = tokio::spawn(poller::run(state.clone(), collector.clone()));

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/values", get(values_handler))
        .route("/entities", get(entities_handler))
        .route("/signals", get(signals_handler))
        .route("/config", get(config_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app.with_state(state.clone());

    let listener = TcpListener::bind(addr).await?;
    info!(
        "herakles-windows-collector listening on http://{}:{}",
        bind_ip_str, port
    );

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, exiting...");
        }
    }

    // Wait for an in-flight poll by taking the lock before stopping the loop
    let mut collector = collector.lock().await;
    poll_task.abort();
    collector.cleanup();

    info!("herakles-windows-collector stopped gracefully");
    Ok(())
}
