//! status-page-exporter - version 0.1.0
//!
//! Status page web server with tracing logging.
//! This is the main entry point that resolves configuration and runs the server.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

use status_page_exporter::cli::{Args, LogLevel};
use status_page_exporter::config::{
    parse_log_level, render_config, resolve_config, validate_effective_config, Config,
};
use status_page_exporter::server::{build_router, shutdown_signal};
use status_page_exporter::{AppState, HostSource};

/// Initializes tracing logging subsystem with configured log level.
/// CLI flag wins over the config file.
fn setup_logging(config: &Config, args: &Args) {
    let log_level = args
        .log_level
        .or_else(|| config.log_level.as_deref().and_then(parse_log_level))
        .unwrap_or(LogLevel::Info);

    let filter = match log_level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("Logging initialized with level: {:?}", log_level);
}

/// Main application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = resolve_config(&args)?;

    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {:#}", e);
        std::process::exit(1);
    }

    if args.check_config {
        println!("✅ Configuration is valid");
        return Ok(());
    }

    if args.show_config {
        println!("{}", render_config(&config, args.config_format)?);
        return Ok(());
    }

    setup_logging(&config, &args);

    info!("Starting status-page-exporter {}", status_page_exporter::APP_VERSION);

    let addr = config.socket_addr()?;
    let state = AppState::new(config, Box::new(HostSource::new()))?.into_shared();

    // Warm-up probe: establishes CPU and counter baselines before the first scrape.
    let warmup_state = state.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || warmup_state.probe.collect()).await {
        error!("Initial system probe failed: {}", e);
    }

    let start_time = state.start_time;
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("status-page-exporter listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {}", e);
            e
        })?;

    info!(
        "status-page-exporter stopped gracefully after {:.0?}",
        start_time.elapsed()
    );
    Ok(())
}
