//! Report server binary
//! Serves the log report endpoint over ClickHouse

use anyhow::{Context, Result};
use clap::{Arg, Command};
use reportlog_search::config::Config;
use reportlog_search::database::ClickHouseDataSource;
use reportlog_search::handlers::{create_router, AppState};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("report-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Log report query service over ClickHouse")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Server host"),
        )
        .arg(
            Arg::new("validate-config")
                .long("validate-config")
                .help("Validate configuration and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Fall back to environment variables when no config file is present
    let mut config = if Path::new(config_path).exists() {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load configuration from {}", config_path))?
    } else {
        Config::from_env().context("Failed to load configuration from environment")?
    };

    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    if let Some(host) = matches.get_one::<String>("host") {
        config.server.host = host.clone();
    }

    init_tracing(&config.monitoring.log_level);

    if !Path::new(config_path).exists() {
        warn!("Config file {} not found, using environment and defaults", config_path);
    }

    config.validate().context("Configuration validation failed")?;

    if matches.get_flag("validate-config") {
        info!("Configuration is valid");
        return Ok(());
    }

    let config = Arc::new(config);

    info!("Initializing services...");
    let data_source = ClickHouseDataSource::connect(&config.clickhouse)
        .await
        .context("Failed to initialize ClickHouse data source")?;

    let app_state = AppState::new(config.clone(), Arc::new(data_source))
        .context("Failed to initialize application state")?;

    let mut app = create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(config.request_timeout()))
            .layer(RequestDecompressionLayer::new())
            .layer(CompressionLayer::new()),
    );

    if config.server.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid server host")?,
        config.server.port,
    );

    info!("Starting report service on {}", addr);
    print_config_summary(&config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn print_config_summary(config: &Config) {
    info!("=== Configuration Summary ===");
    info!("Server: {}:{}", config.server.host, config.server.port);
    info!("ClickHouse: {}", config.clickhouse.url);
    info!("Database: {}", config.clickhouse.database);
    info!("Log table: {}", config.report.log_table);
    info!("Max page size: {}", config.report.max_page_size);
    info!("Query timeout: {}s", config.report.query_timeout_secs);
    info!("Query logging: {}", config.monitoring.enable_query_logging);
    info!("================================");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
