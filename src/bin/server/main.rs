//! Lumen light-level server
//!
//! Serves windowed light-level aggregates over HTTP and a line-framed
//! request/reply socket.
//!
//! # Endpoints
//!
//! ## HTTP
//! - `GET /device/:id/lightlevels` - Bucketed light levels
//! - `GET /streetlamp/:id/lightlevels` - Legacy alias
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//!
//! ## Line socket
//! - `<device>/daily`, `<device>/weekly` - Period requests
//! - `{"jsonrpc":"2.0","method":"lightlevel",...}` - JSON-RPC requests
//!
//! # CLI Commands
//!
//! - `start` - Start both listeners (default if no command specified)
//! - `check-config` - Validate configuration and print a summary
//! - `query` - Answer one query against the data directory and exit
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `--config` flag
//! 2. `LUMEN_CONFIG` environment variable (path to TOML file)
//! 3. `./application.toml` in current directory
//! 4. Default configuration

mod config;

use clap::{Parser, Subcommand};
use lumen_tsdb::{
    aggregation::ReducerRegistry,
    config::ApplicationConfig,
    context::{ServiceContext, SystemClock},
    metrics,
    network::{build_router, ConnectionConfig, SocketListener},
    query::{QueryService, RawQuery},
    storage::InMemoryStore,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::{signal, sync::broadcast};
use tracing::{debug, info, warn};

// =============================================================================
// CLI Definition
// =============================================================================

/// Lumen TSDB - windowed light-level aggregation service
#[derive(Parser)]
#[command(name = "lumen-server")]
#[command(version)]
#[command(about = "Windowed light-level aggregation over HTTP and a line socket", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides LUMEN_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override HTTP listen address (e.g., 0.0.0.0:8080)
    #[arg(long, global = true)]
    http: Option<SocketAddr>,

    /// Override line-socket listen address (e.g., 0.0.0.0:5555)
    #[arg(long, global = true)]
    socket: Option<SocketAddr>,

    /// Override data directory path
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and socket listeners (default)
    Start,

    /// Validate configuration file without starting the server
    CheckConfig,

    /// Answer one query against the data directory and print the result
    Query {
        /// Device identifier
        device: String,

        /// Reducer name (defaults to the configured reducer)
        #[arg(short, long)]
        reducer: Option<String>,

        /// Bucket unit (defaults to the configured unit)
        #[arg(short, long)]
        per: Option<String>,

        /// Window start, unix seconds
        #[arg(long)]
        start: Option<String>,

        /// Window end, unix seconds
        #[arg(long)]
        end: Option<String>,
    },
}

impl Cli {
    /// Load configuration and apply the command-line overrides
    fn load_config(&self) -> Result<ApplicationConfig, lumen_tsdb::Error> {
        let mut config = config::load_config(self.config.as_deref())?;

        if let Some(http) = self.http {
            config.server.http_addr = http;
        }
        if let Some(socket) = self.socket {
            config.server.socket_addr = socket;
        }
        if let Some(data_dir) = &self.data_dir {
            config.storage.data_dir = data_dir.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Setup
// =============================================================================

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Open the store and wire the query service into a context
fn build_context(config: &ApplicationConfig) -> Result<ServiceContext, lumen_tsdb::Error> {
    let store = InMemoryStore::open(&config.storage)?;
    let query = QueryService::from_config(
        Arc::new(store),
        ReducerRegistry::builtin(),
        &config.query,
    );
    Ok(ServiceContext::from_config(
        query,
        Arc::new(SystemClock),
        config,
    ))
}

/// Graceful shutdown signal handler
///
/// Signal registration failures are logged and that signal source is
/// ignored; the server then has to be killed forcefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {},
            Err(e) => {
                warn!(
                    error = %e,
                    "Ctrl+C handler installation failed - graceful shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

/// Run both listeners until shutdown
async fn cmd_start(config: ApplicationConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Lumen TSDB Server v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        "Configuration: http_addr={}, socket_addr={}, data_dir={:?}",
        config.server.http_addr, config.server.socket_addr, config.storage.data_dir
    );

    metrics::init();
    let ctx = Arc::new(build_context(&config)?);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let socket_task = if config.server.socket_enabled {
        let listener =
            SocketListener::bind(config.server.socket_addr, ConnectionConfig::from(&config.socket))
                .await?;
        Some(tokio::spawn(
            listener.run(Arc::clone(&ctx), shutdown_tx.subscribe()),
        ))
    } else {
        info!("Line socket disabled");
        None
    };

    let router = build_router(Arc::clone(&ctx), &config.server.cors_allowed_origins);
    let listener = tokio::net::TcpListener::bind(config.server.http_addr).await?;
    info!(addr = %config.server.http_addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(());
    if let Some(task) = socket_task {
        match task.await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => warn!(error = %e, "Line socket stopped with error"),
            Err(e) => warn!(error = %e, "Line socket task panicked"),
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Validate configuration and print summary
fn cmd_check_config(config: &ApplicationConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Configuration is valid!");
    println!();
    println!("Server Settings:");
    println!("  HTTP address: {}", config.server.http_addr);
    println!(
        "  Socket address: {} ({})",
        config.server.socket_addr,
        if config.server.socket_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Log level: {}", config.server.log_level);
    println!();
    println!("Storage Settings:");
    println!("  Device catalog: {:?}", config.storage.devices_path());
    println!("  Measurement log: {:?}", config.storage.measurements_path());
    println!();
    println!("Query Settings:");
    println!("  Default reducer: {}", config.query.default_reducer);
    println!("  Default unit: {}", config.query.default_per);
    println!("  Store retries: {}", config.query.max_store_retries);
    println!("  Strict HTTP status: {}", config.query.strict_http_status);
    println!(
        "  Periods: daily per {}, weekly per {}",
        config.periods.daily_per, config.periods.weekly_per
    );

    Ok(())
}

/// Answer one query and print the JSON result
async fn cmd_query(
    config: &ApplicationConfig,
    query: RawQuery,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = build_context(config)?;
    let stats = ctx.query().store().stats();
    debug!(
        devices = stats.devices,
        measurements = stats.measurements,
        "Store opened for one-shot query"
    );

    let values = ctx.query().answer(&query).await?;
    println!("{}", serde_json::to_string(&values)?);
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    init_tracing(&config.server.log_level);

    match cli.command {
        Some(Commands::CheckConfig) => cmd_check_config(&config),
        Some(Commands::Query {
            device,
            reducer,
            per,
            start,
            end,
        }) => {
            let query = RawQuery::new(
                device,
                reducer.unwrap_or_else(|| config.query.default_reducer.clone()),
                per.unwrap_or_else(|| config.query.default_per.as_str().to_string()),
            )
            .with_bounds(start, end);
            cmd_query(&config, query).await
        },
        Some(Commands::Start) | None => cmd_start(config).await,
    }
}
