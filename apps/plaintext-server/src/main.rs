//! plainTeXt Compile Server
//!
//! Accepts a zipped LaTeX project in chunks and compiles it to PDF with the
//! local TeX toolchain. A single endpoint drives the whole lifecycle:
//!
//! - `POST /compile?action=upload&upload_id=plaintext-…` appends a chunk
//! - `POST /compile?action=compile&upload_id=plaintext-…` builds the PDF
//!
//! ## Architecture
//!
//! The HTTP layer only parses parameters and maps errors; everything else
//! lives in `latex-engine`:
//!
//! - Rate limiting via tower-governor
//! - Permissive CORS so the browser editor can call from any origin
//! - Optional periodic sweep of archives that were never compiled

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use latex_engine::{Compiler, EngineConfig};
use tokio::signal;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
#[cfg(test)]
mod tests;

use api::{handle_compile, handle_health};

/// Command-line arguments for the plainTeXt server
#[derive(Parser, Debug)]
#[command(name = "plaintext-server")]
#[command(about = "Chunked LaTeX project upload and PDF compilation server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PLAINTEXT_PORT", default_value = "8172")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "PLAINTEXT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory holding in-progress upload archives
    #[arg(long, env = "PLAINTEXT_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Parent directory for per-compile working directories (system temp if unset)
    #[arg(long, env = "PLAINTEXT_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Wall-clock limit for each toolchain step, in seconds
    #[arg(long, env = "PLAINTEXT_STEP_TIMEOUT_SECS", default_value = "30")]
    step_timeout_secs: u64,

    /// Prefix every upload_id must start with
    #[arg(long, env = "PLAINTEXT_TOKEN_PREFIX", default_value = "plaintext")]
    token_prefix: String,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "PLAINTEXT_RATE_LIMIT", default_value = "20")]
    rate_limit: u32,

    /// Largest accepted request body (one chunk), in bytes
    #[arg(long, env = "PLAINTEXT_MAX_CHUNK_BYTES", default_value = "16777216")]
    max_chunk_bytes: usize,

    /// Delete archives untouched for this many seconds (disabled if unset)
    #[arg(long, env = "PLAINTEXT_ORPHAN_TTL_SECS")]
    orphan_ttl_secs: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(&self.upload_dir)
            .with_token_prefix(&self.token_prefix)
            .with_step_timeout(Duration::from_secs(self.step_timeout_secs));
        if let Some(work_dir) = &self.work_dir {
            config = config.with_work_root(work_dir);
        }
        config
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub compiler: Arc<Compiler>,
}

impl AppState {
    pub fn new(compiler: Compiler) -> Self {
        Self {
            compiler: Arc::new(compiler),
        }
    }
}

/// Routes without the per-connection middleware
pub fn build_router(state: AppState, max_chunk_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/compile", post(handle_compile))
        .layer(DefaultBodyLimit::max(max_chunk_bytes))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting plainTeXt server on {}:{}", args.host, args.port);

    let compiler = Compiler::new(args.engine_config());
    compiler.store().ensure_root().await?;
    let state = AppState::new(compiler);

    if let Some(ttl) = args.orphan_ttl_secs {
        spawn_orphan_sweeper(state.clone(), Duration::from_secs(ttl));
    }

    // Create rate limiter configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit * 2)
            .finish()
            .ok_or_else(|| anyhow!("Invalid rate limit: {}", args.rate_limit))?,
    );

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(state, args.max_chunk_bytes)
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Upload directory: {}", args.upload_dir.display());
    info!("Step timeout: {}s", args.step_timeout_secs);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Periodically remove archives whose session never reached compile
fn spawn_orphan_sweeper(state: AppState, ttl: Duration) {
    info!("Orphaned archive TTL: {}s", ttl.as_secs());
    let period = (ttl / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = state.compiler.store().sweep_orphans(ttl).await {
                warn!("Orphan sweep failed: {}", e);
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
    info!("Shutdown signal received, finishing in-flight requests...");
}
