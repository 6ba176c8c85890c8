use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use inkwell_api::state::AppStateInner;
use inkwell_core::activity::{self, run_prune_loop};
use inkwell_core::presence::{self, run_sweep_loop};
use inkwell_core::{Workspace, WorkspaceConfig};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

/// Parse an optional variable, falling back to `default` when it is unset
/// or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring malformed {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkwell=debug,audit=warn,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("INKWELL_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: INKWELL_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       It must match the identity provider's signing secret.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let db_path: PathBuf = std::env::var("INKWELL_DB_PATH")
        .unwrap_or_else(|_| "inkwell.db".into())
        .into();
    let host = std::env::var("INKWELL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("INKWELL_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let share_base_url = std::env::var("INKWELL_SHARE_BASE_URL")
        .unwrap_or_else(|_| format!("http://localhost:{}", port));
    let retention: u32 = env_or("INKWELL_ACTIVITY_RETENTION", activity::DEFAULT_RETENTION);
    let prune_every = Duration::from_secs(env_or("INKWELL_PRUNE_INTERVAL_SECS", 60u64).max(1));
    let presence_timeout = Duration::from_secs(
        env_or("INKWELL_PRESENCE_TIMEOUT_SECS", presence::DEFAULT_TIMEOUT.as_secs()).max(1),
    );
    let sweep_every = Duration::from_secs(env_or("INKWELL_PRESENCE_SWEEP_SECS", 15u64).max(1));

    // Stores
    let db = Arc::new(inkwell_db::Database::open(&db_path)?);
    let workspace = Workspace::new(
        db,
        WorkspaceConfig {
            share_base_url,
            activity_retention: retention,
            presence_timeout,
        },
    );

    // Background maintenance
    tokio::spawn(run_prune_loop(workspace.activity.clone(), prune_every));
    tokio::spawn(run_sweep_loop(workspace.presence.clone(), sweep_every));

    let state = AppStateInner::new(workspace, jwt_secret);

    let app = inkwell_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Inkwell server listening on {}", addr);
    info!(
        "Activity cap {} (pruned every {:?}), presence timeout {:?}",
        retention, prune_every, presence_timeout
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
