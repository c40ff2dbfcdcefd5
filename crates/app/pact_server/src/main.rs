//! Pact API server binary.

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use pact_core::auth::store::{PgSessionStore, SWEEP_PERIOD, spawn_sweeper};
use pact_core::auth::tokens::TokenAuthority;
use pact_core::files::LocalFileStore;
use pact_core::notify::email::{LogMailer, RetryPolicy, spawn_email_worker};
use pact_core::notify::realtime::BroadcastHub;
use pact_core::notify::{Dispatcher, PgNotificationStore};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "pact_server", about = "Pact API server")]
struct Args {
    /// Address to bind (host:port).
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3200")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/pact"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = pact_core::db::DEFAULT_MAX_CONNECTIONS)]
    max_connections: u32,

    /// Root directory for stored files.
    #[arg(long, env = "FILES_ROOT", default_value = "./data/files")]
    files_root: String,

    /// Public base URL used in emailed links.
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://127.0.0.1:3200")]
    public_base_url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pact_api=debug,pact_core=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    info!(database_url = %args.database_url, bind_addr = %args.bind_addr, "starting pact_server");

    let pool = pact_core::db::connect(&args.database_url, args.max_connections).await?;

    info!("running database migrations");
    pact_api::migrate(&pool).await?;

    // First-run bootstrap: create the initial admin when configured.
    if let (Ok(email), Ok(password)) = (
        std::env::var("ADMIN_EMAIL"),
        std::env::var("ADMIN_PASSWORD"),
    ) {
        pact_api::services::auth::ensure_admin(&pool, &email, &password)
            .await
            .map_err(|e| format!("admin bootstrap failed: {e}"))?;
    }

    let config = pact_api::config::ApiConfig {
        bind_addr: args.bind_addr.clone(),
        database_url: args.database_url.clone(),
        jwt_secret: pact_core::auth::jwt::resolve_jwt_secret(),
        public_base_url: args.public_base_url.clone(),
        files_root: args.files_root.clone(),
    };

    let shutdown = CancellationToken::new();

    // Token authority over the durable grant store, plus its expiry sweep.
    let session_store = Arc::new(PgSessionStore::new(pool.clone()));
    let authority = TokenAuthority::new(session_store.clone(), config.jwt_secret.as_bytes());
    let sweeper = spawn_sweeper(session_store, SWEEP_PERIOD, shutdown.clone());

    // Notification fan-out: persisted rows, realtime hub, async email worker.
    let (email_queue, email_worker) = spawn_email_worker(
        Arc::new(LogMailer),
        RetryPolicy::default(),
        shutdown.clone(),
    );
    let dispatcher = Dispatcher::new(
        Arc::new(PgNotificationStore::new(pool.clone())),
        Arc::new(BroadcastHub::new()),
        Arc::new(email_queue),
    );

    let state = pact_api::AppState {
        pool,
        config: config.clone(),
        authority,
        dispatcher,
        files: Arc::new(LocalFileStore::new(&config.files_root)),
    };

    let app = pact_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let serve_shutdown = shutdown.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = serve_shutdown.cancelled() => {}
            }
        })
        .await;

    // Stop the background workers before exiting.
    shutdown.cancel();
    let _ = sweeper.await;
    let _ = email_worker.await;

    result?;
    Ok(())
}
