use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use santa_api::state::{AppState, AppStateInner};
use santa_db::Database;
use santa_draw::{DrawService, MatchingSolver, RecryptJob, TracingNotifier};
use santa_server::config::AppConfig;
use santa_server::recrypt_loop;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "santa=debug,tower_http=debug".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    let jwt_secret = match config.jwt_secret() {
        Ok(secret) => secret.to_string(),
        Err(e) => {
            eprintln!("FATAL: {}.", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };
    let codec = Arc::new(config.codec()?);

    let db = Arc::new(Database::open(&config.db_path)?);
    info!(
        db = %config.db_path.display(),
        cipher_version = %codec.current_version(),
        "Database ready"
    );

    if config.recrypt.enabled {
        let job = Arc::new(RecryptJob::new(db.clone(), codec.clone()));
        tokio::spawn(recrypt_loop::run_recrypt_loop(
            job,
            config.recrypt.interval_secs,
            config.recrypt.chunk_size,
        ));
        info!("Recrypt: every {}s", config.recrypt.interval_secs);
    }

    let draws = DrawService::new(db, codec, MatchingSolver::new(config.solver))
        .with_notifier(Arc::new(TracingNotifier));
    let state: AppState = Arc::new(AppStateInner { draws, jwt_secret });

    let app = Router::new()
        .route("/health", get(health))
        .merge(santa_api::router(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Santa server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// GET /health (no auth).
async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
