//! Legislative Deep Research API Server
//!
//! Runs the deep research pipeline over HTTP (`/api/research`) and streams
//! progress over WebSocket (`/ws/research`).

mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use legis_services::DeepResearchService;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_PORT: u16 = 3001;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Research service (optional - requires OPENAI_API_KEY)
    pub research_service: Option<Arc<DeepResearchService>>,
}

fn load_env() {
    // A missing .env.local is fine
    if let Err(e) = dotenvy::from_filename(".env.local") {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,legis_api=debug")),
        )
        .init();
}

/// Build the research service, or run without it when OpenAI is not configured
fn research_service() -> Option<Arc<DeepResearchService>> {
    match DeepResearchService::from_env() {
        Ok(service) => {
            info!(
                "Research service ready (providers: {})",
                service.registry().ids().join(", ")
            );
            Some(Arc::new(service))
        }
        Err(e) => {
            warn!(
                "Research service not available: {}. Set OPENAI_API_KEY to enable.",
                e
            );
            None
        }
    }
}

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::ws_routes())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    info!("Starting Legislative Deep Research API");

    if std::env::var("EXA_API_KEY").is_err() {
        info!("EXA_API_KEY not set - searching Diet minutes only");
    }

    let state = AppState {
        research_service: research_service(),
    };

    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
