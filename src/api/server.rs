//! API Server
//!
//! HTTP and WebSocket front end for the game rooms.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
    router::EventRouter,
};
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::metrics::EngineMetrics;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub struct ApiServer {
    config: ServerConfig,
    router: Arc<EventRouter>,
    metrics: Arc<EngineMetrics>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, router: Arc<EventRouter>, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            config,
            router,
            metrics,
        }
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<(), ServerError> {
        let app = self.create_app();
        let addr = self.socket_addr()?;

        info!("🌐 Starting casino server");
        info!("   Listen: http://{}", addr);
        self.log_server_info();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("✅ Server running");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("🛑 Server stopped gracefully");
        Ok(())
    }

    /// Router with the full middleware stack
    pub fn create_app(&self) -> axum::Router {
        let state = Arc::new(AppState {
            router: self.router.clone(),
            metrics: self.metrics.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        });

        create_router(state)
            // Request ID first so every later layer can see it
            .layer(axum::middleware::from_fn(request_id_middleware))
            .layer(create_cors_layer(self.config.allowed_origins.clone()))
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let ip = self
            .config
            .host
            .parse::<std::net::IpAddr>()
            .map_err(|e| ServerError::InvalidAddress(format!("{}: {}", self.config.host, e)))?;
        Ok(SocketAddr::from((ip, self.config.port)))
    }

    fn log_server_info(&self) {
        info!("📋 Server Configuration:");
        info!("   CORS: {:?}", self.config.allowed_origins);
        info!("   Request timeout: {}s", self.config.request_timeout_secs);
        for engine in self.router.engines() {
            info!("   {}: {:?}", engine.game_type(), engine.room_ids());
        }

        info!("📊 Available endpoints:");
        info!("   GET  /health        - Health check");
        info!("   GET  /rooms         - Room summaries");
        info!("   GET  /rooms/:room   - One room");
        info!("   GET  /metrics       - Prometheus metrics");
        info!("   GET  /ws            - Game events (WebSocket)");
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
