//! HTTP server for the playback dashboard

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::UiConfig;
use crate::error::{Error, Result};
use crate::playback::PlaybackManager;
use crate::ui::handlers;

/// State shared by all handlers
pub struct AppState {
    pub manager: PlaybackManager,
}

pub struct WebServer {
    config: UiConfig,
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(config: UiConfig, manager: PlaybackManager) -> Self {
        Self {
            config,
            state: Arc::new(AppState { manager }),
        }
    }

    /// Router with the API routes and, if configured, the static dashboard
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/api/play", post(handlers::play))
            .route("/api/stop", post(handlers::stop))
            .route("/api/status", get(handlers::get_status))
            .route("/api/devices", get(handlers::get_devices))
            .with_state(self.state.clone());

        let app = match &self.config.static_dir {
            Some(dir) => api.fallback_service(ServeDir::new(dir)),
            None => api,
        };
        app.layer(CorsLayer::permissive())
    }

    pub fn address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.bind_address, self.config.http_port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address: {}", e)))
    }

    /// Serve until the listener fails
    pub async fn run(self) -> Result<()> {
        let addr = self.address()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Web UI listening on http://{}", addr);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    pub fn start_background(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let result = self.run().await;
            if let Err(e) = &result {
                tracing::error!("Web server error: {}", e);
            }
            result
        })
    }
}
