//! Grade Predictor Server Module
//!
//! HTTP API serving predictions from loaded artifacts, plus light admin
//! endpoints over the `users` and `predictions` collections.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use crate::inference::Predictor;
use crate::storage::{DocumentStore, JsonFileStore, MemoryStore, Repository};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory written by `grade-predictor train`
    pub artifact_dir: PathBuf,
    /// JSON document store directory; in-memory store when `None`
    pub store_dir: Option<PathBuf>,
    pub recent_results_capacity: usize,
    pub recent_results_ttl_secs: u64,
    /// Allowed CORS origin; any origin when `None` or `*`
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5002),
            artifact_dir: std::env::var("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./artifacts")),
            store_dir: std::env::var("STORE_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from),
            recent_results_capacity: std::env::var("RECENT_RESULTS_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(256),
            recent_results_ttl_secs: std::env::var("RECENT_RESULTS_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            cors_origin: std::env::var("CORS_ORIGIN").ok().filter(|s| !s.is_empty()),
        }
    }
}

impl ServerConfig {
    /// Open the configured document store
    pub fn open_store(&self) -> crate::error::Result<Arc<dyn DocumentStore>> {
        Ok(match &self.store_dir {
            Some(dir) => Arc::new(JsonFileStore::new(dir.clone())?),
            None => Arc::new(MemoryStore::new()),
        })
    }
}

/// Start the server with the given configuration
///
/// Artifacts are loaded and validated before binding; any failure aborts
/// startup.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(artifact_dir = %config.artifact_dir.display(), "Loading artifacts");

    let predictor = Predictor::load(&config.artifact_dir).with_context(|| {
        format!("failed to load artifacts from {}", config.artifact_dir.display())
    })?;
    let spec = predictor.spec();
    info!(
        profile = %spec.profile,
        encoding = ?spec.encoding,
        subjects = spec.subjects.len(),
        "Artifacts validated"
    );

    let store = config.open_store().context("failed to open document store")?;
    match &config.store_dir {
        Some(dir) => info!(store_dir = %dir.display(), "Using JSON file store"),
        None => warn!("STORE_DIR not set, users and predictions are kept in memory"),
    }

    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::new(predictor),
        Repository::new(store),
    ));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        host = %config.host,
        port = config.port,
        address = %addr,
        started_at = %start_time.to_rfc3339(),
        "Grade predictor server starting"
    );
    info!(url = %format!("http://{}/api/predict", addr), "Prediction endpoint available");
    info!(url = %format!("http://{}/health", addr), "Health endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.recent_results_capacity > 0);
        assert!(!config.host.is_empty());
    }

    #[test]
    fn test_memory_store_when_unset() {
        let config = ServerConfig {
            store_dir: None,
            ..ServerConfig::default()
        };
        let store = config.open_store().unwrap();
        assert!(store.ping().is_ok());
    }
}
