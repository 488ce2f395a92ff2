//! Application state management

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::RecentResults;
use crate::inference::Predictor;
use crate::storage::Repository;

use super::ServerConfig;

/// Application state shared across handlers
///
/// The predictor is read-only after startup; the recent-result cache does
/// its own locking.
pub struct AppState {
    pub config: ServerConfig,
    pub predictor: Arc<Predictor>,
    pub repository: Repository,
    pub recent: RecentResults,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServerConfig, predictor: Arc<Predictor>, repository: Repository) -> Self {
        let recent = RecentResults::new(
            config.recent_results_capacity,
            Duration::from_secs(config.recent_results_ttl_secs),
        );
        Self {
            config,
            predictor,
            repository,
            recent,
            started_at: Utc::now(),
        }
    }
}
