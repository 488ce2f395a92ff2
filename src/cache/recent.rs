//! Recent prediction results
//!
//! Keeps the latest neighbor list per requester so clients can fetch it
//! after a prediction. Bounded by entry count and age.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::training::Neighbor;

/// The neighbor list behind one prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentResult {
    pub requester: Option<String>,
    pub target_subject: String,
    pub neighbors: Vec<Neighbor>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CacheEntry {
    value: RecentResult,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Bounded per-requester cache, newest entry first
#[derive(Debug)]
pub struct RecentResults {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<VecDeque<CacheEntry>>,
}

impl RecentResults {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Store a result, replacing the requester's previous one.
    pub fn record(&self, requester: Option<&str>, target_subject: &str, neighbors: Vec<Neighbor>) {
        let requester = requester.map(|r| r.trim().to_lowercase());
        let mut entries = self.entries.lock();
        entries.retain(|e| !e.is_expired(self.ttl));
        if requester.is_some() {
            entries.retain(|e| e.value.requester != requester);
        }
        entries.push_front(CacheEntry {
            value: RecentResult {
                requester,
                target_subject: target_subject.to_string(),
                neighbors,
                recorded_at: Utc::now(),
            },
            created_at: Instant::now(),
        });
        entries.truncate(self.capacity);
    }

    /// Latest result for `requester`, or the latest overall when `None`.
    pub fn latest(&self, requester: Option<&str>) -> Option<RecentResult> {
        let wanted = requester.map(|r| r.trim().to_lowercase());
        let entries = self.entries.lock();
        entries
            .iter()
            .filter(|e| !e.is_expired(self.ttl))
            .find(|e| wanted.is_none() || e.value.requester == wanted)
            .map(|e| e.value.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().iter().filter(|e| !e.is_expired(self.ttl)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
