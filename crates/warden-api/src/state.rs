//! Application state management
//!
//! Author: hephaex@gmail.com

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;
use warden_core::{AppConfig, AuthService};

/// Per-endpoint request statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct EndpointStats {
    pub requests: u64,
    /// Response counts keyed by status code
    pub status_counts: BTreeMap<u16, u64>,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
    #[serde(skip)]
    total_latency_us: u64,
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Credential and token authority
    pub auth: AuthService,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Ready status
    pub is_ready: AtomicBool,
    endpoints: RwLock<HashMap<String, EndpointStats>>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: AppConfig, auth: AuthService) -> Self {
        Self {
            config,
            auth,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            is_ready: AtomicBool::new(true),
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Record one completed request
    pub async fn record_request(&self, endpoint: String, status: u16, latency_us: u64) {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let mut endpoints = self.endpoints.write().await;
        let stats = endpoints.entry(endpoint).or_default();
        stats.requests += 1;
        *stats.status_counts.entry(status).or_default() += 1;
        stats.total_latency_us += latency_us;
        stats.max_latency_us = stats.max_latency_us.max(latency_us);
        stats.avg_latency_us = stats.total_latency_us / stats.requests;
    }

    /// Snapshot of per-endpoint statistics, ordered by endpoint
    pub async fn endpoint_stats(&self) -> BTreeMap<String, EndpointStats> {
        self.endpoints
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warden_core::{MemoryCredentialStore, MemoryRevocationLedger};

    fn state() -> AppState {
        let mut config = AppConfig::default();
        config.password.memory_cost = 1024;
        config.password.time_cost = 1;
        config.password.parallelism = 1;
        let auth = AuthService::new(
            &config,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryRevocationLedger::new()),
        )
        .unwrap();
        AppState::new(config, auth)
    }

    #[tokio::test]
    async fn test_record_request() {
        let state = state();
        state.record_request("/health".to_string(), 200, 100).await;
        state.record_request("/health".to_string(), 200, 300).await;
        state.record_request("/api/v1/auth/login".to_string(), 401, 50).await;

        assert_eq!(state.get_request_count(), 3);

        let stats = state.endpoint_stats().await;
        let health = &stats["/health"];
        assert_eq!(health.requests, 2);
        assert_eq!(health.status_counts[&200], 2);
        assert_eq!(health.avg_latency_us, 200);
        assert_eq!(health.max_latency_us, 300);
        assert_eq!(stats["/api/v1/auth/login"].status_counts[&401], 1);
    }

    #[test]
    fn test_ready_toggle() {
        let state = state();
        assert!(state.is_ready());
        state.set_ready(false);
        assert!(!state.is_ready());
    }
}
