//! `PlatformConnector` trait and `BaseAdapter`: composition, not
//! inheritance — every connector embeds a `BaseAdapter` by value rather
//! than extending a base class.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::capabilities::Capabilities;
use crate::error::AdapterError;
use crate::message::{ExternalEvent, Message, SendResult, Target};

/// Adapter lifecycle state machine: operations outside
/// `Running` fail with `platform_error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

impl AdapterState {
    fn can_transition_to(self, next: AdapterState) -> bool {
        use AdapterState::*;
        matches!((self, next), (Uninitialized, Initialized) | (Initialized, Running) | (Running, Stopped) | (Stopped, Initialized))
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub connected: bool,
    pub last_ping: Option<chrono::DateTime<chrono::Utc>>,
    pub last_message: Option<chrono::DateTime<chrono::Utc>>,
    pub error_rate: f64,
    pub latency_ms: Option<u64>,
    pub queue_depth: u64,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Metrics {
    pub sent: u64,
    pub received: u64,
    pub errors: u64,
    pub uptime_secs: u64,
}

/// Thread-safe counters, uptime, and lifecycle state shared by every
/// connector. Each adapter carries its own reader-writer lock over its
/// mutable state.
pub struct BaseAdapter {
    sent: AtomicU64,
    received: AtomicU64,
    errors: AtomicU64,
    queue_depth: AtomicU64,
    started_at: Instant,
    state: RwLock<AdapterState>,
    last_ping: RwLock<Option<chrono::DateTime<chrono::Utc>>>,
    last_message: RwLock<Option<chrono::DateTime<chrono::Utc>>>,
}

impl Default for BaseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseAdapter {
    pub fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            queue_depth: AtomicU64::new(0),
            started_at: Instant::now(),
            state: RwLock::new(AdapterState::Uninitialized),
            last_ping: RwLock::new(None),
            last_message: RwLock::new(None),
        }
    }

    pub async fn state(&self) -> AdapterState {
        *self.state.read().await
    }

    /// Enforces the legal transition set; returns a `platform_error` on an
    /// illegal one rather than silently no-op'ing.
    pub async fn transition(&self, next: AdapterState) -> Result<(), AdapterError> {
        let mut state = self.state.write().await;
        if state.can_transition_to(next) {
            *state = next;
            Ok(())
        } else {
            Err(AdapterError::platform_error(format!("illegal adapter transition {:?} -> {:?}", *state, next)))
        }
    }

    /// Fails fast with `platform_error` unless the adapter is `Running` —
    /// every connector operation that talks to the platform calls this
    /// first.
    pub async fn require_running(&self) -> Result<(), AdapterError> {
        if self.state().await == AdapterState::Running {
            Ok(())
        } else {
            Err(AdapterError::platform_error("adapter is not running"))
        }
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_queue_depth(&self, depth: u64) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    pub async fn touch_ping(&self) {
        *self.last_ping.write().await = Some(chrono::Utc::now());
    }

    pub async fn touch_message(&self) {
        *self.last_message.write().await = Some(chrono::Utc::now());
    }

    /// `error_rate = failures/(sent+received)`; `0.0` when no
    /// traffic has occurred yet.
    pub fn metrics(&self) -> Metrics {
        Metrics {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    pub async fn health(&self, connected: bool, latency: Option<Duration>, error: Option<String>) -> HealthStatus {
        let sent = self.sent.load(Ordering::Relaxed);
        let received = self.received.load(Ordering::Relaxed);
        let errors = self.errors.load(Ordering::Relaxed);
        let denom = sent + received;
        let error_rate = if denom == 0 { 0.0 } else { errors as f64 / denom as f64 };
        HealthStatus {
            connected,
            last_ping: *self.last_ping.read().await,
            last_message: *self.last_message.read().await,
            error_rate,
            latency_ms: latency.map(|d| d.as_millis() as u64),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
            error,
        }
    }
}

/// Common contract every platform connector implements.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    fn platform(&self) -> &'static str;
    fn capabilities(&self) -> Capabilities;
    fn version(&self) -> &'static str;

    async fn initialize(&self, config: Value) -> Result<(), AdapterError>;
    async fn start(&self) -> Result<(), AdapterError>;
    async fn shutdown(&self) -> Result<(), AdapterError>;

    async fn send_message(&self, target: &Target, message: &Message) -> Result<SendResult, AdapterError>;
    async fn receive_event(&self, event: ExternalEvent) -> Result<(), AdapterError>;

    async fn health_check(&self) -> HealthStatus;
    fn metrics(&self) -> Metrics;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle_transitions_follow_the_state_machine() {
        let base = BaseAdapter::new();
        assert_eq!(base.state().await, AdapterState::Uninitialized);
        base.transition(AdapterState::Initialized).await.unwrap();
        base.transition(AdapterState::Running).await.unwrap();
        assert!(base.require_running().await.is_ok());
        base.transition(AdapterState::Stopped).await.unwrap();
        assert!(base.require_running().await.is_err());
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected() {
        let base = BaseAdapter::new();
        let err = base.transition(AdapterState::Running).await.unwrap_err();
        assert_eq!(err.code, crate::error::AdapterErrorCode::PlatformError);
    }

    #[test]
    fn error_rate_is_zero_with_no_traffic() {
        let base = BaseAdapter::new();
        let m = base.metrics();
        assert_eq!(m.sent, 0);
        assert_eq!(m.received, 0);
    }

    #[tokio::test]
    async fn error_rate_divides_failures_by_total_traffic() {
        let base = BaseAdapter::new();
        base.record_sent();
        base.record_sent();
        base.record_received();
        base.record_error();
        let health = base.health(true, None, None).await;
        assert!((health.error_rate - (1.0 / 3.0)).abs() < 1e-9);
    }
}
