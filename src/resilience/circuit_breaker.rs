//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: first admission check after the open timeout
//! Half-Open → Closed: consecutive successes >= success_threshold
//! Half-Open → Open: any failure
//! ```
//!
//! # Design Decisions
//! - Per-service circuit breaker (not global), created lazily in CLOSED
//! - Thresholds and open timeout are per-service settings
//! - Half-open admission follows `HalfOpenPolicy`: a single trial token by
//!   default, or admit-everyone in permissive mode
//! - Pure state machine: no I/O, time is passed in by the `_at` variants

use std::time::{Duration, Instant, SystemTime};
use dashmap::DashMap;
use serde::Serialize;
use crate::clock;
use crate::config::{CircuitBreakerConfig, HalfOpenPolicy, ServiceBreakerConfig};
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => f.write_str("CLOSED"),
            BreakerState::Open => f.write_str("OPEN"),
            BreakerState::HalfOpen => f.write_str("HALF_OPEN"),
        }
    }
}

/// Thresholds for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout: Duration,
}

impl BreakerSettings {
    /// Gateway-wide defaults.
    pub fn from_defaults(defaults: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: defaults.failure_threshold,
            success_threshold: defaults.success_threshold,
            open_timeout: Duration::from_millis(defaults.timeout_ms),
        }
    }

    /// Service overrides layered on the defaults.
    pub fn resolve(service: &ServiceBreakerConfig, defaults: &CircuitBreakerConfig) -> Self {
        let base = Self::from_defaults(defaults);
        Self {
            failure_threshold: service.failure_threshold.unwrap_or(base.failure_threshold),
            success_threshold: service.success_threshold.unwrap_or(base.success_threshold),
            open_timeout: service
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(base.open_timeout),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct BreakerRecord {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at: Option<SystemTime>,
    next_attempt_at: Option<Instant>,
    /// Set while a half-open trial is in flight (single-trial policy).
    trial_started_at: Option<Instant>,
    total_requests: u64,
    total_failures: u64,
    total_successes: u64,
}

/// Read-only view of one breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub service: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Unix epoch milliseconds.
    pub last_failure_at: Option<u64>,
    /// Unix epoch milliseconds.
    pub next_attempt_at: Option<u64>,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    /// `total_successes / total_requests`, 0 when nothing was recorded.
    pub success_rate: f64,
    pub is_healthy: bool,
}

impl CircuitBreakerSnapshot {
    fn from_record(service: &str, record: &BreakerRecord) -> Self {
        let success_rate = if record.total_requests > 0 {
            record.total_successes as f64 / record.total_requests as f64
        } else {
            0.0
        };
        Self {
            service: service.to_string(),
            state: record.state,
            consecutive_failures: record.consecutive_failures,
            consecutive_successes: record.consecutive_successes,
            last_failure_at: record.last_failure_at.map(clock::unix_millis),
            next_attempt_at: record.next_attempt_at.map(clock::instant_to_millis),
            total_requests: record.total_requests,
            total_failures: record.total_failures,
            total_successes: record.total_successes,
            success_rate,
            is_healthy: record.state == BreakerState::Closed,
        }
    }
}

/// Per-service circuit breakers.
pub struct CircuitBreaker {
    records: DashMap<String, BreakerRecord>,
    settings: DashMap<String, BreakerSettings>,
    defaults: BreakerSettings,
    policy: HalfOpenPolicy,
    monitoring_period: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            records: DashMap::new(),
            settings: DashMap::new(),
            defaults: BreakerSettings::from_defaults(config),
            policy: config.half_open_policy,
            monitoring_period: Duration::from_millis(config.monitoring_period_ms),
        }
    }

    /// Install thresholds for one service.
    pub fn configure(&self, service: &str, settings: BreakerSettings) {
        self.settings.insert(service.to_string(), settings);
    }

    pub fn settings_for(&self, service: &str) -> BreakerSettings {
        self.settings
            .get(service)
            .map(|s| *s.value())
            .unwrap_or(self.defaults)
    }

    pub fn policy(&self) -> HalfOpenPolicy {
        self.policy
    }

    /// Whether a request to `service` may be attempted.
    pub fn can_execute(&self, service: &str) -> bool {
        self.can_execute_at(service, Instant::now())
    }

    pub(crate) fn can_execute_at(&self, service: &str, now: Instant) -> bool {
        let settings = self.settings_for(service);
        let mut entry = self.records.entry(service.to_string()).or_default();
        let record = entry.value_mut();

        match record.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                if record.next_attempt_at.map_or(true, |at| now >= at) {
                    self.transition_to_half_open(service, record);
                    record.trial_started_at = Some(now);
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => match self.policy {
                HalfOpenPolicy::Permissive => true,
                HalfOpenPolicy::SingleTrial => match record.trial_started_at {
                    None => {
                        record.trial_started_at = Some(now);
                        true
                    }
                    // A trial older than the open timeout never reported back.
                    Some(started) if now.saturating_duration_since(started) >= settings.open_timeout => {
                        tracing::warn!(service = %service, "Half-open trial lost, admitting a new one");
                        record.trial_started_at = Some(now);
                        true
                    }
                    Some(_) => false,
                },
            },
        }
    }

    /// Release a half-open trial token without recording an outcome.
    ///
    /// Used when an admitted caller gives up before reaching the backend.
    pub fn abandon_trial(&self, service: &str) {
        if let Some(mut record) = self.records.get_mut(service) {
            if record.state == BreakerState::HalfOpen {
                record.trial_started_at = None;
            }
        }
    }

    pub fn record_success(&self, service: &str) {
        let settings = self.settings_for(service);
        let mut entry = self.records.entry(service.to_string()).or_default();
        let record = entry.value_mut();

        record.total_requests += 1;
        record.total_successes += 1;

        match record.state {
            BreakerState::Closed => {
                record.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                record.consecutive_successes += 1;
                record.trial_started_at = None;
                if record.consecutive_successes >= settings.success_threshold {
                    self.transition_to_closed(service, record);
                }
            }
            BreakerState::Open => {}
        }

        tracing::debug!(
            service = %service,
            successes = record.consecutive_successes,
            threshold = settings.success_threshold,
            "Circuit breaker success recorded"
        );
    }

    pub fn record_failure(&self, service: &str) {
        self.record_failure_at(service, Instant::now());
    }

    pub(crate) fn record_failure_at(&self, service: &str, now: Instant) {
        let settings = self.settings_for(service);
        let mut entry = self.records.entry(service.to_string()).or_default();
        let record = entry.value_mut();

        record.total_requests += 1;
        record.total_failures += 1;
        record.last_failure_at = Some(SystemTime::now());

        match record.state {
            BreakerState::Closed => {
                record.consecutive_failures += 1;
                record.consecutive_successes = 0;
                if record.consecutive_failures >= settings.failure_threshold {
                    self.transition_to_open(service, record, settings, now);
                }
            }
            BreakerState::HalfOpen => {
                record.consecutive_failures += 1;
                self.transition_to_open(service, record, settings, now);
            }
            BreakerState::Open => {}
        }

        tracing::debug!(
            service = %service,
            failures = record.consecutive_failures,
            threshold = settings.failure_threshold,
            "Circuit breaker failure recorded"
        );
    }

    /// Force the breaker to CLOSED, bypassing the normal transitions.
    pub fn reset(&self, service: &str) {
        let mut entry = self.records.entry(service.to_string()).or_default();
        let record = entry.value_mut();
        record.state = BreakerState::Closed;
        record.consecutive_failures = 0;
        record.consecutive_successes = 0;
        record.last_failure_at = None;
        record.next_attempt_at = None;
        record.trial_started_at = None;
        metrics::record_breaker_state(service, BreakerState::Closed);

        tracing::info!(service = %service, "Circuit breaker manually reset");
    }

    /// Snapshot of one breaker, creating it in CLOSED if never referenced.
    pub fn status(&self, service: &str) -> CircuitBreakerSnapshot {
        let entry = self.records.entry(service.to_string()).or_default();
        CircuitBreakerSnapshot::from_record(service, entry.value())
    }

    /// Snapshots of every breaker, sorted by service name.
    pub fn all_statuses(&self) -> Vec<CircuitBreakerSnapshot> {
        let mut snapshots: Vec<_> = self
            .records
            .iter()
            .map(|r| CircuitBreakerSnapshot::from_record(r.key(), r.value()))
            .collect();
        snapshots.sort_by(|a, b| a.service.cmp(&b.service));
        snapshots
    }

    /// Zero the streak counters of CLOSED breakers whose last failure is
    /// older than the monitoring period.
    pub fn cleanup(&self) {
        self.cleanup_at(SystemTime::now());
    }

    pub(crate) fn cleanup_at(&self, now: SystemTime) {
        for mut entry in self.records.iter_mut() {
            let record = entry.value_mut();
            if record.state != BreakerState::Closed {
                continue;
            }
            let stale = record
                .last_failure_at
                .and_then(|at| now.duration_since(at).ok())
                .is_some_and(|age| age > self.monitoring_period);
            if stale {
                record.consecutive_failures = 0;
                record.consecutive_successes = 0;
            }
        }
    }

    fn transition_to_closed(&self, service: &str, record: &mut BreakerRecord) {
        record.state = BreakerState::Closed;
        record.consecutive_failures = 0;
        record.consecutive_successes = 0;
        record.next_attempt_at = None;
        record.trial_started_at = None;
        metrics::record_breaker_state(service, BreakerState::Closed);

        tracing::info!(service = %service, "Circuit breaker transitioned to CLOSED");
    }

    fn transition_to_open(
        &self,
        service: &str,
        record: &mut BreakerRecord,
        settings: BreakerSettings,
        now: Instant,
    ) {
        record.state = BreakerState::Open;
        record.consecutive_successes = 0;
        record.next_attempt_at = Some(now + settings.open_timeout);
        record.trial_started_at = None;
        metrics::record_breaker_state(service, BreakerState::Open);

        tracing::warn!(
            service = %service,
            open_for_ms = clock::as_millis(settings.open_timeout),
            "Circuit breaker transitioned to OPEN"
        );
    }

    fn transition_to_half_open(&self, service: &str, record: &mut BreakerRecord) {
        record.state = BreakerState::HalfOpen;
        record.consecutive_failures = 0;
        record.consecutive_successes = 0;
        metrics::record_breaker_state(service, BreakerState::HalfOpen);

        tracing::info!(service = %service, "Circuit breaker transitioned to HALF_OPEN");
    }
}
