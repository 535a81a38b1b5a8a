// ── Per-source connection health ──
//
// The coordinator feeds two sources (poll loop, push channel) into one
// availability flag. Stale data stays readable: health only gates the
// `available` flag, never the snapshot itself.

use chrono::{DateTime, Utc};
use strum::Display;

/// Health of a single data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionHealth {
    /// Source is delivering updates.
    Connected,
    /// Source is down but actively re-establishing.
    Reconnecting,
    /// Source has been down past its tolerance. Still retried forever.
    Failed,
}

/// Health record for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHealth {
    pub health: ConnectionHealth,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self {
            health: ConnectionHealth::Reconnecting,
            consecutive_failures: 0,
            last_success: None,
        }
    }
}

/// Point-in-time health view exposed to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub poll: SourceHealth,
    pub stream: SourceHealth,
    pub available: bool,
}

/// Tracks both sources and derives the coordinator's availability.
#[derive(Debug, Clone)]
pub(crate) struct HealthTracker {
    pub poll: SourceHealth,
    pub stream: SourceHealth,
    failure_threshold: u32,
}

impl HealthTracker {
    pub(crate) fn new(failure_threshold: u32) -> Self {
        Self {
            poll: SourceHealth::default(),
            stream: SourceHealth::default(),
            failure_threshold: failure_threshold.max(1),
        }
    }

    pub(crate) fn record_poll_success(&mut self) {
        self.poll.health = ConnectionHealth::Connected;
        self.poll.consecutive_failures = 0;
        self.poll.last_success = Some(Utc::now());
    }

    pub(crate) fn record_poll_failure(&mut self) {
        self.poll.consecutive_failures = self.poll.consecutive_failures.saturating_add(1);
        self.poll.health = if self.poll.consecutive_failures >= self.failure_threshold {
            ConnectionHealth::Failed
        } else {
            ConnectionHealth::Reconnecting
        };
    }

    pub(crate) fn record_stream_update(&mut self) {
        self.stream.health = ConnectionHealth::Connected;
        self.stream.consecutive_failures = 0;
        self.stream.last_success = Some(Utc::now());
    }

    pub(crate) fn set_stream_health(&mut self, health: ConnectionHealth) {
        self.stream.health = health;
    }

    /// Overall availability: at least one source must be alive.
    ///
    /// A connected push channel keeps the coordinator available even
    /// while polls fail; poll-only availability needs at least one past
    /// success and fewer than `failure_threshold` consecutive failures.
    pub(crate) fn available(&self) -> bool {
        if self.stream.health == ConnectionHealth::Connected {
            return true;
        }
        self.poll.last_success.is_some()
            && self.poll.consecutive_failures < self.failure_threshold
    }

    pub(crate) fn report(&self) -> HealthReport {
        HealthReport {
            poll: self.poll.clone(),
            stream: self.stream.clone(),
            available: self.available(),
        }
    }

    /// How long ago any source last delivered, or `None` if never.
    pub(crate) fn data_age(&self) -> Option<chrono::Duration> {
        let newest = match (self.poll.last_success, self.stream.last_success) {
            (Some(p), Some(s)) => Some(p.max(s)),
            (p, s) => p.or(s),
        };
        newest.map(|t| Utc::now() - t)
    }
}
