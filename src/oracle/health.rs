//! Source health tracking
//!
//! Counts requests per source, flags a source unhealthy after
//! `UNHEALTHY_AFTER` consecutive failures, and keeps a latency moving average.

use serde::Serialize;

use crate::types::PriceSource;

/// Consecutive failures before a source is marked unhealthy
pub const UNHEALTHY_AFTER: u32 = 3;

/// Weight of the newest latency sample in the moving average
const LATENCY_ALPHA: f64 = 0.1;

/// Health snapshot for one quote source
#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
    pub source: PriceSource,
    pub is_healthy: bool,
    /// Unix seconds of the last recorded request
    pub last_update: i64,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
    /// Exponential moving average, milliseconds
    pub average_latency_ms: f64,
    pub last_error: Option<String>,
}

impl SourceHealth {
    pub fn new(source: PriceSource) -> Self {
        Self {
            source,
            is_healthy: true,
            last_update: 0,
            consecutive_failures: 0,
            total_requests: 0,
            successful_requests: 0,
            average_latency_ms: 0.0,
            last_error: None,
        }
    }

    pub fn record_success(&mut self, latency_ms: f64, now: i64) {
        self.last_update = now;
        self.total_requests += 1;
        self.successful_requests += 1;
        self.consecutive_failures = 0;
        self.is_healthy = true;
        self.last_error = None;
        self.update_latency(latency_ms);
    }

    pub fn record_failure(&mut self, error: impl Into<String>, now: i64) {
        self.last_update = now;
        self.total_requests += 1;
        self.consecutive_failures += 1;
        self.last_error = Some(error.into());

        if self.consecutive_failures >= UNHEALTHY_AFTER {
            if self.is_healthy {
                tracing::warn!(
                    source = %self.source,
                    failures = self.consecutive_failures,
                    "Source marked unhealthy"
                );
            }
            self.is_healthy = false;
        }
    }

    /// Fraction of successful requests; 1.0 before any request
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }

    fn update_latency(&mut self, latency_ms: f64) {
        if self.successful_requests <= 1 {
            self.average_latency_ms = latency_ms;
        } else {
            self.average_latency_ms =
                self.average_latency_ms * (1.0 - LATENCY_ALPHA) + latency_ms * LATENCY_ALPHA;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unhealthy_after_consecutive_failures() {
        let mut health = SourceHealth::new(PriceSource::Pyth);

        health.record_success(10.0, 1);
        health.record_success(10.0, 2);
        assert!(health.is_healthy);
        assert_eq!(health.success_rate(), 1.0);

        health.record_failure("timeout", 3);
        health.record_failure("timeout", 4);
        assert!(health.is_healthy);

        health.record_failure("timeout", 5);
        assert!(!health.is_healthy);
        assert_eq!(health.consecutive_failures, 3);
        assert_eq!(health.last_error.as_deref(), Some("timeout"));
        assert_eq!(health.last_update, 5);
        assert!((health.success_rate() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_success_restores_health() {
        let mut health = SourceHealth::new(PriceSource::Switchboard);
        for t in 0..5 {
            health.record_failure("network", t);
        }
        assert!(!health.is_healthy);

        health.record_success(20.0, 6);
        assert!(health.is_healthy);
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.last_error, None);
    }

    #[test]
    fn test_latency_moving_average() {
        let mut health = SourceHealth::new(PriceSource::Internal);
        assert_eq!(health.success_rate(), 1.0);

        health.record_success(100.0, 1);
        assert_eq!(health.average_latency_ms, 100.0);

        health.record_success(200.0, 2);
        assert!((health.average_latency_ms - 110.0).abs() < 1e-9);
    }
}
