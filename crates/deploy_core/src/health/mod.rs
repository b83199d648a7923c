//! Post-deploy health policy.

use std::time::Duration;

use crate::config::ConfigError;

/// Bounded retry policy for the post-deploy health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Total probes before the deploy is declared unhealthy.
    pub attempts: u32,
    /// Pause between failed probes.
    pub interval: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HealthPolicy {
    pub fn new(attempts: u32, interval: Duration, timeout: Duration) -> Result<Self, ConfigError> {
        if attempts == 0 {
            return Err(ConfigError::ZeroHealthAttempts);
        }
        if timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("health timeout"));
        }
        Ok(Self {
            attempts,
            interval,
            timeout,
        })
    }

    /// Upper bound on how long a failing health check can take, saturating
    /// at `Duration::MAX`.
    pub fn worst_case(&self) -> Duration {
        self.timeout
            .saturating_mul(self.attempts)
            .saturating_add(self.interval.saturating_mul(self.attempts.saturating_sub(1)))
    }
}

/// Any 2xx response counts as healthy.
pub fn is_healthy_status(status: u16) -> bool {
    (200..300).contains(&status)
}
