// ── Reconnect policy ──
//
// Delay between a lost (or never established) connection and the next
// attempt. Fixed by default; exponential with jitter when `max_delay`
// exceeds `initial_delay`.

use std::time::Duration;

const DEFAULT_DELAY: Duration = Duration::from_secs(5);

/// Upper bound on the exponent so the float math stays finite.
const MAX_EXPONENT: u32 = 16;

/// Reconnect delay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt. Default: 5s.
    pub initial_delay: Duration,

    /// Upper bound on the delay. When not greater than `initial_delay`
    /// every attempt waits exactly `initial_delay`. Default: 5s.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::fixed(DEFAULT_DELAY)
    }
}

impl ReconnectConfig {
    /// Always wait `delay`.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
        }
    }

    /// Exponential backoff from `initial_delay` up to about `max_delay`.
    pub fn backoff(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.max_delay <= self.initial_delay
    }

    /// Delay before reconnect number `attempt` (0-based, reset after every
    /// successful connect).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.is_fixed() {
            self.initial_delay
        } else {
            calculate_backoff(attempt, self)
        }
    }
}

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
///
/// The jitter is derived from the attempt number, so it spreads clients
/// that started at different times without needing a random source.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(MAX_EXPONENT)).unwrap_or(0);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}
