//! Capped exponential backoff between retries

use std::time::Duration;

/// Configuration for how long to wait after a failed attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorBackoffConfig {
    initial_error_delay: Duration,
    max_error_delay: Duration,
    multiplier: u32,
}

impl Default for ErrorBackoffConfig {
    /// Default backoff configuration
    ///
    /// Uses an initial error delay of 100 ms with a multiplier of 2. Maximum delay is
    /// capped at 15 seconds.
    fn default() -> Self {
        Self {
            initial_error_delay: Duration::from_millis(100),
            max_error_delay: Duration::from_secs(15),
            multiplier: 2,
        }
    }
}

impl ErrorBackoffConfig {
    /// Constructs a new backoff configuration
    ///
    /// After the first failure the delay is `initial_error_delay`. Each further
    /// failure multiplies the delay by `multiplier`, up to `max_error_delay`.
    pub fn new(initial_error_delay: Duration, max_error_delay: Duration, multiplier: u32) -> Self {
        Self {
            initial_error_delay,
            max_error_delay,
            multiplier,
        }
    }

    /// The delay after the first failure
    pub fn initial_delay(&self) -> Duration {
        self.initial_error_delay
    }

    /// The longest delay this configuration produces
    pub fn max_delay(&self) -> Duration {
        self.max_error_delay
    }

    /// The delay to wait after `failures` consecutive failures
    ///
    /// No failures means no delay.
    pub fn delay_after(&self, failures: u32) -> Duration {
        let Some(exponent) = failures.checked_sub(1) else {
            return Duration::ZERO;
        };

        self.multiplier
            .checked_pow(exponent)
            .and_then(|factor| self.initial_error_delay.checked_mul(factor))
            .map_or(self.max_error_delay, |delay| delay.min(self.max_error_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_doubles_from_100ms() {
        let config = ErrorBackoffConfig::default();

        assert_eq!(config.delay_after(0), Duration::ZERO);
        assert_eq!(config.delay_after(1), Duration::from_millis(100));
        assert_eq!(config.delay_after(2), Duration::from_millis(200));
        assert_eq!(config.delay_after(4), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped() {
        let config = ErrorBackoffConfig::default();

        assert_eq!(config.delay_after(9), Duration::from_millis(25_600).min(config.max_delay()));
        assert_eq!(config.delay_after(9), Duration::from_secs(15));
        assert_eq!(config.delay_after(200), Duration::from_secs(15));
    }

    #[test]
    fn custom_multiplier_and_cap() {
        let config = ErrorBackoffConfig::new(Duration::from_millis(50), Duration::from_secs(1), 3);

        assert_eq!(config.initial_delay(), Duration::from_millis(50));
        assert_eq!(config.delay_after(2), Duration::from_millis(150));
        assert_eq!(config.delay_after(4), Duration::from_secs(1));
        assert_eq!(config.delay_after(u32::MAX), Duration::from_secs(1));
    }
}
