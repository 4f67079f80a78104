//! User facing configuration of the [Dispatcher][crate::core::Dispatcher].
use std::time::Duration;

/// Tuning parameters for the interaction loop.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use xforms::Config;
///
/// let config = Config {
///     idle_delta: Duration::from_millis(20),
///     ..Config::default()
/// };
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.event_priority, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Cadence of STEP / UPDATE passes and the idle callback when anything needs polling
    pub idle_delta: Duration,
    /// The longest the loop will block when nothing needs polling
    pub max_sleep: Duration,
    /// Consecutive platform events handled before a forced idle / I/O pass
    pub event_priority: usize,
    /// Maximum delay between pushes for them to count as a double or triple click
    pub click_timeout: Duration,
    /// Maximum nesting of synthetic event dispatch before giving up
    pub max_dispatch_depth: usize,
    /// Coalesce consecutive motion events for the same window
    pub compress_motion: bool,
    /// Coalesce consecutive expose events for the same window
    pub compress_expose: bool,
    /// Idle passes after which the cached pointer state is re-queried
    pub pointer_query_age: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_delta: Duration::from_millis(50),
            max_sleep: Duration::from_millis(500),
            event_priority: 10,
            click_timeout: Duration::from_millis(400),
            max_dispatch_depth: 32,
            compress_motion: true,
            compress_expose: true,
            pointer_query_age: 2,
        }
    }
}

impl Config {
    /// Check that the values in this config are usable.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.idle_delta.is_zero() {
            return Err("idle_delta must be non-zero".into());
        }

        if self.max_sleep < self.idle_delta {
            return Err("max_sleep must be at least idle_delta".into());
        }

        if self.event_priority == 0 {
            return Err("event_priority must be at least 1".into());
        }

        if self.max_dispatch_depth == 0 {
            return Err("max_dispatch_depth must be at least 1".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case(Config { idle_delta: Duration::ZERO, ..Config::default() }; "zero idle delta")]
    #[test_case(Config { max_sleep: Duration::from_millis(1), ..Config::default() }; "sleep below idle delta")]
    #[test_case(Config { event_priority: 0, ..Config::default() }; "zero priority")]
    #[test_case(Config { max_dispatch_depth: 0, ..Config::default() }; "zero depth")]
    #[test]
    fn invalid_configs_are_rejected(c: Config) {
        assert!(c.validate().is_err());
    }

    #[test]
    fn default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
