//! Engine configuration
//!
//! Configuration comes from three layers: built-in defaults, environment
//! variables (`BOMBARD_*`, with `.env` support at the binary boundary), and
//! CLI flags applied by the caller. Validation happens once at engine
//! construction; a running engine never re-validates.

use std::env;
use std::time::Duration;

use crate::core::params::Parameters;
use crate::errors::{EngineError, EngineResult};

/// Default target, matching the board server this generator was built for.
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4000;

/// Coordinates are sampled in `[0, max_coord]` on both axes.
pub const DEFAULT_MAX_COORD: u32 = 511;

/// Fixed per-request timeout; also the bound on how long an in-flight
/// request can outlive a Stop.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything needed to construct an engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Target host (plain HTTP)
    pub host: String,
    /// Target port
    pub port: u16,
    /// Upper bound of the coordinate space, inclusive
    pub max_coord: u32,
    /// Per-request timeout applied by the HTTP client
    pub request_timeout: Duration,
    /// Initial parameter values; live updates start from here
    pub initial: Parameters,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            max_coord: DEFAULT_MAX_COORD,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            initial: Parameters::default(),
        }
    }
}

impl EngineConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// Recognized variables: `BOMBARD_HOST`, `BOMBARD_PORT`,
    /// `BOMBARD_MAX_COORD`, `BOMBARD_REQUEST_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("BOMBARD_HOST").unwrap_or(defaults.host),
            port: env_parse("BOMBARD_PORT").unwrap_or(defaults.port),
            max_coord: env_parse("BOMBARD_MAX_COORD").unwrap_or(defaults.max_coord),
            request_timeout: env_parse("BOMBARD_REQUEST_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            initial: defaults.initial,
        }
    }

    /// Reject configurations that cannot run. Called by `Engine::new`.
    pub fn validate(&self) -> EngineResult<()> {
        if !self.initial.rate_hz.is_finite() || self.initial.rate_hz <= 0.0 {
            return Err(EngineError::InvalidRate(self.initial.rate_hz));
        }
        if self.initial.concurrency == 0 {
            return Err(EngineError::InvalidConcurrency(self.initial.concurrency));
        }
        if self.max_coord == 0 {
            return Err(EngineError::InvalidMaxCoord(self.max_coord));
        }
        if self.request_timeout.is_zero() {
            return Err(EngineError::InvalidTimeout);
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("ignoring unparsable {key}={raw}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        EngineConfig::default().validate().expect("defaults valid");
    }

    #[test]
    fn non_positive_rate_is_rejected() {
        let mut config = EngineConfig::default();
        config.initial.rate_hz = 0.0;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidRate(_))
        ));

        config.initial.rate_hz = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidRate(_))
        ));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut config = EngineConfig::default();
        config.initial.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = EngineConfig {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::InvalidTimeout)));
    }
}
