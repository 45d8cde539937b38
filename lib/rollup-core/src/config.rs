use std::time::Duration;

use rollup_config::GenericConfiguration;
use serde::Deserialize;
use snafu::ResultExt as _;

use crate::error::{CollectorError, Configuration, ZeroFlushInterval, ZeroStalenessTimeout};

const fn default_flush_interval_secs() -> u64 {
    1
}

#[derive(Deserialize)]
struct RawCollectorConfiguration {
    #[serde(default = "default_flush_interval_secs")]
    flush_interval_secs: u64,

    #[serde(default)]
    staleness_timeout_secs: u64,
}

/// Collector configuration.
///
/// ## Flush interval
///
/// How often the background scheduler scans for stale series, in seconds (`flush_interval_secs`). Defaults to 1
/// second.
///
/// ## Staleness timeout
///
/// How long a series may go without samples before it is flushed and evicted, in seconds
/// (`staleness_timeout_secs`). There is no default: the timeout is what bounds the number of series held in memory,
/// so it must always be set, and must be greater than zero.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(try_from = "RawCollectorConfiguration")]
pub struct CollectorConfiguration {
    flush_interval: Duration,
    staleness_timeout: Duration,
}

impl CollectorConfiguration {
    /// Creates a new `CollectorConfiguration`.
    ///
    /// # Errors
    ///
    /// If either duration is zero, an error is returned.
    pub fn new(flush_interval: Duration, staleness_timeout: Duration) -> Result<Self, CollectorError> {
        if flush_interval.is_zero() {
            return ZeroFlushInterval.fail();
        }
        if staleness_timeout.is_zero() {
            return ZeroStalenessTimeout.fail();
        }

        Ok(Self {
            flush_interval,
            staleness_timeout,
        })
    }

    /// Creates a new `CollectorConfiguration` from the given configuration.
    ///
    /// # Errors
    ///
    /// If the configuration cannot be deserialized, or holds an invalid flush interval or staleness timeout, an error
    /// is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, CollectorError> {
        config.as_typed().context(Configuration)
    }

    /// Returns the interval between scans for stale series.
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Returns how long a series may be idle before it is flushed and evicted.
    pub fn staleness_timeout(&self) -> Duration {
        self.staleness_timeout
    }
}

impl TryFrom<RawCollectorConfiguration> for CollectorConfiguration {
    type Error = CollectorError;

    fn try_from(raw: RawCollectorConfiguration) -> Result<Self, Self::Error> {
        Self::new(
            Duration::from_secs(raw.flush_interval_secs),
            Duration::from_secs(raw.staleness_timeout_secs),
        )
    }
}
