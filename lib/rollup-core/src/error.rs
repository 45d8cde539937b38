use rollup_config::ConfigurationError;
use snafu::Snafu;

/// A generic error.
///
/// Used where the only sensible handling is to report the error, such as a failed delivery to the downstream store.
pub type GenericError = anyhow::Error;

/// A collector error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum CollectorError {
    /// The staleness timeout was zero or unset.
    ///
    /// Without a staleness timeout, series that stop receiving samples would never be evicted.
    #[snafu(display("Staleness timeout must be greater than zero."))]
    ZeroStalenessTimeout,

    /// The flush interval was zero.
    #[snafu(display("Flush interval must be greater than zero."))]
    ZeroFlushInterval,

    /// The collector configuration could not be loaded.
    #[snafu(display("Failed to load collector configuration: {}", source))]
    Configuration {
        /// Error source.
        source: ConfigurationError,
    },
}

/// An extractor error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum ExtractError {
    /// A metric definition had no name.
    #[snafu(display("Metric definition #{} has an empty name.", index))]
    EmptyName {
        /// Position of the definition.
        index: usize,
    },

    /// A label name could not be represented in a series key.
    #[snafu(display("Label '{}' of metric '{}' must not contain '=' or ','.", label, metric))]
    InvalidLabelName {
        /// Metric the label belongs to.
        metric: String,

        /// Offending label name.
        label: String,
    },

    /// A label used the reserved metric name label.
    #[snafu(display("Label '__name__' of metric '{}' is reserved.", metric))]
    ReservedLabelName {
        /// Metric the label belongs to.
        metric: String,
    },
}
