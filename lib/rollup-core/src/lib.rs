//! Windowed aggregation of labeled counter and gauge samples into finalized time series points.
//!
//! Samples are folded into per-series state keyed by their canonical label set. A series' value for a given one-second
//! window is only known to be final once a sample from a later window arrives, so emission always trails the freshest
//! sample by one window. Series that stop receiving samples are flushed and evicted by a background scheduler once they
//! have been idle for longer than the configured staleness timeout, and whatever remains is drained when the collector
//! shuts down.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod aggregate;

mod collector;
pub use self::collector::{Collector, ShutdownHandle};

mod config;
pub use self::config::CollectorConfiguration;

mod error;
pub use self::error::{CollectorError, ExtractError, GenericError};

pub mod extract;

mod flush;

pub mod labels;

mod point;
pub use self::point::{DataPoint, FinalizedPoint, MetricKind, Sample};

pub mod sender;

pub mod store;

mod telemetry;
