use serde::{Deserialize, Serialize};

use crate::labels::Label;

/// How successive samples of a series combine.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Each sample is a delta added to the running total.
    #[default]
    Counter,

    /// Each sample replaces the previous value.
    Gauge,
}

/// A single observation handed to the collector.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Labels identifying the series, in any order.
    pub labels: Vec<Label>,

    /// Observed value.
    pub value: f64,

    /// Time of the observation, in nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,

    /// Kind of metric the sample belongs to.
    pub kind: MetricKind,
}

impl Sample {
    /// Creates a counter sample.
    pub fn counter(labels: Vec<Label>, value: f64, timestamp_ns: i64) -> Self {
        Self {
            labels,
            value,
            timestamp_ns,
            kind: MetricKind::Counter,
        }
    }

    /// Creates a gauge sample.
    pub fn gauge(labels: Vec<Label>, value: f64, timestamp_ns: i64) -> Self {
        Self {
            labels,
            value,
            timestamp_ns,
            kind: MetricKind::Gauge,
        }
    }
}

/// The timestamp/value half of a [`FinalizedPoint`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DataPoint {
    /// Nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,

    /// Value at that time.
    pub value: f64,
}

/// A point whose value is final, ready to be sent downstream.
///
/// Serializes as `{"labels": [{"name": .., "value": ..}, ..], "sample": {"timestamp_ns": .., "value": ..}}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FinalizedPoint {
    labels: Vec<Label>,
    sample: DataPoint,
}

impl FinalizedPoint {
    /// Creates a new `FinalizedPoint`.
    pub fn new(labels: Vec<Label>, value: f64, timestamp_ns: i64) -> Self {
        Self {
            labels,
            sample: DataPoint { timestamp_ns, value },
        }
    }

    /// Returns the labels of the series, sorted by name.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Returns the timestamp and value.
    pub fn sample(&self) -> DataPoint {
        self.sample
    }

    /// Returns the value.
    pub fn value(&self) -> f64 {
        self.sample.value
    }

    /// Returns the timestamp, in nanoseconds since the Unix epoch.
    pub fn timestamp_ns(&self) -> i64 {
        self.sample.timestamp_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_wire_shape() {
        let point = FinalizedPoint::new(vec![Label::new("pod", "a")], 8.0, 100_250_000_000);
        let rendered = serde_json::to_value(&point).unwrap();
        assert_eq!(
            rendered,
            serde_json::json!({
                "labels": [{"name": "pod", "value": "a"}],
                "sample": {"timestamp_ns": 100_250_000_000i64, "value": 8.0},
            })
        );
    }

    #[test]
    fn metric_kind_names() {
        assert_eq!(serde_json::from_str::<MetricKind>(r#""counter""#).unwrap(), MetricKind::Counter);
        assert_eq!(serde_json::from_str::<MetricKind>(r#""gauge""#).unwrap(), MetricKind::Gauge);
        assert!(serde_json::from_str::<MetricKind>(r#""histogram""#).is_err());
    }
}
