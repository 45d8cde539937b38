//! Turning structured events into samples.
//!
//! An extractor holds a list of metric definitions. Each definition produces one sample per event: its value read from
//! a field of the event (or `1`, to count events), its labels read from other fields, and its timestamp read from a
//! shared timestamp field when one is configured.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{EmptyName, ExtractError, InvalidLabelName, ReservedLabelName},
    labels::{is_valid_label_name, Label},
    point::{MetricKind, Sample},
};

/// Label carrying the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// A metric to extract from every event.
#[derive(Clone, Debug, Deserialize)]
pub struct MetricDefinition {
    /// Metric name, carried as the `__name__` label.
    pub name: String,

    /// Dotted path of the field holding the value.
    ///
    /// When unset, every event counts as a value of `1`.
    #[serde(default)]
    pub value: Option<String>,

    /// Label names mapped to the dotted paths of the fields holding their values.
    ///
    /// Strings are used verbatim, and numbers and booleans are rendered as text. Missing, null, array and object
    /// fields yield an empty value. Values must not contain `,`: such a value can't be parsed back out of the series
    /// key, and the flushed point carries mangled labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Kind of metric.
    ///
    /// Defaults to `counter`.
    #[serde(default)]
    pub kind: MetricKind,
}

/// Extractor configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExtractorConfiguration {
    /// Metrics to extract.
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,

    /// Dotted path of the field holding the event time.
    ///
    /// The field may hold nanoseconds since the Unix epoch, or an RFC 3339 timestamp. When unset, or when the field is
    /// missing or unparsable, the time of extraction is used.
    #[serde(default)]
    pub timestamp_field: Option<String>,
}

/// A dotted path into a JSON document, such as `request.status` or `items.0.id`.
#[derive(Clone, Debug)]
struct FieldPath(Vec<String>);

impl FieldPath {
    fn parse(path: &str) -> Option<Self> {
        if path.is_empty() {
            return None;
        }
        Some(Self(path.split('.').map(str::to_string).collect()))
    }

    fn lookup<'a>(&self, event: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(event, |node, segment| match node {
            Value::Object(fields) => fields.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

struct CompiledMetric {
    name: String,
    value: Option<FieldPath>,
    labels: Vec<(String, Option<FieldPath>)>,
    kind: MetricKind,
}

/// Extracts samples from events.
pub struct SampleExtractor {
    metrics: Vec<CompiledMetric>,
    timestamp_field: Option<FieldPath>,
}

impl SampleExtractor {
    /// Creates a new `SampleExtractor` from the given configuration.
    ///
    /// # Errors
    ///
    /// If a metric has no name, or a label name is reserved or contains a series key delimiter, an error is returned.
    pub fn new(config: ExtractorConfiguration) -> Result<Self, ExtractError> {
        let mut metrics = Vec::with_capacity(config.metrics.len());
        for (index, definition) in config.metrics.into_iter().enumerate() {
            if definition.name.is_empty() {
                return EmptyName { index }.fail();
            }

            let mut labels = Vec::with_capacity(definition.labels.len());
            for (label, path) in definition.labels {
                if label == METRIC_NAME_LABEL {
                    return ReservedLabelName { metric: definition.name }.fail();
                }
                if !is_valid_label_name(&label) {
                    return InvalidLabelName {
                        metric: definition.name,
                        label,
                    }
                    .fail();
                }
                labels.push((label, FieldPath::parse(&path)));
            }

            metrics.push(CompiledMetric {
                value: definition.value.as_deref().and_then(FieldPath::parse),
                name: definition.name,
                labels,
                kind: definition.kind,
            });
        }

        Ok(Self {
            metrics,
            timestamp_field: config.timestamp_field.as_deref().and_then(FieldPath::parse),
        })
    }

    /// Returns `true` if no metrics are configured.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Extracts one sample per configured metric from the event.
    pub fn extract(&self, event: &Value) -> Vec<Sample> {
        self.extract_at(event, current_time_ns())
    }

    fn extract_at(&self, event: &Value, now_ns: i64) -> Vec<Sample> {
        let timestamp_ns = self
            .timestamp_field
            .as_ref()
            .and_then(|path| path.lookup(event))
            .and_then(timestamp_from_value)
            .unwrap_or(now_ns);

        self.metrics
            .iter()
            .map(|metric| {
                let value = match &metric.value {
                    Some(path) => path.lookup(event).map_or(0.0, float_from_value),
                    None => 1.0,
                };

                let mut labels = Vec::with_capacity(metric.labels.len() + 1);
                labels.push(Label::new(METRIC_NAME_LABEL, metric.name.as_str()));
                labels.extend(metric.labels.iter().map(|(name, path)| {
                    let value = path
                        .as_ref()
                        .and_then(|path| path.lookup(event))
                        .map(string_from_value)
                        .unwrap_or_default();
                    Label::new(name.as_str(), value)
                }));

                Sample {
                    labels,
                    value,
                    timestamp_ns,
                    kind: metric.kind,
                }
            })
            .collect()
    }
}

fn current_time_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

fn float_from_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    }
}

fn string_from_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn timestamp_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok()?.timestamp_nanos_opt(),
        _ => None,
    }
}
