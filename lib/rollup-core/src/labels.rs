//! Labels and canonical series keys.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

const PAIR_DELIMITER: char = ',';
const NAME_VALUE_DELIMITER: char = '=';

/// A single label: a name/value pair.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Label {
    /// Label name.
    pub name: String,

    /// Label value.
    pub value: String,
}

impl Label {
    /// Creates a new `Label`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Returns `true` if `name` can be used as a label name in a [`SeriesKey`].
///
/// Label names must not contain the delimiters used by the canonical form, otherwise the key could not be parsed back
/// into the original labels. Label values are only restricted from containing the pair delimiter (`,`).
pub fn is_valid_label_name(name: &str) -> bool {
    !name.contains(PAIR_DELIMITER) && !name.contains(NAME_VALUE_DELIMITER)
}

/// Canonical identity of a series.
///
/// The key is the label set sorted by name and rendered as `name=value,` for each label, so two label sets produce the
/// same key exactly when they hold the same pairs, regardless of order. An empty label set yields an empty key. Keys
/// can be parsed back into their labels with [`SeriesKey::labels`], which is how series are reconstructed when they are
/// flushed from the store.
///
/// Cloning is cheap.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SeriesKey(Arc<str>);

impl SeriesKey {
    /// Builds the canonical key for the given labels.
    pub fn from_labels(labels: &[Label]) -> Self {
        let mut sorted = labels.iter().collect::<Vec<_>>();
        sorted.sort_unstable();

        let capacity = sorted.iter().map(|l| l.name.len() + l.value.len() + 2).sum();
        let mut key = String::with_capacity(capacity);
        for label in sorted {
            key.push_str(&label.name);
            key.push(NAME_VALUE_DELIMITER);
            key.push_str(&label.value);
            key.push(PAIR_DELIMITER);
        }

        Self(key.into())
    }

    /// Parses the key back into its labels, sorted by name.
    pub fn labels(&self) -> Vec<Label> {
        let Some(pairs) = self.0.strip_suffix(PAIR_DELIMITER) else {
            return Vec::new();
        };

        pairs
            .split(PAIR_DELIMITER)
            .map(|pair| match pair.split_once(NAME_VALUE_DELIMITER) {
                Some((name, value)) => Label::new(name, value),
                None => Label::new(pair, ""),
            })
            .collect()
    }

    /// Returns the key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the key of the empty label set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
