//! Concurrent per-series state.

use std::time::Duration;

use foldhash::quality::RandomState;
use papaya::{Compute, HashMap, Operation};
use tokio::time::Instant;

use crate::labels::SeriesKey;

/// Aggregation state of a single series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesState {
    /// Accumulated (counter) or latest (gauge) value.
    pub value: f64,

    /// Timestamp of the most recent sample, in nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,

    /// When the series was last written to.
    ///
    /// Only used to decide staleness, and never sent downstream.
    pub last_update: Instant,
}

impl SeriesState {
    /// Creates a new `SeriesState`.
    pub fn new(value: f64, timestamp_ns: i64, last_update: Instant) -> Self {
        Self {
            value,
            timestamp_ns,
            last_update,
        }
    }

    /// Returns `true` if the series has not been written to for longer than `timeout` as of `now`.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_update) > timeout
    }
}

/// Concurrent map from series key to series state.
///
/// Backed by a lock-free hash map, so writers to different series never block each other, and scans for stale series
/// run alongside ingestion. There is at most one entry per key at any time.
pub struct SeriesStore {
    series: HashMap<SeriesKey, SeriesState, RandomState>,
}

impl SeriesStore {
    /// Creates an empty `SeriesStore`.
    pub fn new() -> Self {
        Self {
            series: HashMap::with_hasher(RandomState::default()),
        }
    }

    /// Returns the number of live series.
    pub fn len(&self) -> usize {
        self.series.pin().len()
    }

    /// Returns `true` if there are no live series.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current state of the given series, if it exists.
    pub fn get(&self, key: &SeriesKey) -> Option<SeriesState> {
        self.series.pin().get(key).copied()
    }

    /// Sets the state of the given series, replacing any existing state.
    pub fn set(&self, key: SeriesKey, state: SeriesState) {
        self.series.pin().insert(key, state);
    }

    /// Atomically replaces the state of the given series with the result of `f`.
    ///
    /// `f` is given the current state, or `None` if the series does not exist yet, and returns the new state. Under
    /// contention on the same key `f` may be called more than once, so it must not have side effects.
    ///
    /// Returns the state that was replaced, or `None` if the series was created.
    pub fn update<F>(&self, key: SeriesKey, mut f: F) -> Option<SeriesState>
    where
        F: FnMut(Option<&SeriesState>) -> SeriesState,
    {
        let series = self.series.pin();
        let result = series.compute(key, |entry| {
            Operation::<SeriesState, ()>::Insert(f(entry.map(|(_, state)| state)))
        });

        match result {
            Compute::Updated { old: (_, prior), .. } => Some(*prior),
            _ => None,
        }
    }

    /// Removes every series that is stale as of `now`, returning the removed entries.
    ///
    /// Staleness is re-checked at removal time, so a series written to between the scan and the removal survives.
    pub fn evict_stale(&self, now: Instant, timeout: Duration) -> Vec<(SeriesKey, SeriesState)> {
        let series = self.series.pin();
        let candidates = series
            .iter()
            .filter(|(_, state)| state.is_stale(now, timeout))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();

        let mut evicted = Vec::with_capacity(candidates.len());
        for key in candidates {
            let result = series.compute(key, |entry| match entry {
                Some((_, state)) if state.is_stale(now, timeout) => Operation::Remove,
                _ => Operation::Abort(()),
            });

            if let Compute::Removed(key, state) = result {
                evicted.push((key.clone(), *state));
            }
        }

        evicted
    }

    /// Removes every series, returning the removed entries.
    pub fn drain(&self) -> Vec<(SeriesKey, SeriesState)> {
        let series = self.series.pin();
        let keys = series.keys().cloned().collect::<Vec<_>>();

        keys.into_iter()
            .filter_map(|key| series.remove(&key).map(|state| (key, *state)))
            .collect()
    }
}
