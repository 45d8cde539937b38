//! Per-sample aggregation decisions.
//!
//! Everything here is pure: given the stored state of a series (if any) and a new sample, decide what the new stored
//! state is, and whether the previously stored state has become final and must be emitted.

use tokio::time::Instant;

use crate::{point::MetricKind, store::SeriesState};

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Returns the one-second window the given timestamp falls into.
pub const fn window_of(timestamp_ns: i64) -> i64 {
    timestamp_ns.div_euclid(NANOS_PER_SECOND)
}

/// Outcome of folding a sample into a series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aggregation {
    /// State to store for the series.
    pub next: SeriesState,

    /// Previously stored state that is now final, if the sample moved the series into a later window.
    pub emit: Option<SeriesState>,
}

/// Folds a sample into the series state.
///
/// The first sample of a series becomes its stored value outright and is never emitted immediately. After that,
/// counters add the sample to the stored value and gauges replace it. When the sample's window is later than the
/// stored sample's window, the stored state is final: it is emitted as-is (the total up to the end of its window),
/// while the new state carries on. Samples within the same window, or from an earlier window, are absorbed silently.
pub fn aggregate(
    prior: Option<&SeriesState>, value: f64, timestamp_ns: i64, kind: MetricKind, now: Instant,
) -> Aggregation {
    let Some(prior) = prior else {
        return Aggregation {
            next: SeriesState::new(value, timestamp_ns, now),
            emit: None,
        };
    };

    let value = match kind {
        MetricKind::Counter => prior.value + value,
        MetricKind::Gauge => value,
    };
    let window_advanced = window_of(prior.timestamp_ns) < window_of(timestamp_ns);

    Aggregation {
        next: SeriesState::new(value, timestamp_ns, now),
        emit: window_advanced.then_some(*prior),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn ts(second: i64, millis: i64) -> i64 {
        second * NANOS_PER_SECOND + millis * 1_000_000
    }

    fn fold(samples: &[(f64, i64)], kind: MetricKind) -> (Option<SeriesState>, Vec<SeriesState>) {
        let now = Instant::now();
        let mut state = None;
        let mut emitted = Vec::new();
        for &(value, timestamp_ns) in samples {
            let aggregation = aggregate(state.as_ref(), value, timestamp_ns, kind, now);
            emitted.extend(aggregation.emit);
            state = Some(aggregation.next);
        }
        (state, emitted)
    }

    #[test]
    fn window_boundaries() {
        assert_eq!(window_of(0), 0);
        assert_eq!(window_of(ts(100, 999)), 100);
        assert_eq!(window_of(ts(101, 0)), 101);
        assert_eq!(window_of(-1), -1);
        assert_eq!(window_of(-NANOS_PER_SECOND), -1);
        assert_eq!(window_of(-NANOS_PER_SECOND - 1), -2);
    }

    #[test]
    fn first_sample_is_stored_and_not_emitted() {
        let now = Instant::now();
        let aggregation = aggregate(None, 5.0, ts(100, 0), MetricKind::Counter, now);
        assert_eq!(aggregation.emit, None);
        assert_eq!(aggregation.next, SeriesState::new(5.0, ts(100, 0), now));
    }

    #[test]
    fn counter_collapses_window_into_one_point() {
        let samples = [(5.0, ts(100, 100)), (3.0, ts(100, 250)), (2.0, ts(101, 10))];
        let (state, emitted) = fold(&samples, MetricKind::Counter);

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].value, 8.0);
        assert_eq!(emitted[0].timestamp_ns, ts(100, 250));

        // Counters keep a running total across windows.
        let state = state.unwrap();
        assert_eq!(state.value, 10.0);
        assert_eq!(state.timestamp_ns, ts(101, 10));
    }

    #[test]
    fn gauge_keeps_last_value() {
        let samples = [(5.0, ts(100, 100)), (3.0, ts(100, 250)), (7.0, ts(100, 900)), (2.0, ts(101, 10))];
        let (state, emitted) = fold(&samples, MetricKind::Gauge);

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].value, 7.0);
        assert_eq!(emitted[0].timestamp_ns, ts(100, 900));
        assert_eq!(state.unwrap().value, 2.0);
    }

    #[test]
    fn one_emission_per_window_advance() {
        let samples = [(1.0, ts(10, 0)), (1.0, ts(11, 0)), (1.0, ts(11, 500)), (1.0, ts(14, 0))];
        let (_, emitted) = fold(&samples, MetricKind::Counter);

        let emitted = emitted.iter().map(|s| (s.value, s.timestamp_ns)).collect::<Vec<_>>();
        assert_eq!(emitted, vec![(1.0, ts(10, 0)), (3.0, ts(11, 500))]);
    }

    #[test]
    fn late_sample_is_absorbed_without_emission() {
        let samples = [(1.0, ts(20, 0)), (4.0, ts(19, 0))];
        let (state, emitted) = fold(&samples, MetricKind::Counter);

        assert!(emitted.is_empty());
        let state = state.unwrap();
        assert_eq!(state.value, 5.0);
        assert_eq!(state.timestamp_ns, ts(19, 0));
    }
}
