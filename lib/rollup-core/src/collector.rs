use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    aggregate::aggregate,
    config::CollectorConfiguration,
    flush::{FlushScheduler, SchedulerHandle},
    labels::{Label, SeriesKey},
    point::{FinalizedPoint, Sample},
    sender::{forward, Sender},
    store::{SeriesState, SeriesStore},
    telemetry::{EmitReason, Telemetry},
};

struct Inner {
    store: Arc<SeriesStore>,
    sender: Arc<dyn Sender>,
    telemetry: Telemetry,
}

/// Aggregates samples into finalized points.
///
/// The collector can be cloned freely and shared between any number of tasks or threads feeding it samples. Samples
/// for different series never contend with each other.
///
/// Points are emitted in three ways:
///
/// - when a sample lands in a later one-second window than the previous sample of its series, the previous value is
///   final and is sent immediately, by the caller of [`handle`][Self::handle]
/// - when a series has received no samples for longer than the staleness timeout, a background scheduler sends its
///   value and evicts it
/// - when the collector is shut down through its [`ShutdownHandle`], every remaining series is sent
#[derive(Clone)]
pub struct Collector {
    inner: Arc<Inner>,
}

impl Collector {
    /// Creates a new `Collector` and starts its flush scheduler.
    ///
    /// Returns the collector along with the handle that shuts it down. Must be called from within a Tokio runtime.
    pub fn start(config: CollectorConfiguration, sender: Arc<dyn Sender>) -> (Self, ShutdownHandle) {
        let store = Arc::new(SeriesStore::new());
        let telemetry = Telemetry::new();

        let scheduler = FlushScheduler::new(
            Arc::clone(&store),
            Arc::clone(&sender),
            telemetry.clone(),
            config.flush_interval(),
            config.staleness_timeout(),
        )
        .spawn();

        let inner = Arc::new(Inner {
            store,
            sender,
            telemetry,
        });

        let collector = Self {
            inner: Arc::clone(&inner),
        };
        let shutdown = ShutdownHandle { inner, scheduler };

        (collector, shutdown)
    }

    /// Folds a sample into its series, returning the point it finalized, if any.
    ///
    /// The returned point is not sent anywhere. Most callers want [`handle`][Self::handle] instead.
    pub fn record(&self, sample: Sample) -> Option<FinalizedPoint> {
        let key = SeriesKey::from_labels(&sample.labels);
        let now = Instant::now();

        // The store may retry the update under contention, so the emission is decided afterwards from the state that
        // was actually replaced.
        let prior = self.inner.store.update(key.clone(), |prior| {
            aggregate(prior, sample.value, sample.timestamp_ns, sample.kind, now).next
        });
        if prior.is_none() {
            self.inner.telemetry.series_created();
        }

        aggregate(prior.as_ref(), sample.value, sample.timestamp_ns, sample.kind, now)
            .emit
            .map(|state| FinalizedPoint::new(key.labels(), state.value, state.timestamp_ns))
    }

    /// Folds a sample into its series, sending the point it finalized, if any.
    ///
    /// Delivery failures are logged and the point is dropped.
    pub async fn handle(&self, sample: Sample) {
        if let Some(point) = self.record(sample) {
            forward(
                self.inner.sender.as_ref(),
                vec![point],
                EmitReason::WindowAdvance,
                &self.inner.telemetry,
            )
            .await;
        }
    }

    /// Returns the current state of the series with the given labels, if it exists.
    pub fn series_state(&self, labels: &[Label]) -> Option<SeriesState> {
        self.inner.store.get(&SeriesKey::from_labels(labels))
    }

    /// Returns the number of live series.
    pub fn active_series(&self) -> usize {
        self.inner.store.len()
    }
}

/// Shuts a [`Collector`] down.
///
/// There is exactly one handle per collector, and draining consumes it, so the drain can only happen once.
pub struct ShutdownHandle {
    inner: Arc<Inner>,
    scheduler: SchedulerHandle,
}

impl ShutdownHandle {
    /// Stops the flush scheduler, then sends every remaining series as a single batch, stale or not.
    ///
    /// Returns the number of points drained. Any series recorded through a remaining `Collector` clone after this is
    /// never flushed.
    pub async fn drain(self) -> usize {
        self.scheduler.stop().await;

        let drained = self.inner.store.drain();
        let drained_len = drained.len();
        self.inner.telemetry.series_removed(drained_len);

        let points = drained
            .into_iter()
            .map(|(key, state)| FinalizedPoint::new(key.labels(), state.value, state.timestamp_ns))
            .collect();
        forward(
            self.inner.sender.as_ref(),
            points,
            EmitReason::Drain,
            &self.inner.telemetry,
        )
        .await;

        if drained_len == 0 {
            debug!("Collector stopped with no series left to drain.");
        } else {
            info!(drained_len, "Collector stopped after draining remaining series.");
        }

        drained_len
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sender::BlackholeSender;

    fn collector() -> (Collector, ShutdownHandle, Arc<BlackholeSender>) {
        let config = CollectorConfiguration::new(Duration::from_secs(1), Duration::from_secs(30)).unwrap();
        let sender = Arc::new(BlackholeSender::default());
        let (collector, shutdown) = Collector::start(config, Arc::clone(&sender) as Arc<dyn Sender>);
        (collector, shutdown, sender)
    }

    #[tokio::test(start_paused = true)]
    async fn record_returns_finalized_point_with_sorted_labels() {
        let (collector, shutdown, sender) = collector();
        let labels = vec![Label::new("zone", "eu"), Label::new("pod", "a")];

        assert_eq!(collector.record(Sample::gauge(labels.clone(), 1.0, 0)), None);
        let point = collector.record(Sample::gauge(labels, 2.0, 1_000_000_000)).unwrap();
        assert_eq!(point.labels(), &[Label::new("pod", "a"), Label::new("zone", "eu")]);
        assert_eq!(point.value(), 1.0);
        assert_eq!(point.timestamp_ns(), 0);

        // `record` leaves delivery to the caller.
        assert_eq!(sender.points_received(), 0);

        assert_eq!(shutdown.drain().await, 1);
        assert_eq!(sender.points_received(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_series() {
        let (collector, shutdown, _) = collector();
        let other = collector.clone();

        collector.handle(Sample::counter(vec![Label::new("pod", "a")], 2.0, 0)).await;
        other.handle(Sample::counter(vec![Label::new("pod", "a")], 3.0, 0)).await;

        assert_eq!(other.active_series(), 1);
        assert_eq!(collector.series_state(&[Label::new("pod", "a")]).unwrap().value, 5.0);

        shutdown.drain().await;
    }
}
