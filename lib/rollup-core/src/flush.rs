use std::{sync::Arc, time::Duration};

use tokio::{
    select,
    sync::oneshot,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info_span, Instrument as _};

use crate::{
    point::FinalizedPoint,
    sender::{forward, Sender},
    store::SeriesStore,
    telemetry::{EmitReason, Telemetry},
};

/// Periodically flushes and evicts stale series.
pub(crate) struct FlushScheduler {
    store: Arc<SeriesStore>,
    sender: Arc<dyn Sender>,
    telemetry: Telemetry,
    flush_interval: Duration,
    staleness_timeout: Duration,
}

impl FlushScheduler {
    pub fn new(
        store: Arc<SeriesStore>, sender: Arc<dyn Sender>, telemetry: Telemetry, flush_interval: Duration,
        staleness_timeout: Duration,
    ) -> Self {
        Self {
            store,
            sender,
            telemetry,
            flush_interval,
            staleness_timeout,
        }
    }

    /// Spawns the scheduler as a background task.
    ///
    /// The scheduler runs until [`SchedulerHandle::stop`] is called, or the handle is dropped.
    pub fn spawn(self) -> SchedulerHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(stop_rx).instrument(info_span!("flush_scheduler")));

        SchedulerHandle { stop_tx, task }
    }

    async fn run(self, mut stop_rx: oneshot::Receiver<()>) {
        // The first tick of a plain `interval` fires immediately, which would scan a store that can't have gone stale
        // yet, so start one period out instead.
        let mut ticker = interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            flush_interval = ?self.flush_interval,
            staleness_timeout = ?self.staleness_timeout,
            "Flush scheduler started."
        );

        loop {
            select! {
                biased;

                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    self.flush_stale(Instant::now()).await;
                }
            }
        }

        debug!("Flush scheduler stopped.");
    }

    /// Evicts every series that is stale as of `now` and sends them as a single batch.
    ///
    /// Evicted series are gone even if the batch fails to send.
    pub async fn flush_stale(&self, now: Instant) -> usize {
        let evicted = self.store.evict_stale(now, self.staleness_timeout);
        if evicted.is_empty() {
            return 0;
        }

        let evicted_len = evicted.len();
        self.telemetry.series_removed(evicted_len);
        debug!(evicted_len, "Evicted stale series.");

        let points = evicted
            .into_iter()
            .map(|(key, state)| FinalizedPoint::new(key.labels(), state.value, state.timestamp_ns))
            .collect();
        forward(self.sender.as_ref(), points, EmitReason::Stale, &self.telemetry).await;

        evicted_len
    }
}

/// Handle to a running [`FlushScheduler`].
pub(crate) struct SchedulerHandle {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops the scheduler and waits for it to exit.
    ///
    /// A flush that is already in progress, including its send, is allowed to finish first.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "Flush scheduler task failed.");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::GenericError,
        labels::{Label, SeriesKey},
        store::SeriesState,
    };

    #[derive(Default)]
    struct RecordingSender {
        batches: Mutex<Vec<Vec<FinalizedPoint>>>,
    }

    impl RecordingSender {
        fn batches(&self) -> Vec<Vec<FinalizedPoint>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sender for RecordingSender {
        async fn send(&self, points: Vec<FinalizedPoint>) -> Result<(), GenericError> {
            self.batches.lock().unwrap().push(points);
            Ok(())
        }
    }

    const FLUSH_INTERVAL: Duration = Duration::from_secs(1);
    const STALENESS_TIMEOUT: Duration = Duration::from_secs(5);

    fn scheduler(store: &Arc<SeriesStore>, sender: &Arc<RecordingSender>) -> FlushScheduler {
        FlushScheduler::new(
            Arc::clone(store),
            Arc::clone(sender) as Arc<dyn Sender>,
            Telemetry::noop(),
            FLUSH_INTERVAL,
            STALENESS_TIMEOUT,
        )
    }

    fn labels(pod: &str) -> Vec<Label> {
        vec![Label::new("pod", pod)]
    }

    #[tokio::test(start_paused = true)]
    async fn flush_stale_batches_only_stale_series() {
        let store = Arc::new(SeriesStore::new());
        let sender = Arc::new(RecordingSender::default());
        let scheduler = scheduler(&store, &sender);

        store.set(SeriesKey::from_labels(&labels("a")), SeriesState::new(3.0, 7, Instant::now()));
        store.set(SeriesKey::from_labels(&labels("b")), SeriesState::new(4.0, 8, Instant::now()));
        tokio::time::advance(Duration::from_secs(3)).await;
        store.set(SeriesKey::from_labels(&labels("c")), SeriesState::new(5.0, 9, Instant::now()));
        tokio::time::advance(Duration::from_secs(3)).await;

        assert_eq!(scheduler.flush_stale(Instant::now()).await, 2);

        let batches = sender.batches();
        assert_eq!(batches.len(), 1);
        let mut batch = batches[0].clone();
        batch.sort_by(|a, b| a.labels().cmp(b.labels()));
        assert_eq!(
            batch,
            vec![FinalizedPoint::new(labels("a"), 3.0, 7), FinalizedPoint::new(labels("b"), 4.0, 8)]
        );
        assert_eq!(store.len(), 1);

        // Nothing else is stale yet, so nothing is sent.
        assert_eq!(scheduler.flush_stale(Instant::now()).await, 0);
        assert_eq!(sender.batches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_evict_once_and_stop_releases_the_task() {
        let store = Arc::new(SeriesStore::new());
        let sender = Arc::new(RecordingSender::default());
        let handle = scheduler(&store, &sender).spawn();

        store.set(SeriesKey::from_labels(&labels("a")), SeriesState::new(1.0, 1, Instant::now()));

        // Past the staleness timeout plus one tick, the series has been evicted by a tick.
        tokio::time::sleep(STALENESS_TIMEOUT + FLUSH_INTERVAL * 2).await;
        assert!(store.is_empty());
        assert_eq!(sender.batches().len(), 1);

        // Later ticks have nothing left to emit.
        tokio::time::sleep(FLUSH_INTERVAL * 10).await;
        assert_eq!(sender.batches().len(), 1);

        handle.stop().await;

        // Once stopped, nothing is evicted any more, however stale.
        store.set(SeriesKey::from_labels(&labels("b")), SeriesState::new(1.0, 1, Instant::now()));
        tokio::time::sleep(STALENESS_TIMEOUT * 4).await;
        assert_eq!(store.len(), 1);
        assert_eq!(sender.batches().len(), 1);
    }
}
