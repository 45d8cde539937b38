//! Delivery of finalized points to the downstream store.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt as _},
    sync::Mutex,
};
use tracing::{debug, error};

use crate::{
    error::GenericError,
    point::FinalizedPoint,
    telemetry::{EmitReason, Telemetry},
};

/// Delivers batches of finalized points downstream.
///
/// The collector makes a single delivery attempt per batch and never retries: a failed batch is logged and dropped.
/// Implementations that need stronger guarantees must provide them themselves. The collector never calls `send` while
/// holding any lock on its series state, so slow deliveries only delay the caller.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Sends a batch of points.
    ///
    /// # Errors
    ///
    /// If the batch could not be delivered, an error is returned.
    async fn send(&self, points: Vec<FinalizedPoint>) -> Result<(), GenericError>;
}

/// Sends a batch through `sender`, logging and recording a failure instead of returning it.
///
/// Empty batches are not sent.
pub(crate) async fn forward(
    sender: &dyn Sender, points: Vec<FinalizedPoint>, reason: EmitReason, telemetry: &Telemetry,
) {
    if points.is_empty() {
        return;
    }

    let points_len = points.len();
    telemetry.points_emitted(reason, points_len);

    match sender.send(points).await {
        Ok(()) => debug!(points_len, reason = reason.as_str(), "Sent points."),
        Err(e) => {
            telemetry.send_failed(points_len);
            error!(error = %e, points_len, reason = reason.as_str(), "Failed to send points. Dropping them.");
        }
    }
}

/// A sender that discards everything it is given.
///
/// Useful for testing and benchmarking ingestion without a downstream store.
#[derive(Default)]
pub struct BlackholeSender {
    batches: AtomicU64,
    points: AtomicU64,
}

impl BlackholeSender {
    /// Returns the number of points received so far.
    pub fn points_received(&self) -> u64 {
        self.points.load(Relaxed)
    }
}

#[async_trait]
impl Sender for BlackholeSender {
    async fn send(&self, points: Vec<FinalizedPoint>) -> Result<(), GenericError> {
        let batches = self.batches.fetch_add(1, Relaxed) + 1;
        let total_points = self.points.fetch_add(points.len() as u64, Relaxed) + points.len() as u64;
        debug!(batches, total_points, "Discarded batch.");
        Ok(())
    }
}

/// A sender that writes each point as a line of JSON.
///
/// Points are written in the shape produced by serializing [`FinalizedPoint`], and the writer is flushed after every
/// batch.
pub struct JsonLinesSender<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesSender<W> {
    /// Creates a new `JsonLinesSender` writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sender, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Sender for JsonLinesSender<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn send(&self, points: Vec<FinalizedPoint>) -> Result<(), GenericError> {
        let mut buf = Vec::with_capacity(points.len() * 128);
        for point in &points {
            serde_json::to_writer(&mut buf, point).context("Failed to serialize point.")?;
            buf.push(b'\n');
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(&buf).await.context("Failed to write points.")?;
        writer.flush().await.context("Failed to flush points.")?;
        Ok(())
    }
}
