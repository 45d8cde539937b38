use std::future::Future;

use rollup_core::{extract::SampleExtractor, Collector};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt as _},
    pin, select,
};
use tracing::{debug, error, info, warn};

/// Reads newline-delimited JSON events from `reader` and feeds their samples to `collector`.
///
/// Lines that are not valid JSON, including lines that are not valid UTF-8, are logged and skipped. Reading stops at
/// the end of input, on a read error, or once `shutdown` completes.
///
/// Returns the number of events processed.
pub async fn ingest<R, F>(reader: R, extractor: &SampleExtractor, collector: &Collector, shutdown: F) -> u64
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    let mut segments = reader.split(b'\n');
    pin!(shutdown);

    let mut events = 0u64;
    loop {
        select! {
            biased;

            _ = &mut shutdown => {
                info!("Received interrupt. Shutting down...");
                break;
            },
            segment = segments.next_segment() => match segment {
                Ok(Some(line)) => {
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }

                    let event = match serde_json::from_slice::<serde_json::Value>(&line) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(error = %e, "Skipping malformed event.");
                            continue;
                        }
                    };

                    events += 1;
                    for sample in extractor.extract(&event) {
                        collector.handle(sample).await;
                    }
                }
                Ok(None) => {
                    debug!(events, "Reached end of input.");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read input.");
                    break;
                }
            },
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use std::{future::pending, sync::Arc, time::Duration};

    use rollup_core::{
        extract::ExtractorConfiguration,
        labels::Label,
        sender::{BlackholeSender, Sender},
        CollectorConfiguration,
    };

    use super::*;

    fn counting_extractor() -> SampleExtractor {
        let config: ExtractorConfiguration =
            serde_json::from_value(serde_json::json!({"metrics": [{"name": "events"}]})).unwrap();
        SampleExtractor::new(config).unwrap()
    }

    #[tokio::test]
    async fn skips_invalid_utf8_and_malformed_lines() {
        let config = CollectorConfiguration::new(Duration::from_secs(1), Duration::from_secs(60)).unwrap();
        let sender = Arc::new(BlackholeSender::default());
        let (collector, shutdown) = Collector::start(config, Arc::clone(&sender) as Arc<dyn Sender>);
        let extractor = counting_extractor();

        let input: &[u8] = b"{\"a\":1}\n\xff\xfe\n{\"a\":1}\nnot json\n\n{\"a\":1}";
        let events = ingest(input, &extractor, &collector, pending::<()>()).await;
        assert_eq!(events, 3);

        let state = collector.series_state(&[Label::new("__name__", "events")]).unwrap();
        assert_eq!(state.value, 3.0);

        assert_eq!(shutdown.drain().await, 1);
    }

    #[tokio::test]
    async fn stops_when_shutdown_completes() {
        let config = CollectorConfiguration::new(Duration::from_secs(1), Duration::from_secs(60)).unwrap();
        let (collector, shutdown) = Collector::start(config, Arc::new(BlackholeSender::default()));
        let extractor = counting_extractor();

        let events = ingest(b"{\"a\":1}\n".as_slice(), &extractor, &collector, async {}).await;
        assert_eq!(events, 0);

        shutdown.drain().await;
    }
}
