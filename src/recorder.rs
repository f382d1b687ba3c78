//! The decode path: envelope lines in, metric records out to a sink.

use crate::device::DeviceClass;
use crate::directory::DeviceDirectory;
use crate::envelope::{AdStructure, parse_signal};
use crate::extract::{ExtractError, ExtractResult, extract};
use crate::sink::Sink;
use crate::source::{LineReceiver, next_line};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default interval between periodic sink flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Counters for one run of the decode path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecordStats {
    pub lines: u64,
    pub records: u64,
    pub envelope_errors: u64,
    pub decode_errors: u64,
    pub unimplemented: u64,
    pub sink_errors: u64,
}

/// Decodes envelope lines and hands the records to a sink.
///
/// Every failure is counted and logged; none of them stops the recorder.
pub struct Recorder {
    directory: Arc<DeviceDirectory>,
    sink: Box<dyn Sink>,
    parallel_decode: bool,
    verbose: bool,
    stats: RecordStats,
}

impl Recorder {
    pub fn new(directory: Arc<DeviceDirectory>, sink: Box<dyn Sink>) -> Self {
        Self {
            directory,
            sink,
            parallel_decode: false,
            verbose: false,
            stats: RecordStats::default(),
        }
    }

    /// Extract the structures of one envelope concurrently.
    pub fn parallel_decode(mut self, enabled: bool) -> Self {
        self.parallel_decode = enabled;
        self
    }

    /// Log decode errors at `warn` instead of `debug`.
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    pub fn stats(&self) -> RecordStats {
        self.stats
    }

    /// Decode one envelope line and record the result.
    pub async fn handle_line(&mut self, line: &str) {
        self.stats.lines += 1;

        let structures = match parse_signal(line) {
            Ok(structures) => structures,
            Err(e) => {
                self.stats.envelope_errors += 1;
                tracing::warn!(error = %e, "skipping line");
                return;
            }
        };
        let Some(first) = structures.first() else {
            return;
        };
        let class = self.directory.resolve(&first.device_address);

        let results = if self.parallel_decode && structures.len() > 1 {
            extract_concurrently(&class, structures).await
        } else {
            structures
                .iter()
                .map(|structure| extract(structure, &class))
                .collect()
        };

        let mut records = Vec::new();
        for result in results {
            match result {
                Ok(decoded) => records.extend(decoded),
                Err(e @ ExtractError::Unimplemented { .. }) => {
                    self.stats.unimplemented += 1;
                    tracing::warn!(error = %e, "no decoder for device");
                }
                Err(e @ ExtractError::Decode { .. }) => {
                    self.stats.decode_errors += 1;
                    if self.verbose {
                        tracing::warn!(error = %e, "skipping structure");
                    } else {
                        tracing::debug!(error = %e, "skipping structure");
                    }
                }
            }
        }

        if records.is_empty() {
            return;
        }
        self.stats.records += records.len() as u64;
        if let Err(e) = self.sink.record(&records).await {
            self.stats.sink_errors += 1;
            tracing::error!(error = %e, records = records.len(), "failed to write records");
        }
    }

    /// Write out whatever the sink has buffered.
    pub async fn flush(&mut self) {
        if let Err(e) = self.sink.flush().await {
            self.stats.sink_errors += 1;
            tracing::error!(error = %e, "failed to flush sink");
        }
    }

    /// Close the sink and report the totals.
    pub async fn finish(mut self) -> RecordStats {
        if let Err(e) = self.sink.close().await {
            self.stats.sink_errors += 1;
            tracing::error!(error = %e, "failed to close sink");
        }
        let stats = self.stats;
        tracing::info!(
            lines = stats.lines,
            records = stats.records,
            envelope_errors = stats.envelope_errors,
            decode_errors = stats.decode_errors,
            unimplemented = stats.unimplemented,
            sink_errors = stats.sink_errors,
            "recorder stopped"
        );
        stats
    }
}

/// Run one extraction task per structure and return the results in
/// structure order.
async fn extract_concurrently(class: &DeviceClass, structures: Vec<AdStructure>) -> Vec<ExtractResult> {
    let mut tasks = JoinSet::new();
    for (index, structure) in structures.into_iter().enumerate() {
        let class = class.clone();
        tasks.spawn(async move { (index, extract(&structure, &class)) });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!(error = %e, "extraction task failed"),
        }
    }
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

/// Feed every line of `lines` through `recorder` until end of input or
/// cancellation, flushing the sink every `flush_interval`.
pub async fn run_record(
    mut recorder: Recorder,
    lines: &mut LineReceiver,
    flush_interval: Duration,
    cancel: &CancellationToken,
) -> RecordStats {
    let period = flush_interval.max(MIN_FLUSH_INTERVAL);
    let mut flush = tokio::time::interval_at(Instant::now() + period, period);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            line = next_line(lines, cancel) => match line {
                Ok(Some(line)) => recorder.handle_line(&line).await,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "failed to read input");
                    break;
                }
            },
            _ = flush.tick() => recorder.flush().await,
        }
    }

    recorder.finish().await
}
