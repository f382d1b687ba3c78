//! InfluxDB v2 sink: batches line protocol and writes it over HTTP.

use crate::output::OutputFormatter;
use crate::output::influxdb::InfluxDbFormatter;
use crate::record::MetricRecord;
use crate::sink::{Sink, SinkError, SinkFuture};
use std::mem;

/// Connection settings for an InfluxDB v2 bucket.
#[derive(Clone)]
pub struct InfluxDbConfig {
    /// Base URL, e.g. `http://localhost:8086`
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// Buffered points that trigger a write
    pub batch_size: usize,
}

impl std::fmt::Debug for InfluxDbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxDbConfig")
            .field("url", &self.url)
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

/// Buffers records as line protocol and writes them in batches.
///
/// A batch that fails to write is dropped; the error is returned to the caller
/// and later batches are unaffected.
pub struct InfluxDbSink {
    client: reqwest::Client,
    config: InfluxDbConfig,
    formatter: InfluxDbFormatter,
    buffer: Vec<String>,
}

impl InfluxDbSink {
    pub fn new(config: InfluxDbConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            buffer: Vec::with_capacity(config.batch_size),
            config,
            formatter: InfluxDbFormatter::new(),
        }
    }

    /// Points waiting for the next write.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn write_url(&self) -> String {
        format!("{}/api/v2/write", self.config.url.trim_end_matches('/'))
    }

    async fn write_batch(&mut self) -> Result<(), SinkError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let lines = mem::take(&mut self.buffer);
        let points = lines.len();
        let body = lines.join("\n");

        let response = self
            .client
            .post(self.write_url())
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header("Authorization", format!("Token {}", self.config.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(points, bucket = %self.config.bucket, "wrote batch to InfluxDB");
        Ok(())
    }
}

impl Sink for InfluxDbSink {
    fn record<'a>(&'a mut self, records: &'a [MetricRecord]) -> SinkFuture<'a> {
        Box::pin(async move {
            for record in records {
                self.buffer.push(self.formatter.format(record));
            }
            if self.buffer.len() >= self.config.batch_size.max(1) {
                self.write_batch().await?;
            }
            Ok(())
        })
    }

    fn flush(&mut self) -> SinkFuture<'_> {
        Box::pin(self.write_batch())
    }
}
