//! Destinations for decoded records.
//!
//! The record path hands every decoded batch to a [`Sink`]. Sinks are owned by a
//! single task, so methods take `&mut self`; the boxed futures keep the trait
//! usable as `Box<dyn Sink>`.

pub mod console;
#[cfg(feature = "influxdb")]
pub mod influxdb;

use crate::record::MetricRecord;
use std::future::Future;
use std::io;
use std::pin::Pin;
use thiserror::Error;

pub use console::ConsoleSink;
#[cfg(feature = "influxdb")]
pub use influxdb::{InfluxDbConfig, InfluxDbSink};

/// Default number of points per InfluxDB write request.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Errors writing records to a sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[cfg(feature = "influxdb")]
    #[error("InfluxDB write failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("InfluxDB write rejected with HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Future returned by [`Sink`] methods.
pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;

/// A destination for decoded records.
pub trait Sink: Send {
    /// Accept a batch of records. Sinks may buffer them until [`Sink::flush`].
    fn record<'a>(&'a mut self, records: &'a [MetricRecord]) -> SinkFuture<'a>;

    /// Write out anything buffered.
    fn flush(&mut self) -> SinkFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    /// Flush and release the sink's resources.
    fn close(&mut self) -> SinkFuture<'_> {
        self.flush()
    }
}
