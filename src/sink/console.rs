//! Console sink: one formatted line per record.

use crate::output::OutputFormatter;
use crate::record::MetricRecord;
use crate::sink::{Sink, SinkError, SinkFuture};
use std::io::{self, Write};

/// Writes each record as a line to `out` (stdout by default).
pub struct ConsoleSink<W: Write + Send> {
    formatter: Box<dyn OutputFormatter>,
    out: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout(formatter: Box<dyn OutputFormatter>) -> Self {
        Self::new(formatter, io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(formatter: Box<dyn OutputFormatter>, out: W) -> Self {
        Self { formatter, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_records(&mut self, records: &[MetricRecord]) -> io::Result<()> {
        for record in records {
            writeln!(self.out, "{}", self.formatter.format(record))?;
        }
        Ok(())
    }
}

impl<W: Write + Send> Sink for ConsoleSink<W> {
    fn record<'a>(&'a mut self, records: &'a [MetricRecord]) -> SinkFuture<'a> {
        let result = self.write_records(records);
        Box::pin(async move { result.map_err(SinkError::from) })
    }

    fn flush(&mut self) -> SinkFuture<'_> {
        let result = self.out.flush();
        Box::pin(async move { result.map_err(SinkError::from) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::TextFormatter;
    use crate::output::influxdb::InfluxDbFormatter;
    use crate::record::MetricKind;
    use crate::test_utils::metric;

    #[tokio::test]
    async fn test_console_sink_writes_line_per_record() {
        let mut sink = ConsoleSink::new(Box::new(InfluxDbFormatter::new()), Vec::<u8>::new());
        let records = vec![
            metric(MetricKind::PowerOn, 1.0),
            metric(MetricKind::Load, 269.3),
        ];
        sink.record(&records).await.unwrap();
        sink.close().await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("PowerOn,DeviceId="));
        assert!(lines[1].starts_with("Load,DeviceId="));
        assert!(out.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_console_sink_empty_batch() {
        let mut sink = ConsoleSink::new(Box::new(TextFormatter), Vec::<u8>::new());
        sink.record(&[]).await.unwrap();
        assert!(sink.into_inner().is_empty());
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_console_sink_reports_write_errors() {
        let mut sink = ConsoleSink::new(Box::new(TextFormatter), BrokenPipe);
        let err = sink
            .record(&[metric(MetricKind::Battery, 100.0)])
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
