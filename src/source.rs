//! Line sources feeding both the relay and the record path.
//!
//! A [`LineSource`] opens a channel of raw lines. Reading stdin is a blocking
//! call with no cancellation support of its own, so it runs on a dedicated
//! thread; [`next_line`] races that channel against the shutdown token and
//! simply abandons the pending read when shutdown wins.
//!
//! Input is split on `\n` as raw bytes. A line that is not valid UTF-8 is
//! passed on with replacement characters, so it still reaches subscribers and
//! fails envelope parsing like any other bad line instead of ending the input.

use std::borrow::Cow;
use std::future::Future;
use std::io::{self, BufRead};
use std::net::SocketAddr;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Lines read ahead of the consumer. Kept small so backpressure (and the
/// drop-oldest policy of the relay) applies downstream, not here.
pub const LINE_CHANNEL_BUFFER_SIZE: usize = 16;

/// Errors opening a line source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to start reader thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Receiving end of an open source. Closed at end of input.
pub type LineReceiver = mpsc::Receiver<io::Result<String>>;

/// A stream of newline-delimited input.
pub trait LineSource: Send + Sync {
    fn open(&self) -> Pin<Box<dyn Future<Output = Result<LineReceiver, SourceError>> + Send + '_>>;
}

/// Reads standard input on a background thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinSource;

impl LineSource for StdinSource {
    fn open(&self) -> Pin<Box<dyn Future<Output = Result<LineReceiver, SourceError>> + Send + '_>> {
        Box::pin(async { spawn_blocking_reader(io::BufReader::new(io::stdin())) })
    }
}

/// Move a blocking reader onto its own thread and expose its lines as a channel.
///
/// The thread exits at end of input, on an I/O error, or once the receiver is
/// dropped and its next line has nowhere to go.
pub fn spawn_blocking_reader<R>(mut reader: R) -> Result<LineReceiver, SourceError>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_CHANNEL_BUFFER_SIZE);
    std::thread::Builder::new()
        .name("line-reader".into())
        .spawn(move || {
            let mut buf = Vec::new();
            loop {
                buf.clear();
                let line = match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => Ok(decode_line(&buf)),
                    Err(e) => Err(e),
                };
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })
        .map_err(SourceError::Spawn)?;
    Ok(rx)
}

/// Forward the lines of an async reader into `tx` until end of input.
async fn forward_lines<R>(mut reader: R, tx: mpsc::Sender<io::Result<String>>)
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let line = match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => Ok(decode_line(&buf)),
            Err(e) => Err(e),
        };
        let failed = line.is_err();
        if tx.send(line).await.is_err() || failed {
            break;
        }
    }
}

/// Strip the line terminator (`\n` or `\r\n`) and decode as UTF-8, replacing
/// invalid sequences.
fn decode_line(buf: &[u8]) -> String {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    match String::from_utf8_lossy(line) {
        Cow::Borrowed(line) => line.to_owned(),
        Cow::Owned(line) => {
            tracing::debug!(len = buf.len(), "input line is not valid UTF-8");
            line
        }
    }
}

/// Reads lines from a TCP peer, e.g. a relay started with `relay`.
#[derive(Debug, Clone, Copy)]
pub struct TcpSource {
    pub addr: SocketAddr,
}

impl LineSource for TcpSource {
    fn open(&self) -> Pin<Box<dyn Future<Output = Result<LineReceiver, SourceError>> + Send + '_>> {
        Box::pin(async move {
            let stream = TcpStream::connect(self.addr)
                .await
                .map_err(|source| SourceError::Connect {
                    addr: self.addr,
                    source,
                })?;
            tracing::info!(addr = %self.addr, "connected to line source");

            let (tx, rx) = mpsc::channel(LINE_CHANNEL_BUFFER_SIZE);
            tokio::spawn(forward_lines(BufReader::new(stream), tx));
            Ok(rx)
        })
    }
}

/// Wait for the next line, giving up as soon as `cancel` fires.
///
/// Returns `Ok(None)` at end of input or on cancellation. A read that completes
/// after cancellation stays in the channel and is never looked at.
pub async fn next_line(
    lines: &mut LineReceiver,
    cancel: &CancellationToken,
) -> io::Result<Option<String>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        line = lines.recv() => line.transpose(),
    }
}
