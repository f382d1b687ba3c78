//! Core application runner for `switchbot-listener`.
//!
//! This module is decoupled from process setup (logging, signals, exit codes)
//! so every subcommand can be driven from tests with an injected line source.

use crate::directory::{DeviceDirectory, DirectoryError};
use crate::duration::parse_duration;
use crate::hub::{
    DEFAULT_PORT, DEFAULT_QUEUE_CAPACITY, DEFAULT_SUBSCRIBER_QUEUE, HubError, Relay, RelayConfig,
    RelayStats, run_relay,
};
use crate::output::TextFormatter;
use crate::output::influxdb::InfluxDbFormatter;
use crate::recorder::{RecordStats, Recorder, run_record};
use crate::sink::{ConsoleSink, DEFAULT_BATCH_SIZE, Sink};
use crate::source::{
    LineReceiver, LineSource, SourceError, StdinSource, TcpSource, next_line,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Verbose output, log undecodable advertisements
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Relay raw scan lines to TCP subscribers
    Relay {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        relay: RelayArgs,
    },
    /// Decode scan lines and write metric records
    Record {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        record: RecordArgs,
    },
    /// Relay and decode the same input
    Serve {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        relay: RelayArgs,
        #[command(flatten)]
        record: RecordArgs,
    },
}

impl Command {
    pub fn input(&self) -> &InputArgs {
        match self {
            Command::Relay { input, .. }
            | Command::Record { input, .. }
            | Command::Serve { input, .. } => input,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Read scan lines from a relay at ADDR instead of stdin
    #[arg(long, value_name = "ADDR")]
    pub connect: Option<SocketAddr>,
}

#[derive(Args, Debug, Clone)]
pub struct RelayArgs {
    /// Address to accept subscribers on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Port to accept subscribers on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Lines held while publishing falls behind. The oldest are dropped first.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Lines held per subscriber. A subscriber that falls behind misses new lines.
    #[arg(long, default_value_t = DEFAULT_SUBSCRIBER_QUEUE)]
    pub subscriber_queue: usize,
}

impl RelayArgs {
    pub fn config(&self) -> RelayConfig {
        RelayConfig {
            bind_addr: SocketAddr::new(self.bind, self.port),
            queue_capacity: self.queue_capacity,
            subscriber_queue: self.subscriber_queue,
        }
    }
}

/// Where decoded records are written.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputKind {
    /// InfluxDB line protocol on stdout (Telegraf execd)
    #[default]
    Line,
    /// Human-readable lines on stdout
    Text,
    /// InfluxDB v2 HTTP write API
    Influxdb,
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// JSON file mapping device addresses to SwitchBot device types.
    /// Without it the device list is fetched from the SwitchBot API.
    #[arg(long, value_name = "FILE")]
    pub devices: Option<PathBuf>,

    #[arg(long, env = "SWITCHBOT_TOKEN", hide_env_values = true)]
    pub switchbot_token: Option<String>,

    #[arg(long, env = "SWITCHBOT_SECRET", hide_env_values = true)]
    pub switchbot_secret: Option<String>,

    #[arg(long, default_value_t, value_enum)]
    pub output: OutputKind,

    #[arg(long, env = "INFLUXDB_URL")]
    pub influxdb_url: Option<String>,

    #[arg(long, env = "INFLUXDB_TOKEN", hide_env_values = true)]
    pub influxdb_token: Option<String>,

    #[arg(long, env = "INFLUXDB_ORG")]
    pub influxdb_org: Option<String>,

    #[arg(long, env = "INFLUXDB_BUCKET")]
    pub influxdb_bucket: Option<String>,

    /// Points per InfluxDB write request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub influxdb_batch_size: usize,

    /// Flush buffered records at least this often.
    /// Accepts duration with suffix: 10s, 1m, 500ms.
    #[arg(long, value_parser = parse_duration, default_value = "10s")]
    pub flush_interval: Duration,

    /// Decode the structures of each scan event concurrently
    #[arg(long)]
    pub parallel_decode: bool,
}

/// Errors that stop the application.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Hub(#[from] HubError),
    #[error("no device directory: pass --devices or set SWITCHBOT_TOKEN and SWITCHBOT_SECRET")]
    NoDirectory,
    #[error("InfluxDB output requires {0}")]
    MissingInfluxDb(&'static str),
    #[error("{0} support is not compiled in")]
    Disabled(&'static str),
}

/// The line source selected by `--connect`.
pub fn line_source(input: &InputArgs) -> Box<dyn LineSource> {
    match input.connect {
        Some(addr) => Box::new(TcpSource { addr }),
        None => Box::new(StdinSource),
    }
}

/// Populate the device directory from `--devices` or the SwitchBot API.
pub async fn load_directory(args: &RecordArgs) -> Result<DeviceDirectory, RunError> {
    if let Some(path) = &args.devices {
        let directory = DeviceDirectory::load(path)?;
        tracing::info!(path = %path.display(), devices = directory.len(), "loaded device file");
        return Ok(directory);
    }
    match (&args.switchbot_token, &args.switchbot_secret) {
        (Some(token), Some(secret)) => fetch_switchbot_directory(token, secret).await,
        _ => Err(RunError::NoDirectory),
    }
}

#[cfg(feature = "switchbot")]
async fn fetch_switchbot_directory(token: &str, secret: &str) -> Result<DeviceDirectory, RunError> {
    use crate::switchbot::{Credentials, DEVICES_URL, fetch_directory};

    let credentials = Credentials {
        token: token.to_string(),
        secret: secret.to_string(),
    };
    Ok(fetch_directory(&credentials, DEVICES_URL).await?)
}

#[cfg(not(feature = "switchbot"))]
async fn fetch_switchbot_directory(_token: &str, _secret: &str) -> Result<DeviceDirectory, RunError> {
    Err(RunError::Disabled("SwitchBot API"))
}

/// Build the sink selected by `--output`.
pub fn build_sink(args: &RecordArgs) -> Result<Box<dyn Sink>, RunError> {
    match args.output {
        OutputKind::Line => Ok(Box::new(ConsoleSink::stdout(Box::new(
            InfluxDbFormatter::new(),
        )))),
        OutputKind::Text => Ok(Box::new(ConsoleSink::stdout(Box::new(TextFormatter)))),
        OutputKind::Influxdb => influxdb_sink(args),
    }
}

#[cfg(feature = "influxdb")]
fn influxdb_sink(args: &RecordArgs) -> Result<Box<dyn Sink>, RunError> {
    use crate::sink::{InfluxDbConfig, InfluxDbSink};

    fn required(value: &Option<String>, name: &'static str) -> Result<String, RunError> {
        value.clone().ok_or(RunError::MissingInfluxDb(name))
    }

    let config = InfluxDbConfig {
        url: required(&args.influxdb_url, "--influxdb-url")?,
        token: required(&args.influxdb_token, "--influxdb-token")?,
        org: required(&args.influxdb_org, "--influxdb-org")?,
        bucket: required(&args.influxdb_bucket, "--influxdb-bucket")?,
        batch_size: args.influxdb_batch_size,
    };
    tracing::info!(url = %config.url, bucket = %config.bucket, "writing to InfluxDB");
    Ok(Box::new(InfluxDbSink::new(config)))
}

#[cfg(not(feature = "influxdb"))]
fn influxdb_sink(_args: &RecordArgs) -> Result<Box<dyn Sink>, RunError> {
    Err(RunError::Disabled("InfluxDB"))
}

async fn build_recorder(args: &RecordArgs, verbose: bool) -> Result<Recorder, RunError> {
    let directory = Arc::new(load_directory(args).await?);
    let sink = build_sink(args)?;
    Ok(Recorder::new(directory, sink)
        .parallel_decode(args.parallel_decode)
        .verbose(verbose))
}

/// Relay every line and decode it too.
///
/// The decode path gets its own bounded channel so a slow sink never holds up
/// relaying. Lines that do not fit are relayed but not decoded.
pub async fn run_serve(
    config: &RelayConfig,
    recorder: Recorder,
    lines: &mut LineReceiver,
    flush_interval: Duration,
    cancel: &CancellationToken,
) -> Result<(RelayStats, RecordStats), HubError> {
    let relay = Relay::start(config, cancel).await?;

    let (record_tx, mut record_rx) = mpsc::channel(config.queue_capacity.max(1));
    let recording = {
        let cancel = cancel.clone();
        tokio::spawn(async move { run_record(recorder, &mut record_rx, flush_interval, &cancel).await })
    };

    let mut undecoded: u64 = 0;
    loop {
        match next_line(lines, cancel).await {
            Ok(Some(line)) => {
                relay.push(line.as_str());
                if record_tx.try_send(Ok(line)).is_err() {
                    undecoded += 1;
                    tracing::debug!(undecoded, "decoder falling behind, line not decoded");
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "failed to read input");
                break;
            }
        }
    }
    drop(record_tx);

    let relay_stats = relay.shutdown().await;
    let record_stats = match recording.await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!(error = %e, "recorder task failed");
            RecordStats::default()
        }
    };
    if undecoded > 0 {
        tracing::warn!(undecoded, "lines relayed without decoding");
    }
    Ok((relay_stats, record_stats))
}

/// Run `options.command` reading from `source` until end of input or `cancel`.
pub async fn run_with_source(
    options: Options,
    source: &dyn LineSource,
    cancel: &CancellationToken,
) -> Result<(), RunError> {
    match options.command {
        Command::Relay { relay, .. } => {
            let mut lines = source.open().await?;
            run_relay(&relay.config(), &mut lines, cancel).await?;
        }
        Command::Record { record, .. } => {
            let recorder = build_recorder(&record, options.verbose).await?;
            let mut lines = source.open().await?;
            run_record(recorder, &mut lines, record.flush_interval, cancel).await;
        }
        Command::Serve { relay, record, .. } => {
            let recorder = build_recorder(&record, options.verbose).await?;
            let mut lines = source.open().await?;
            run_serve(
                &relay.config(),
                recorder,
                &mut lines,
                record.flush_interval,
                cancel,
            )
            .await?;
        }
    }
    Ok(())
}

/// Run `options.command` against stdin or the `--connect` relay.
pub async fn run(options: Options, cancel: CancellationToken) -> Result<(), RunError> {
    let source = line_source(options.command.input());
    run_with_source(options, source.as_ref(), &cancel).await
}
