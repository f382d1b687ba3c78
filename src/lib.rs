//! `switchbot-listener` library.
//!
//! Decodes SwitchBot BLE advertisements from a line-delimited scan stream and
//! relays the raw stream to TCP subscribers.
//!
//! The binary (`src/main.rs`) is responsible for logging setup, signals and
//! process exit codes. The subcommands live in [`crate::app`] where they can be
//! driven deterministically with an injected line source.

pub mod app;
pub mod device;
pub mod directory;
pub mod duration;
pub mod envelope;
pub mod extract;
pub mod hub;
pub mod mac_address;
pub mod output;
pub mod record;
pub mod recorder;
pub mod sink;
pub mod source;
#[cfg(feature = "switchbot")]
pub mod switchbot;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use device::DeviceClass;
pub use directory::{DeviceDirectory, DirectoryError};
pub use duration::parse_duration;
pub use envelope::{AdStructure, EnvelopeError, parse_signal};
pub use extract::{DecodeError, ExtractError, ExtractResult, extract};
pub use hub::{Broadcaster, DropOldestQueue, RelayConfig, run_relay};
pub use mac_address::MacAddress;
pub use output::OutputFormatter;
pub use output::influxdb::InfluxDbFormatter;
pub use record::{MetricKind, MetricRecord};
pub use recorder::{RecordStats, Recorder, run_record};
pub use sink::{Sink, SinkError};
