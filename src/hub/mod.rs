//! Broadcast relay for raw input lines.
//!
//! Every inbound line is replicated, undecoded, to all TCP subscribers that are
//! connected when it is published. Two queues bound memory:
//!
//! - the ingestion queue ([`DropOldestQueue`]) discards the oldest line when
//!   publishing falls behind the input;
//! - each subscriber's queue discards the newest line when that subscriber
//!   falls behind, without affecting anybody else.
//!
//! There is no framing, acknowledgement or backfill: a late subscriber starts
//! with the next published line.

mod broadcaster;
mod queue;
mod server;

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;

pub use broadcaster::{Broadcaster, DEFAULT_SUBSCRIBER_QUEUE, Line, SubscriberId, Subscription};
pub use queue::{DEFAULT_QUEUE_CAPACITY, DropOldestQueue};
pub use server::{Relay, RelayStats, deliver, run_relay};

/// Port subscribers connect to unless configured otherwise.
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Relay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    /// Capacity of the ingestion queue
    pub queue_capacity: usize,
    /// Capacity of each subscriber's queue
    pub subscriber_queue: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            subscriber_queue: DEFAULT_SUBSCRIBER_QUEUE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_listens_on_all_interfaces() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:5000");
        assert_eq!(config.queue_capacity, 500);
        assert_eq!(config.subscriber_queue, 64);
    }
}
