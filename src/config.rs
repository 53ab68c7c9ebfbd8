//! Listener configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::message::{MAGIC_LEN, UNCONNECTED_MESSAGE_SEQUENCE};
use crate::metrics::ServerMetrics;
use crate::{MAX_MTU_SIZE, MIN_MTU_SIZE};

/// Configuration for a RakNet listener.
///
/// Immutable once the listener is bound; validation happens at bind time
/// so misconfiguration never surfaces on the datagram path.
#[derive(Clone)]
pub struct ListenConfig {
    /// Magic sequence discriminating offline RakNet traffic.
    pub magic: [u8; MAGIC_LEN],

    /// Server GUID echoed in every reply. Drawn at random when unset.
    pub guid: Option<u64>,

    /// Advertisement returned in unconnected pongs. When unset the pong
    /// omits the trailing length-prefixed block.
    pub advertisement: Option<Vec<u8>>,

    /// Forward unconnected pings to the handler instead of answering them.
    pub handle_ping: bool,

    /// Protocol versions accepted in OPEN_CONNECTION_REQUEST_1. When unset
    /// every version is accepted.
    pub supported_protocols: Option<Vec<u8>>,

    /// Lower bound of MTU negotiation.
    pub min_mtu: u16,

    /// Upper bound of MTU negotiation.
    pub max_mtu: u16,

    /// Send a random cookie in OPEN_CONNECTION_REPLY_1 and require it to
    /// be echoed in request 2.
    pub send_cookie: bool,

    /// Expect a PROXY protocol header (v1 or v2) at the start of incoming
    /// datagrams and take the client address from it.
    pub proxy_protocol: bool,

    /// Duration to block addresses whose datagrams fail handling. Zero
    /// disables blocking.
    pub block_duration: Duration,

    /// Optional sink for offline-phase events.
    pub metrics: Option<Arc<dyn ServerMetrics>>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            magic: UNCONNECTED_MESSAGE_SEQUENCE,
            guid: None,
            advertisement: None,
            handle_ping: false,
            supported_protocols: None,
            min_mtu: MIN_MTU_SIZE,
            max_mtu: MAX_MTU_SIZE,
            send_cookie: true,
            proxy_protocol: false,
            block_duration: Duration::from_secs(10),
            metrics: None,
        }
    }
}

impl ListenConfig {
    /// Checks the configuration for contradictions.
    pub fn validate(&self) -> Result<()> {
        if self.min_mtu > self.max_mtu {
            return Err(Error::Config("min_mtu is larger than max_mtu"));
        }
        // Room for the IP and UDP headers the negotiated value includes
        if self.min_mtu < 48 {
            return Err(Error::Config("min_mtu is too small to carry headers"));
        }
        if let Some(advertisement) = &self.advertisement {
            if advertisement.len() > u16::MAX as usize {
                return Err(Error::Config("advertisement does not fit a pong"));
            }
        }
        if let Some(protocols) = &self.supported_protocols {
            if protocols.is_empty() {
                return Err(Error::Config("supported_protocols is empty"));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ListenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenConfig")
            .field("magic", &self.magic)
            .field("guid", &self.guid)
            .field("advertisement", &self.advertisement)
            .field("handle_ping", &self.handle_ping)
            .field("supported_protocols", &self.supported_protocols)
            .field("min_mtu", &self.min_mtu)
            .field("max_mtu", &self.max_mtu)
            .field("send_cookie", &self.send_cookie)
            .field("proxy_protocol", &self.proxy_protocol)
            .field("block_duration", &self.block_duration)
            .field("metrics", &self.metrics.as_ref().map(|_| ".."))
            .finish()
    }
}
