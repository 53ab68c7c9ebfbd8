//! # rakgate
//!
//! Connection establishment for RakNet servers: the offline handshake
//! that precedes any reliable session, and the HAProxy PROXY protocol
//! decoder used behind a front-tier load balancer.
//!
//! The offline phase covers unconnected ping/pong and the two-phase
//! `OPEN_CONNECTION_REQUEST` exchange, including MTU negotiation,
//! anti-spoofing cookies and protocol version gating. Completed
//! handshakes are handed to a [`ServerHandler`], which owns whatever
//! session type the reliable layer uses.
//!
//! ## Example
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use rakgate::{Listener, ListenConfig, ServerHandler};
//!
//! struct Sessions;
//!
//! impl ServerHandler for Sessions {
//!     type Session = SocketAddr;
//!
//!     fn create_child_session(
//!         &self,
//!         client_addr: SocketAddr,
//!         _client_guid: u64,
//!         _protocol_version: u8,
//!         _mtu: u16,
//!     ) -> Option<SocketAddr> {
//!         Some(client_addr)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ListenConfig {
//!         advertisement: Some(b"MCPE;demo;0;0;0;10".to_vec()),
//!         ..Default::default()
//!     };
//!     let listener = Listener::bind_with("0.0.0.0:19132", config, Sessions).await?;
//!
//!     loop {
//!         let session = listener.accept().await?;
//!         println!("established session for {session}");
//!     }
//! }
//! ```

pub mod binary;
pub mod classifier;
pub mod config;
pub mod error;
pub mod handler;
pub mod listener;
pub mod message;
pub mod metrics;
pub mod pending;
pub mod proxy;

// Re-exports
pub use config::ListenConfig;
pub use error::{Error, Result};
pub use handler::{Inbound, OfflineHandler, RakPing, ServerHandler};
pub use listener::Listener;
pub use message::{Priority, RakMessage, Reliability};
pub use metrics::ServerMetrics;

/// Minimum MTU size allowed.
pub const MIN_MTU_SIZE: u16 = 400;

/// Maximum MTU size allowed.
pub const MAX_MTU_SIZE: u16 = 1492;

/// Size of an IPv4 header, included in the negotiated MTU.
pub const IPV4_HEADER_SIZE: usize = 20;

/// Size of an IPv6 header, included in the negotiated MTU.
pub const IPV6_HEADER_SIZE: usize = 40;

/// Size of a UDP header, included in the negotiated MTU.
pub const UDP_HEADER_SIZE: usize = 8;
