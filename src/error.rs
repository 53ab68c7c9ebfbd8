//! Error types for the library.

use thiserror::Error;

use crate::proxy::ProxyError;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for server operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The listener has been closed.
    #[error("use of closed listener")]
    ListenerClosed,

    /// Invalid listener configuration, reported at bind time.
    #[error("invalid listener config: {0}")]
    Config(&'static str),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected end of packet while decoding.
    #[error("unexpected end of packet")]
    UnexpectedEof,

    /// PROXY protocol header failed to decode.
    #[error("proxy protocol: {0}")]
    Proxy(#[from] ProxyError),
}
