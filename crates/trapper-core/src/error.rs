//! Error taxonomy for the telemetry pipeline.
//!
//! Sampling and counting are total functions and never fail. Everything that
//! can fail does so either while building the pipeline (configuration) or
//! during one send cycle (transport, response decoding).

use thiserror::Error;

/// Errors surfaced by the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing settings detected before any network activity.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// DNS, connect, write, read or timeout failure during one send.
    #[error("transport error talking to {addr}: {source}")]
    Transport {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The collector's answer could not be decoded.
    #[error("protocol decode error: {0}")]
    ProtocolDecode(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn transport(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            addr: addr.into(),
            source,
        }
    }

    /// Whether this error came from the network rather than from settings
    /// or a malformed reply.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
