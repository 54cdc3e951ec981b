use thiserror::Error;

use crate::resolve::DecodeError;

/// Session-level failures. All are terminal for the session;
/// nothing is retried automatically — clients are expected to reconnect.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("address decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("failed to connect to upstream {host}:{port}: {source}")]
    UpstreamConnectFailed {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("upstream closed before login completed")]
    UpstreamClosedPrematurely,

    #[error("no upstream configured for domain {0:?}")]
    NoUpstream(String),

    #[error("connection idle for too long")]
    IdleTimeout,

    #[error("handshake did not arrive before the timeout")]
    HandshakeTimeout,
}
