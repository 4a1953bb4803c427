//! Network layer error types
//!
//! Errors raised by the HTTP and line-socket listeners and by individual
//! socket connections.

use std::io;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

/// Network layer errors
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (binding, accepting, reading, writing)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Connection limit exceeded
    #[error("Connection limit exceeded: {current}/{max}")]
    ConnectionLimit {
        /// Current number of connections
        current: usize,
        /// Maximum allowed connections
        max: usize,
    },

    /// Per-IP connection limit exceeded
    #[error("Connection limit exceeded for {ip}: {current}/{max}")]
    PerIpLimit {
        /// IP address that exceeded limit
        ip: IpAddr,
        /// Current number of connections from this IP
        current: usize,
        /// Maximum allowed connections per IP
        max: usize,
    },

    /// Connection idle for too long
    #[error("Connection timeout after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds
        duration_ms: u64,
    },

    /// Connection closed by peer
    #[error("Connection closed by peer: {peer}")]
    ConnectionClosed {
        /// Peer address that closed the connection
        peer: SocketAddr,
    },

    /// Line too long
    #[error("Line exceeds maximum length: {length} > {max}")]
    LineTooLong {
        /// Bytes read before giving up
        length: usize,
        /// Maximum allowed line length
        max: usize,
    },

    /// Client broke the one-request-per-reply discipline
    #[error("Protocol violation from {peer}: {reason}")]
    ProtocolViolation {
        /// Offending peer
        peer: SocketAddr,
        /// What the peer did
        reason: String,
    },

    /// Bind failed
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address that failed to bind
        addr: SocketAddr,
        /// Reason for the bind failure
        reason: String,
    },

    /// Shutdown error
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

impl NetworkError {
    /// Whether this is an ordinary end of conversation
    pub fn is_normal_close(&self) -> bool {
        matches!(self, NetworkError::ConnectionClosed { .. })
    }
}
