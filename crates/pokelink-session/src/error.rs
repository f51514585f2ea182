//! Error types for the session layer.

use std::net::SocketAddr;

/// Errors that can occur while tracking peer sessions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the address. Either the peer never
    /// handshaked, or its session already ended.
    #[error("no session for {0}")]
    NotFound(SocketAddr),

    /// A session for this address already exists. One session per
    /// remote address.
    #[error("session for {0} already registered")]
    AlreadyRegistered(SocketAddr),

    /// The handshake did not complete within the configured timeout.
    #[error("handshake with {0} expired")]
    HandshakeExpired(SocketAddr),
}
