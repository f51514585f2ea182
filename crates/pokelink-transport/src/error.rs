use std::net::SocketAddr;

use pokelink_protocol::ProtocolError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Every transmission attempt went unacknowledged.
    #[error("delivery of seq {seq} to {dest} failed after {attempts} attempts")]
    DeliveryFailed {
        dest: SocketAddr,
        seq: u64,
        attempts: u32,
    },

    /// Sending a datagram failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a datagram failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the local endpoint failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// An outbound envelope could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The endpoint was closed.
    #[error("transport shut down")]
    Shutdown,
}
