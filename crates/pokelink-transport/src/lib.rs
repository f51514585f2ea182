//! Transport layer for Pokelink.
//!
//! Two pieces live here:
//!
//! - [`Datagram`]: the unreliable primitive: fire a packet at an address,
//!   receive whatever arrives. [`UdpDatagram`] is the real thing;
//!   [`MemoryDatagram`] runs on an in-process [`MemoryNetwork`] whose loss
//!   can be scripted, so tests are deterministic.
//! - [`ReliableTransport`]: ack/retry on top of any `Datagram`. A `send`
//!   either gets acknowledged within the configured attempts or fails with
//!   [`TransportError::DeliveryFailed`]. Delivery is at-least-once; dropping
//!   duplicates is the caller's job.
//!
//! ```text
//! send(dest, envelope)                       receive()
//!   │ stamp seq, encode                        │ recv_from
//!   │ send_to ──────── datagram ─────────────▶ │ ACK? resolve waiter
//!   │ wait ack_timeout ◀──────── ACK:<seq> ─── │ message? ACK it, return
//!   └ retransmit or give up
//! ```

mod config;
mod error;
mod memory;
mod reliable;
mod udp;

pub use config::TransportConfig;
pub use error::TransportError;
pub use memory::{MemoryDatagram, MemoryNetwork, Transmission};
pub use reliable::ReliableTransport;
pub use udp::UdpDatagram;

use std::future::Future;
use std::net::SocketAddr;

/// An unreliable, unordered, connectionless packet endpoint.
///
/// Methods return `Send` futures so a transport built on any `Datagram`
/// can be driven from spawned tasks.
pub trait Datagram: Send + Sync + 'static {
    /// Sends one datagram. Success means it left this endpoint, not that
    /// it arrived.
    fn send_to(
        &self,
        data: &[u8],
        dest: SocketAddr,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next datagram and returns it with its source address.
    fn recv_from(
        &self,
    ) -> impl Future<Output = Result<(Vec<u8>, SocketAddr), TransportError>> + Send;

    /// The address peers should send to.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}
