//! UDP datagram endpoint on top of `tokio::net::UdpSocket`.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::{Datagram, TransportError};

/// Largest datagram we accept. Anything bigger is truncated by the OS.
const MAX_DATAGRAM: usize = 64 * 1024;

/// A [`Datagram`] backed by a bound UDP socket.
pub struct UdpDatagram {
    socket: UdpSocket,
}

impl UdpDatagram {
    /// Binds a socket. Port `0` lets the OS pick one.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(TransportError::BindFailed)?;
        let local = socket.local_addr().map_err(TransportError::BindFailed)?;
        tracing::info!(%local, "UDP endpoint bound");
        Ok(Self { socket })
    }
}

impl Datagram for UdpDatagram {
    async fn send_to(&self, data: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        self.socket
            .send_to(data, dest)
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(())
    }

    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        buf.truncate(len);
        Ok((buf, from))
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket.local_addr().map_err(TransportError::BindFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_datagram_send_and_receive_on_loopback() {
        let a = UdpDatagram::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpDatagram::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        a.send_to(b"hello", b.local_addr().unwrap()).await.unwrap();
        let (data, from) = b.recv_from().await.unwrap();

        assert_eq!(data, b"hello");
        assert_eq!(from, a.local_addr().unwrap());
    }
}
