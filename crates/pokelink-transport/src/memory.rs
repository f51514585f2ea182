//! In-process datagram network for deterministic tests.
//!
//! A [`MemoryNetwork`] is a switchboard: every endpoint bound on it gets an
//! unbounded inbox, and `send_to` drops the bytes into the destination's
//! inbox. Packet loss is scripted with a filter closure, and every
//! transmission (delivered or not) is recorded so a test can count
//! retransmissions.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::{Datagram, TransportError};

/// First port handed out by [`MemoryNetwork::bind_any`].
const FIRST_EPHEMERAL_PORT: u16 = 40_000;

/// One datagram as seen by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub from: SocketAddr,
    pub to: SocketAddr,
    pub data: Vec<u8>,
}

impl Transmission {
    /// The payload as text, for assertions.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Returns `true` to deliver, `false` to drop.
type LossFilter = Box<dyn FnMut(&Transmission) -> bool + Send>;

type Inbox = mpsc::UnboundedSender<(Vec<u8>, SocketAddr)>;

struct Inner {
    endpoints: HashMap<SocketAddr, Inbox>,
    filter: Option<LossFilter>,
    log: Vec<Transmission>,
    next_port: u16,
}

/// Shared handle to an in-memory network. Cloning gives another handle to
/// the same network.
#[derive(Clone)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNetwork {
    /// Creates a lossless network with no endpoints.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                endpoints: HashMap::new(),
                filter: None,
                log: Vec::new(),
                next_port: FIRST_EPHEMERAL_PORT,
            })),
        }
    }

    /// Binds an endpoint at a specific address.
    ///
    /// # Errors
    /// [`TransportError::BindFailed`] if the address is taken.
    pub async fn bind(&self, addr: SocketAddr) -> Result<MemoryDatagram, TransportError> {
        let mut inner = self.inner.lock().await;
        if inner.endpoints.contains_key(&addr) {
            return Err(TransportError::BindFailed(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("{addr} already bound"),
            )));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner.endpoints.insert(addr, tx);
        Ok(MemoryDatagram {
            addr,
            network: self.clone(),
            inbox: Mutex::new(rx),
        })
    }

    /// Binds an endpoint on the next free loopback port.
    pub async fn bind_any(&self) -> Result<MemoryDatagram, TransportError> {
        let addr = {
            let mut inner = self.inner.lock().await;
            loop {
                let port = inner.next_port;
                inner.next_port = inner.next_port.wrapping_add(1);
                let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
                if !inner.endpoints.contains_key(&addr) {
                    break addr;
                }
            }
        };
        self.bind(addr).await
    }

    /// Installs a loss filter. It sees every transmission and returns
    /// `true` to deliver it.
    pub async fn set_filter<F>(&self, filter: F)
    where
        F: FnMut(&Transmission) -> bool + Send + 'static,
    {
        self.inner.lock().await.filter = Some(Box::new(filter));
    }

    /// Removes the loss filter; everything is delivered again.
    pub async fn clear_filter(&self) {
        self.inner.lock().await.filter = None;
    }

    /// Unbinds an address. Later datagrams to it vanish, like packets to
    /// a host that went away.
    pub async fn disconnect(&self, addr: SocketAddr) {
        self.inner.lock().await.endpoints.remove(&addr);
    }

    /// Every transmission so far, in order, including dropped ones.
    pub async fn transmissions(&self) -> Vec<Transmission> {
        self.inner.lock().await.log.clone()
    }

    async fn route(&self, from: SocketAddr, to: SocketAddr, data: &[u8]) {
        let mut inner = self.inner.lock().await;
        let transmission = Transmission {
            from,
            to,
            data: data.to_vec(),
        };
        let deliver = match inner.filter.as_mut() {
            Some(filter) => filter(&transmission),
            None => true,
        };
        inner.log.push(transmission);

        if !deliver {
            tracing::trace!(%from, %to, "memory network dropped datagram");
            return;
        }
        if let Some(inbox) = inner.endpoints.get(&to) {
            // A closed inbox is the same as an unbound address.
            let _ = inbox.send((data.to_vec(), from));
        }
    }
}

/// An endpoint on a [`MemoryNetwork`].
pub struct MemoryDatagram {
    addr: SocketAddr,
    network: MemoryNetwork,
    inbox: Mutex<mpsc::UnboundedReceiver<(Vec<u8>, SocketAddr)>>,
}

impl Datagram for MemoryDatagram {
    async fn send_to(&self, data: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        self.network.route(self.addr, dest, data).await;
        Ok(())
    }

    async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        self.inbox
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Shutdown)
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_network_delivers_between_endpoints() {
        let net = MemoryNetwork::new();
        let a = net.bind_any().await.unwrap();
        let b = net.bind_any().await.unwrap();
        assert_ne!(a.local_addr().unwrap(), b.local_addr().unwrap());

        a.send_to(b"ping", b.local_addr().unwrap()).await.unwrap();
        let (data, from) = b.recv_from().await.unwrap();
        assert_eq!(data, b"ping");
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_memory_network_filter_drops_and_logs() {
        let net = MemoryNetwork::new();
        let a = net.bind_any().await.unwrap();
        let b = net.bind_any().await.unwrap();
        net.set_filter(|t| t.data != b"lost").await;

        a.send_to(b"lost", b.local_addr().unwrap()).await.unwrap();
        a.send_to(b"kept", b.local_addr().unwrap()).await.unwrap();

        let (data, _) = b.recv_from().await.unwrap();
        assert_eq!(data, b"kept");
        assert_eq!(net.transmissions().await.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_network_bind_twice_fails() {
        let net = MemoryNetwork::new();
        let addr: SocketAddr = "127.0.0.1:9002".parse().unwrap();
        let _first = net.bind(addr).await.unwrap();
        assert!(matches!(
            net.bind(addr).await,
            Err(TransportError::BindFailed(_))
        ));
    }
}
