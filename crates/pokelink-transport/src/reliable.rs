//! Ack/retry delivery on top of a [`Datagram`].

use std::collections::HashMap;
use std::net::SocketAddr;

use pokelink_protocol::{Codec, Envelope, LineCodec, Packet};
use tokio::sync::{oneshot, Mutex};

use crate::{Datagram, TransportConfig, TransportError};

/// Reliable request/ack delivery over an unreliable [`Datagram`].
///
/// One instance serves every peer. It is meant to be shared behind an
/// `Arc`: one task loops on [`receive`](Self::receive) while others call
/// [`send`](Self::send). ACKs are matched on the receiving task, so a
/// sender waiting for its ACK never blocks acknowledgment of inbound
/// traffic.
///
/// ## Sequence numbers
///
/// Numbers are scoped per destination: the first message to any address
/// is `1`, the next to the same address `2`, and so on. They never repeat
/// for a destination, which lets the receiver spot duplicates.
pub struct ReliableTransport<D, C = LineCodec> {
    socket: D,
    codec: C,
    config: TransportConfig,
    next_seq: Mutex<HashMap<SocketAddr, u64>>,
    /// Waiters for outstanding ACKs, keyed by destination and number.
    pending: Mutex<HashMap<(SocketAddr, u64), oneshot::Sender<()>>>,
}

impl<D: Datagram> ReliableTransport<D> {
    /// Creates a transport speaking the line wire format.
    pub fn new(socket: D, config: TransportConfig) -> Self {
        Self::with_codec(socket, LineCodec, config)
    }
}

impl<D: Datagram, C: Codec> ReliableTransport<D, C> {
    /// Creates a transport with a custom codec.
    pub fn with_codec(socket: D, codec: C, config: TransportConfig) -> Self {
        Self {
            socket,
            codec,
            config,
            next_seq: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket.local_addr()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Sends `envelope` to `dest` and waits until it is acknowledged.
    ///
    /// The envelope is stamped with the next sequence number for `dest`,
    /// encoded once, and the identical bytes are retransmitted every
    /// `ack_timeout` until an `ACK:<seq>` from `dest` arrives or
    /// `max_retries` transmissions have gone out. Returns the number used.
    ///
    /// # Errors
    /// - [`TransportError::DeliveryFailed`] when every attempt timed out.
    /// - [`TransportError::Protocol`] if the envelope cannot be encoded.
    /// - [`TransportError::SendFailed`] if the socket rejects the datagram.
    pub async fn send(&self, dest: SocketAddr, mut envelope: Envelope) -> Result<u64, TransportError> {
        let seq = self.next_sequence(dest).await;
        envelope.seq = Some(seq);
        let bytes = self.codec.encode(&envelope)?;

        // Register before the first transmission so a fast ACK can't be
        // missed.
        let (tx, mut rx) = oneshot::channel();
        self.pending.lock().await.insert((dest, seq), tx);

        let attempts = self.config.max_retries.max(1);
        for attempt in 1..=attempts {
            if let Err(e) = self.socket.send_to(&bytes, dest).await {
                self.pending.lock().await.remove(&(dest, seq));
                return Err(e);
            }
            tracing::debug!(
                %dest,
                seq,
                attempt,
                message_type = envelope.message_type(),
                "sent"
            );

            match tokio::time::timeout(self.config.ack_timeout, &mut rx).await {
                Ok(Ok(())) => return Ok(seq),
                Ok(Err(_)) => return Err(TransportError::Shutdown),
                Err(_) if attempt < attempts => {
                    tracing::warn!(%dest, seq, attempt, "no ack, retransmitting");
                }
                Err(_) => {}
            }
        }

        self.pending.lock().await.remove(&(dest, seq));
        tracing::warn!(%dest, seq, attempts, "delivery failed");
        Err(TransportError::DeliveryFailed {
            dest,
            seq,
            attempts,
        })
    }

    /// Waits for the next message from any peer.
    ///
    /// ACK frames are consumed here and never returned. Every message that
    /// carries a sequence number is acknowledged before it is returned,
    /// duplicates included, since the previous ACK may have been the
    /// thing that got lost. Datagrams that fail to decode are logged and
    /// skipped without a reply.
    ///
    /// # Errors
    /// Only socket failures. Bad input never ends the loop.
    pub async fn receive(&self) -> Result<(Envelope, SocketAddr), TransportError> {
        loop {
            let (data, from) = self.socket.recv_from().await?;
            match self.codec.decode_packet(&data) {
                Ok(Packet::Ack(seq)) => self.resolve_ack(from, seq).await,
                Ok(Packet::Message(envelope)) => {
                    if let Some(seq) = envelope.seq {
                        let ack = self.codec.encode_ack(seq);
                        if let Err(e) = self.socket.send_to(&ack, from).await {
                            tracing::warn!(%from, seq, error = %e, "failed to send ack");
                        }
                    }
                    tracing::debug!(
                        %from,
                        seq = ?envelope.seq,
                        message_type = envelope.message_type(),
                        "received"
                    );
                    return Ok((envelope, from));
                }
                Err(e) => {
                    tracing::warn!(%from, error = %e, "dropping undecodable datagram");
                }
            }
        }
    }

    async fn resolve_ack(&self, from: SocketAddr, seq: u64) {
        match self.pending.lock().await.remove(&(from, seq)) {
            Some(waiter) => {
                // The sender may have just given up; nothing to do then.
                let _ = waiter.send(());
            }
            None => tracing::debug!(%from, seq, "ack for nothing outstanding"),
        }
    }

    async fn next_sequence(&self, dest: SocketAddr) -> u64 {
        let mut counters = self.next_seq.lock().await;
        let counter = counters.entry(dest).or_insert(0);
        *counter += 1;
        *counter
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pokelink_protocol::Message;

    use super::*;
    use crate::MemoryNetwork;

    fn fast_config() -> TransportConfig {
        TransportConfig {
            ack_timeout: Duration::from_millis(50),
            max_retries: 3,
        }
    }

    #[tokio::test]
    async fn test_next_sequence_is_per_destination() {
        let net = MemoryNetwork::new();
        let transport = ReliableTransport::new(net.bind_any().await.unwrap(), fast_config());
        let a: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:2".parse().unwrap();

        assert_eq!(transport.next_sequence(a).await, 1);
        assert_eq!(transport.next_sequence(a).await, 2);
        assert_eq!(transport.next_sequence(b).await, 1);
        assert_eq!(transport.next_sequence(a).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_with_zero_retries_still_transmits_once() {
        let net = MemoryNetwork::new();
        let transport = ReliableTransport::new(
            net.bind_any().await.unwrap(),
            TransportConfig {
                ack_timeout: Duration::from_millis(50),
                max_retries: 0,
            },
        );
        let nobody: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let err = transport
            .send(nobody, Envelope::new(Message::DefenseAnnounce))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::DeliveryFailed { attempts: 1, .. }));
        assert_eq!(net.transmissions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_ack_from_wrong_address_is_ignored() {
        let net = MemoryNetwork::new();
        let transport = Arc::new(ReliableTransport::new(
            net.bind_any().await.unwrap(),
            fast_config(),
        ));
        let dest: SocketAddr = "127.0.0.1:5".parse().unwrap();
        let impostor: SocketAddr = "127.0.0.1:6".parse().unwrap();

        let sender = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                transport
                    .send(dest, Envelope::new(Message::CalculationConfirm))
                    .await
            })
        };
        tokio::task::yield_now().await;
        transport.resolve_ack(impostor, 1).await;

        assert!(matches!(
            sender.await.unwrap(),
            Err(TransportError::DeliveryFailed { seq: 1, .. })
        ));
    }
}
