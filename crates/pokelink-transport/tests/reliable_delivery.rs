//! Integration tests for ack/retry delivery.
//!
//! Most tests run on a `MemoryNetwork` with tokio's clock paused, so
//! timeouts elapse instantly and packet loss is exactly what the filter
//! says. One test goes over real loopback UDP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pokelink_protocol::{Envelope, Message};
use pokelink_transport::{
    Datagram, MemoryDatagram, MemoryNetwork, ReliableTransport, TransportConfig, TransportError,
    UdpDatagram,
};
use tokio::sync::mpsc;

type MemTransport = ReliableTransport<MemoryDatagram>;

fn config(max_retries: u32) -> TransportConfig {
    TransportConfig {
        ack_timeout: Duration::from_millis(500),
        max_retries,
    }
}

async fn endpoint(net: &MemoryNetwork, max_retries: u32) -> Arc<MemTransport> {
    Arc::new(ReliableTransport::new(
        net.bind_any().await.expect("bind"),
        config(max_retries),
    ))
}

/// Spawns a receive loop that forwards every delivered envelope.
fn spawn_receiver(transport: Arc<MemTransport>) -> mpsc::UnboundedReceiver<(Envelope, SocketAddr)> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok(received) = transport.receive().await {
            if tx.send(received).is_err() {
                break;
            }
        }
    });
    rx
}

fn attack(move_name: &str) -> Envelope {
    Envelope::new(Message::AttackAnnounce {
        move_name: move_name.into(),
    })
}

// =========================================================================
// Retry budget
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_send_without_ack_transmits_exactly_max_retries_then_fails() {
    let net = MemoryNetwork::new();
    let sender = endpoint(&net, 3).await;
    // The destination exists but never answers.
    let silent = net.bind_any().await.unwrap();
    let dest = silent.local_addr().unwrap();

    let err = sender.send(dest, attack("Tackle")).await.unwrap_err();

    match err {
        TransportError::DeliveryFailed {
            dest: failed,
            seq,
            attempts,
        } => {
            assert_eq!(failed, dest);
            assert_eq!(seq, 1);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected DeliveryFailed, got {other:?}"),
    }

    let sent = net.transmissions().await;
    assert_eq!(sent.len(), 3);
    // Retransmissions are byte-identical.
    assert!(sent.iter().all(|t| t.data == sent[0].data));
}

#[tokio::test(start_paused = true)]
async fn test_send_succeeds_when_only_early_attempts_are_lost() {
    let net = MemoryNetwork::new();
    let sender = endpoint(&net, 3).await;
    let receiver = endpoint(&net, 3).await;
    let sender_addr = sender.local_addr().unwrap();
    let _acks = spawn_receiver(Arc::clone(&sender));
    let mut inbox = spawn_receiver(Arc::clone(&receiver));

    let dropped = Arc::new(AtomicUsize::new(0));
    {
        let dropped = Arc::clone(&dropped);
        net.set_filter(move |t| {
            if t.from == sender_addr && dropped.load(Ordering::SeqCst) < 2 {
                dropped.fetch_add(1, Ordering::SeqCst);
                return false;
            }
            true
        })
        .await;
    }

    let seq = sender
        .send(receiver.local_addr().unwrap(), attack("Ember"))
        .await
        .expect("third attempt should get through");
    assert_eq!(seq, 1);

    let (envelope, from) = inbox.recv().await.unwrap();
    assert_eq!(from, sender_addr);
    assert_eq!(envelope.seq, Some(1));
    assert_eq!(dropped.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_lost_ack_causes_duplicate_that_is_acked_again() {
    let net = MemoryNetwork::new();
    let sender = endpoint(&net, 3).await;
    let receiver = endpoint(&net, 3).await;
    let receiver_addr = receiver.local_addr().unwrap();
    let _acks = spawn_receiver(Arc::clone(&sender));
    let mut inbox = spawn_receiver(Arc::clone(&receiver));

    let acks_dropped = Arc::new(AtomicUsize::new(0));
    {
        let acks_dropped = Arc::clone(&acks_dropped);
        net.set_filter(move |t| {
            if t.from == receiver_addr
                && t.text().starts_with("ACK:")
                && acks_dropped.fetch_add(1, Ordering::SeqCst) == 0
            {
                return false;
            }
            true
        })
        .await;
    }

    sender
        .send(receiver_addr, attack("Surf"))
        .await
        .expect("second ack should arrive");

    // The message itself arrived twice with the same number.
    let (first, _) = inbox.recv().await.unwrap();
    let (second, _) = inbox.recv().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.seq, Some(1));
}

// =========================================================================
// Sequence numbers
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_send_sequence_numbers_strictly_increase_per_destination() {
    let net = MemoryNetwork::new();
    let sender = endpoint(&net, 3).await;
    let b = endpoint(&net, 3).await;
    let c = endpoint(&net, 3).await;
    let _acks = spawn_receiver(Arc::clone(&sender));
    let _b_inbox = spawn_receiver(Arc::clone(&b));
    let _c_inbox = spawn_receiver(Arc::clone(&c));
    let b_addr = b.local_addr().unwrap();
    let c_addr = c.local_addr().unwrap();

    let mut to_b = Vec::new();
    for _ in 0..5 {
        to_b.push(sender.send(b_addr, Envelope::new(Message::DefenseAnnounce)).await.unwrap());
    }
    let first_to_c = sender
        .send(c_addr, Envelope::new(Message::DefenseAnnounce))
        .await
        .unwrap();

    assert_eq!(to_b, vec![1, 2, 3, 4, 5]);
    assert!(to_b.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(first_to_c, 1);
}

// =========================================================================
// Receive path
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_receive_drops_undecodable_datagrams_without_reply() {
    let net = MemoryNetwork::new();
    let receiver = endpoint(&net, 3).await;
    let receiver_addr = receiver.local_addr().unwrap();
    let mut inbox = spawn_receiver(Arc::clone(&receiver));

    let raw = net.bind_any().await.unwrap();
    let raw_addr = raw.local_addr().unwrap();
    raw.send_to(b"seed: 5\nno type here\n", receiver_addr).await.unwrap();
    raw.send_to(b"message_type: ATTACK_ANNOUNCE\nsequence_number: 1\n", receiver_addr)
        .await
        .unwrap();
    raw.send_to(b"message_type: DEFENSE_ANNOUNCE\nsequence_number: 2\n", receiver_addr)
        .await
        .unwrap();

    let (envelope, from) = inbox.recv().await.unwrap();
    assert_eq!(from, raw_addr);
    assert_eq!(envelope.message, Message::DefenseAnnounce);

    // Only the valid message was acknowledged.
    let replies: Vec<String> = net
        .transmissions()
        .await
        .into_iter()
        .filter(|t| t.from == receiver_addr)
        .map(|t| t.text())
        .collect();
    assert_eq!(replies, vec!["ACK:2".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_receive_does_not_ack_messages_without_sequence_number() {
    let net = MemoryNetwork::new();
    let receiver = endpoint(&net, 3).await;
    let receiver_addr = receiver.local_addr().unwrap();
    let mut inbox = spawn_receiver(Arc::clone(&receiver));

    let raw = net.bind_any().await.unwrap();
    raw.send_to(b"message_type: HANDSHAKE_REQUEST\n", receiver_addr)
        .await
        .unwrap();

    let (envelope, _) = inbox.recv().await.unwrap();
    assert_eq!(envelope.message, Message::HandshakeRequest);
    assert!(
        net.transmissions()
            .await
            .iter()
            .all(|t| t.from != receiver_addr)
    );
}

// =========================================================================
// Real UDP
// =========================================================================

#[tokio::test]
async fn test_reliable_send_over_loopback_udp() {
    let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let a = Arc::new(ReliableTransport::new(
        UdpDatagram::bind(any).await.unwrap(),
        TransportConfig::default(),
    ));
    let b = Arc::new(ReliableTransport::new(
        UdpDatagram::bind(any).await.unwrap(),
        TransportConfig::default(),
    ));
    let b_addr = b.local_addr().unwrap();

    // `a` also needs a receive loop, or it would never see b's ACK.
    let a_recv = Arc::clone(&a);
    tokio::spawn(async move { while a_recv.receive().await.is_ok() {} });

    let receiving = {
        let b = Arc::clone(&b);
        tokio::spawn(async move { b.receive().await })
    };

    let seq = a.send(b_addr, attack("Thunderbolt")).await.unwrap();
    let (envelope, from) = receiving.await.unwrap().unwrap();

    assert_eq!(seq, 1);
    assert_eq!(from, a.local_addr().unwrap());
    assert_eq!(
        envelope.message,
        Message::AttackAnnounce {
            move_name: "Thunderbolt".into()
        }
    );
}
