//! The registry driven the way a Host drives it.

use std::net::SocketAddr;

use pokelink_session::{Role, SessionConfig, SessionRegistry};

fn joiner() -> SocketAddr {
    "10.0.0.7:51000".parse().unwrap()
}

/// What the Host does for a HANDSHAKE_REQUEST carrying `seq`.
fn on_handshake_request(reg: &mut SessionRegistry, from: SocketAddr, seq: u64) -> u64 {
    if !reg.contains(from) {
        reg.register(from, Role::Joiner).unwrap();
        reg.accept_sequence(from, seq).unwrap();
    }
    let (seed, _) = reg.seed_for(from).unwrap();
    reg.establish(from, Some(seed)).unwrap();
    seed
}

#[test]
fn test_repeated_handshake_reuses_seed_and_keeps_counter() {
    let mut reg = SessionRegistry::new(SessionConfig::default());

    let first = on_handshake_request(&mut reg, joiner(), 1);
    // A couple of battle messages move the counter on.
    assert!(reg.accept_sequence(joiner(), 2).unwrap());
    assert!(reg.accept_sequence(joiner(), 3).unwrap());

    let second = on_handshake_request(&mut reg, joiner(), 4);

    assert_eq!(first, second);
    let session = reg.get(joiner()).unwrap();
    assert_eq!(session.sequence_counter, 3);
    assert_eq!(session.handshake_seed, Some(first));
    assert_eq!(reg.len(), 1);
}

#[test]
fn test_retransmitted_battle_message_is_reported_once() {
    let mut reg = SessionRegistry::new(SessionConfig::default());
    on_handshake_request(&mut reg, joiner(), 1);

    let deliveries = [2, 3, 3, 4, 3, 5];
    let fresh: Vec<u64> = deliveries
        .into_iter()
        .filter(|seq| reg.accept_sequence(joiner(), *seq).unwrap())
        .collect();

    assert_eq!(fresh, vec![2, 3, 4, 5]);
}
