//! The session registry: every peer this node is talking to.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is a plain `HashMap` with no locking. It is owned by
//! the battle actor, which is the only task that reads or writes it.

use std::collections::HashMap;
use std::net::SocketAddr;

use rand::Rng;

use crate::{HandshakeState, PeerSession, Role, SessionConfig, SessionError};

/// Sessions keyed by remote address.
///
/// ## Lifecycle
///
/// ```text
/// register() ──→ establish() ──→ ... ──→ remove()
///     │
///     └──(handshake_timeout)──→ expire_stale() ──→ cleanup_expired()
/// ```
pub struct SessionRegistry {
    sessions: HashMap<SocketAddr, PeerSession>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Creates a session awaiting its handshake.
    ///
    /// # Errors
    /// [`SessionError::AlreadyRegistered`] if the address has one.
    pub fn register(
        &mut self,
        addr: SocketAddr,
        role: Role,
    ) -> Result<&mut PeerSession, SessionError> {
        if self.sessions.contains_key(&addr) {
            return Err(SessionError::AlreadyRegistered(addr));
        }
        tracing::info!(%addr, %role, "session registered");
        Ok(self
            .sessions
            .entry(addr)
            .or_insert_with(|| PeerSession::new(addr, role)))
    }

    /// Marks the handshake complete and records the seed.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if there is no session.
    pub fn establish(&mut self, addr: SocketAddr, seed: Option<u64>) -> Result<(), SessionError> {
        let session = self.get_mut(addr)?;
        session.state = HandshakeState::Established;
        if seed.is_some() {
            session.handshake_seed = seed;
        }
        tracing::info!(%addr, role = %session.role, ?seed, "session established");
        Ok(())
    }

    /// Returns the session's seed, generating and storing one if it has
    /// none yet. The boolean is `true` when the seed was just generated.
    ///
    /// A peer that repeats its handshake gets the same seed back; nothing
    /// else about its session changes.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if there is no session.
    pub fn seed_for(&mut self, addr: SocketAddr) -> Result<(u64, bool), SessionError> {
        let session = self.get_mut(addr)?;
        match session.handshake_seed {
            Some(seed) => Ok((seed, false)),
            None => {
                let seed = generate_seed();
                session.handshake_seed = Some(seed);
                Ok((seed, true))
            }
        }
    }

    /// Records an inbound sequence number for duplicate suppression.
    ///
    /// Returns `Ok(false)` for a duplicate.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if there is no session.
    pub fn accept_sequence(&mut self, addr: SocketAddr, seq: u64) -> Result<bool, SessionError> {
        let window = self.config.dedup_window;
        let session = self.get_mut(addr)?;
        let fresh = session.accept_sequence(seq, window);
        if !fresh {
            tracing::debug!(%addr, seq, "duplicate sequence number");
        }
        Ok(fresh)
    }

    /// Ends a session.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if there is no session.
    pub fn remove(&mut self, addr: SocketAddr) -> Result<PeerSession, SessionError> {
        let session = self
            .sessions
            .remove(&addr)
            .ok_or(SessionError::NotFound(addr))?;
        tracing::info!(%addr, role = %session.role, "session closed");
        Ok(session)
    }

    /// Marks every session whose handshake has been pending longer than
    /// `handshake_timeout` as expired, and returns their addresses.
    ///
    /// Expired sessions stay in the map until [`cleanup_expired`]
    /// so the caller can react first (fail a pending `connect`, say).
    ///
    /// [`cleanup_expired`]: Self::cleanup_expired
    pub fn expire_stale(&mut self) -> Vec<SocketAddr> {
        let timeout = self.config.handshake_timeout;
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let HandshakeState::AwaitingHandshake { since } = session.state {
                if since.elapsed() > timeout {
                    session.state = HandshakeState::Expired;
                    expired.push(session.addr);
                    tracing::warn!(addr = %session.addr, "handshake expired");
                }
            }
        }

        expired
    }

    /// Removes every expired session.
    pub fn cleanup_expired(&mut self) {
        self.sessions
            .retain(|_, session| !matches!(session.state, HandshakeState::Expired));
    }

    pub fn get(&self, addr: SocketAddr) -> Option<&PeerSession> {
        self.sessions.get(&addr)
    }

    /// Mutable lookup.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if there is no session.
    pub fn get_mut(&mut self, addr: SocketAddr) -> Result<&mut PeerSession, SessionError> {
        self.sessions
            .get_mut(&addr)
            .ok_or(SessionError::NotFound(addr))
    }

    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.sessions.contains_key(&addr)
    }

    /// The one battling peer (Host or Joiner), if any.
    pub fn opponent(&self) -> Option<&PeerSession> {
        self.sessions.values().find(|s| s.role.is_battler())
    }

    /// Addresses of every established spectator.
    pub fn spectators(&self) -> Vec<SocketAddr> {
        self.sessions
            .values()
            .filter(|s| s.role == Role::Spectator && s.is_established())
            .map(|s| s.addr)
            .collect()
    }

    /// Iterates over all sessions in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerSession> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// A fresh handshake seed.
///
/// Kept below 2^63 so it survives the wire format's signed integers.
fn generate_seed() -> u64 {
    rand::rng().random_range(1..=i64::MAX as u64)
}

// =========================================================================
// Tests
// =========================================================================
