//! Peer actor: an isolated Tokio task that owns every session and the
//! battle.
//!
//! Nothing outside this task touches the session registry or the battle
//! state. The operator reaches it through a [`PeerHandle`]; the listener
//! task forwards each inbound message over an unbounded channel so that it
//! can go straight back to reading the socket. ACKs are handled on the
//! listener, which means the actor may sit in a `send` waiting for its ACK
//! without stalling anything else.
//!
//! ```text
//!  PeerHandle ──commands──┐
//!                         ├──→ PeerActor ──events──→ operator
//!  listener ───inbound────┘        │
//!                                  └──send──→ ReliableTransport
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pokelink_engine::{AttackOutcome, Combatant, Roster, StatBoosts};
use pokelink_protocol::{
    BattleSetup, CalculationReport, ChatContent, ChatMessage, CommunicationMode, Envelope,
    Message, ResolutionRequest, ATTACK_ANNOUNCE, BATTLE_SETUP, CALCULATION_CONFIRM,
    CALCULATION_REPORT, DEFENSE_ANNOUNCE, GAME_OVER, HANDSHAKE_REQUEST, HANDSHAKE_RESPONSE,
    RESOLUTION_REQUEST, SPECTATOR_REQUEST, SPECTATOR_RESPONSE,
};
use pokelink_session::{Role, SessionConfig, SessionError, SessionRegistry};
use pokelink_transport::{Datagram, ReliableTransport, TransportError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::handle::{Inbound, PeerCommand, Reply};
use crate::{BattleError, BattleState, PeerConfig, PeerEvent, PeerHandle, PeerStatus, Phase, Side};

/// Sender name on notices the peer generates itself.
pub const SYSTEM_SENDER: &str = "SYSTEM";

/// Spawns a peer actor and its listener on the current Tokio runtime.
///
/// Returns the handle for issuing commands and the stream of events. The
/// actor stops on [`PeerHandle::shutdown`] or once every handle is
/// dropped, and takes the listener down with it.
pub fn spawn_peer<D: Datagram>(
    config: PeerConfig,
    session_config: SessionConfig,
    transport: Arc<ReliableTransport<D>>,
    roster: Arc<dyn Roster>,
) -> Result<(PeerHandle, mpsc::UnboundedReceiver<PeerEvent>), BattleError> {
    let local_addr = transport.local_addr()?;
    let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let listener = tokio::spawn(listen(Arc::clone(&transport), inbound_tx));
    let handle = PeerHandle::new(config.role, local_addr, command_tx);

    let actor = PeerActor {
        config,
        local_addr,
        transport,
        roster,
        sessions: SessionRegistry::new(session_config),
        duel: None,
        pending_handshake: None,
        commands: command_rx,
        inbound: inbound_rx,
        events: event_tx,
        listener,
    };
    tokio::spawn(actor.run());

    Ok((handle, event_rx))
}

/// Reads the socket until the transport shuts down or the actor is gone.
async fn listen<D: Datagram>(
    transport: Arc<ReliableTransport<D>>,
    inbound: mpsc::UnboundedSender<Inbound>,
) {
    loop {
        match transport.receive().await {
            Ok((envelope, from)) => {
                if inbound.send(Inbound { envelope, from }).is_err() {
                    break;
                }
            }
            Err(TransportError::Shutdown) => break,
            Err(e) => tracing::warn!(error = %e, "receive failed"),
        }
    }
    tracing::debug!("listener stopped");
}

// ---------------------------------------------------------------------------
// Actor state
// ---------------------------------------------------------------------------

/// The battle with one opponent, from handshake to game over.
struct Duel {
    opponent: SocketAddr,
    seed: u64,
    local: Option<(Combatant, CommunicationMode)>,
    remote: Option<Combatant>,
    battle: Option<BattleState>,
}

impl Duel {
    fn new(opponent: SocketAddr, seed: u64) -> Self {
        Self {
            opponent,
            seed,
            local: None,
            remote: None,
            battle: None,
        }
    }

    fn phase(&self) -> Phase {
        self.battle
            .as_ref()
            .map_or(Phase::HandshakeDone, BattleState::phase)
    }
}

/// Where the answer to an outstanding `connect` or `spectate` goes.
enum HandshakeReply {
    Battle(Reply<u64>),
    Spectate(Reply<()>),
}

impl HandshakeReply {
    fn fail(self, error: BattleError) {
        match self {
            Self::Battle(reply) => {
                let _ = reply.send(Err(error));
            }
            Self::Spectate(reply) => {
                let _ = reply.send(Err(error));
            }
        }
    }
}

struct PendingHandshake {
    host: SocketAddr,
    reply: HandshakeReply,
}

struct PeerActor<D: Datagram> {
    config: PeerConfig,
    local_addr: SocketAddr,
    transport: Arc<ReliableTransport<D>>,
    roster: Arc<dyn Roster>,
    sessions: SessionRegistry,
    duel: Option<Duel>,
    pending_handshake: Option<PendingHandshake>,
    commands: mpsc::Receiver<PeerCommand>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    events: mpsc::UnboundedSender<PeerEvent>,
    listener: JoinHandle<()>,
}

impl<D: Datagram> PeerActor<D> {
    /// Runs the actor loop until shutdown.
    async fn run(mut self) {
        tracing::info!(role = %self.config.role, addr = %self.local_addr, "peer started");

        let period = self.config.sweep_interval.max(Duration::from_millis(1));
        let mut sweep = tokio::time::interval(period);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(PeerCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(Inbound { envelope, from }) = self.inbound.recv() => {
                    let message_type = envelope.message_type().to_string();
                    if let Err(e) = self.handle_inbound(envelope, from).await {
                        tracing::warn!(%from, %message_type, error = %e, "message rejected");
                    }
                }
                _ = sweep.tick() => self.sweep(),
            }
        }

        self.listener.abort();
        if let Some(pending) = self.pending_handshake.take() {
            pending.reply.fail(BattleError::Unavailable);
        }
        tracing::info!(role = %self.config.role, addr = %self.local_addr, "peer stopped");
    }

    // -----------------------------------------------------------------------
    // Operator commands
    // -----------------------------------------------------------------------

    async fn handle_command(&mut self, command: PeerCommand) {
        match command {
            PeerCommand::Connect { host, reply } => {
                self.open_handshake(host, HandshakeReply::Battle(reply))
                    .await;
            }
            PeerCommand::Spectate { host, reply } => {
                self.open_handshake(host, HandshakeReply::Spectate(reply))
                    .await;
            }
            PeerCommand::Setup {
                pokemon_name,
                boosts,
                mode,
                reply,
            } => {
                let result = self.setup(&pokemon_name, boosts, mode).await;
                let _ = reply.send(result);
            }
            PeerCommand::Attack { move_name, reply } => {
                let result = self.attack(&move_name).await;
                let _ = reply.send(result);
            }
            PeerCommand::Chat { content, reply } => {
                let result = self.chat(content).await;
                let _ = reply.send(result);
            }
            PeerCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            // Handled by the run loop.
            PeerCommand::Shutdown => {}
        }
    }

    /// Sends HANDSHAKE_REQUEST or SPECTATOR_REQUEST. The reply is parked
    /// until the response arrives or the handshake expires.
    async fn open_handshake(&mut self, host: SocketAddr, reply: HandshakeReply) {
        let (operation, expected, request) = match &reply {
            HandshakeReply::Battle(_) => ("connect", Role::Joiner, Message::HandshakeRequest),
            HandshakeReply::Spectate(_) => ("spectate", Role::Spectator, Message::SpectatorRequest),
        };
        if self.config.role != expected {
            return reply.fail(BattleError::WrongRole {
                operation,
                role: self.config.role,
            });
        }
        if self.pending_handshake.is_some() {
            return reply.fail(BattleError::HandshakeFailed(
                "a handshake is already in progress".into(),
            ));
        }
        if let Err(e) = self.sessions.register(host, Role::Host) {
            return reply.fail(e.into());
        }

        tracing::info!(%host, message_type = request.message_type(), "opening handshake");
        match self.transport.send(host, Envelope::new(request)).await {
            Ok(_) => self.pending_handshake = Some(PendingHandshake { host, reply }),
            Err(e) => {
                let _ = self.sessions.remove(host);
                self.emit(PeerEvent::HandshakeFailed {
                    peer: host,
                    reason: e.to_string(),
                });
                reply.fail(e.into());
            }
        }
    }

    async fn setup(
        &mut self,
        pokemon_name: &str,
        boosts: StatBoosts,
        mode: CommunicationMode,
    ) -> Result<(), BattleError> {
        self.local_side("setup")?;
        let phase = self.phase();
        let duel = self.duel.as_ref().ok_or(BattleError::NoBattle)?;
        if duel.phase() != Phase::HandshakeDone || duel.local.is_some() {
            return Err(BattleError::UnexpectedStateTransition {
                message_type: BATTLE_SETUP.into(),
                phase,
            });
        }
        let opponent = duel.opponent;

        let entity = self
            .roster
            .get_entity(pokemon_name)
            .ok_or_else(|| BattleError::UnknownEntity(pokemon_name.to_string()))?;
        let combatant = Combatant::from_entity(&entity, boosts);

        let setup = BattleSetup {
            communication_mode: mode,
            pokemon_name: entity.name.clone(),
            special_attack_uses: boosts.special_attack_uses,
            special_defense_uses: boosts.special_defense_uses,
        };
        if let Err(e) = self
            .transport
            .send(opponent, Envelope::new(Message::BattleSetup(setup)))
            .await
        {
            self.abandon(opponent, e.to_string());
            return Err(e.into());
        }

        tracing::info!(peer = %opponent, pokemon = %entity.name, %mode, "battle setup sent");
        if let Some(duel) = self.duel.as_mut() {
            duel.local = Some((combatant, mode));
        }
        self.try_start_battle();
        Ok(())
    }

    async fn attack(&mut self, move_name: &str) -> Result<(), BattleError> {
        let side = self.local_side("attack")?;
        let phase = self.phase();
        let duel = self.duel.as_mut().ok_or(BattleError::NoBattle)?;
        let opponent = duel.opponent;
        let battle = duel.battle.as_mut().ok_or(BattleError::NoBattle)?;

        if battle.phase() != Phase::Ready {
            return Err(BattleError::UnexpectedStateTransition {
                message_type: ATTACK_ANNOUNCE.into(),
                phase,
            });
        }
        if battle.turn_owner() != side {
            return Err(BattleError::NotYourTurn);
        }

        battle.begin_attack(move_name);
        tracing::info!(peer = %opponent, move_name, "attack announced");

        let message = Message::AttackAnnounce {
            move_name: move_name.to_string(),
        };
        self.send_turn(opponent, message.clone()).await?;
        self.relay(&message);
        Ok(())
    }

    /// Chat goes to the Host from Joiners and Spectators. A Host sends to
    /// its opponent, and to every spectator when broadcasting.
    async fn chat(&mut self, content: ChatContent) -> Result<(), BattleError> {
        let message = Message::Chat(ChatMessage {
            sender_name: self.config.sender_name.clone(),
            content,
        });
        let primary = self
            .sessions
            .opponent()
            .filter(|session| session.is_established())
            .map(|session| session.addr);

        if self.config.role == Role::Host {
            let spectators = if self.broadcasting() {
                self.sessions.spectators()
            } else {
                Vec::new()
            };
            if primary.is_none() && spectators.is_empty() {
                return Err(BattleError::NoBattle);
            }
            self.spawn_sends(spectators, &message);
        }

        match primary {
            Some(dest) => {
                self.transport.send(dest, Envelope::new(message)).await?;
                Ok(())
            }
            None if self.config.role == Role::Host => Ok(()),
            None => Err(BattleError::NoBattle),
        }
    }

    fn status(&self) -> PeerStatus {
        let side = Side::of(self.config.role);
        let duel = self.duel.as_ref();
        let battle = duel.and_then(|d| d.battle.as_ref());

        let (local, remote) = match (battle, side) {
            (Some(battle), Some(side)) => (
                Some(battle.combatant(side).clone()),
                Some(battle.combatant(side.other()).clone()),
            ),
            _ => (
                duel.and_then(|d| d.local.as_ref().map(|(c, _)| c.clone())),
                duel.and_then(|d| d.remote.clone()),
            ),
        };
        let opponent = match self.config.role {
            Role::Spectator => self.sessions.opponent().map(|s| s.addr),
            Role::Host | Role::Joiner => duel.map(|d| d.opponent),
        };
        let my_turn = match (battle, side) {
            (Some(battle), Some(side)) => {
                battle.phase() == Phase::Ready && battle.turn_owner() == side
            }
            _ => false,
        };

        PeerStatus {
            role: self.config.role,
            phase: self.phase(),
            opponent,
            my_turn,
            turn_count: battle.map_or(0, BattleState::turn_count),
            local,
            remote,
            spectators: self.sessions.spectators().len(),
        }
    }

    // -----------------------------------------------------------------------
    // Inbound dispatch
    // -----------------------------------------------------------------------

    /// Routes one inbound message.
    ///
    /// Requests are handled before duplicate suppression because they are
    /// what creates a session. Everything else must come from a known
    /// session, and a sequence number seen before is dropped here after
    /// the transport already re-acknowledged it.
    async fn handle_inbound(&mut self, envelope: Envelope, from: SocketAddr) -> Result<(), BattleError> {
        let Envelope { seq, message, .. } = envelope;

        match &message {
            Message::HandshakeRequest => return self.on_handshake_request(from, seq).await,
            Message::SpectatorRequest => return self.on_spectator_request(from, seq).await,
            Message::Unknown { message_type } => {
                return Err(BattleError::UnknownMessageType(message_type.clone()));
            }
            _ => {}
        }

        if !self.sessions.contains(from) {
            return Err(SessionError::NotFound(from).into());
        }
        if let Some(seq) = seq {
            if !self.sessions.accept_sequence(from, seq)? {
                tracing::debug!(%from, seq, message_type = message.message_type(), "duplicate dropped");
                return Ok(());
            }
        }

        if self.config.role == Role::Spectator {
            return self.observe(from, message);
        }

        match message {
            Message::HandshakeResponse { seed } => self.on_handshake_response(from, Some(seed)),
            Message::SpectatorResponse => self.on_handshake_response(from, None),
            Message::BattleSetup(setup) => self.on_battle_setup(from, setup),
            Message::AttackAnnounce { move_name } => self.on_attack_announce(from, move_name).await,
            Message::DefenseAnnounce => self.on_defense_announce(from).await,
            Message::CalculationReport(report) => self.on_calculation_report(from, report).await,
            Message::CalculationConfirm => self.on_turn_confirmed(from, None).await,
            Message::ResolutionRequest(request) => self.on_turn_confirmed(from, Some(request)).await,
            Message::GameOver { winner, loser } => self.on_game_over(from, winner, loser),
            Message::Chat(chat) => self.on_chat(from, chat),
            Message::HandshakeRequest | Message::SpectatorRequest | Message::Unknown { .. } => Ok(()),
        }
    }

    /// Host: a Joiner wants to battle.
    async fn on_handshake_request(&mut self, from: SocketAddr, seq: Option<u64>) -> Result<(), BattleError> {
        if self.config.role != Role::Host {
            return Err(self.unexpected(HANDSHAKE_REQUEST));
        }

        if let Some(session) = self.sessions.get(from) {
            if session.role != Role::Joiner {
                return Err(self.unexpected(HANDSHAKE_REQUEST));
            }
            // Same seed again; the sequence counter is left alone.
            let (seed, _) = self.sessions.seed_for(from)?;
            tracing::info!(peer = %from, seed, "repeated handshake, resending seed");
            self.transport
                .send(from, Envelope::new(Message::HandshakeResponse { seed }))
                .await?;
            return Ok(());
        }

        if let Some(duel) = &self.duel {
            if !duel.phase().is_terminal() {
                return Err(BattleError::HandshakeFailed(format!(
                    "already battling {}",
                    duel.opponent
                )));
            }
        }

        self.sessions.register(from, Role::Joiner)?;
        if let Some(seq) = seq {
            self.sessions.accept_sequence(from, seq)?;
        }
        let (seed, _) = self.sessions.seed_for(from)?;

        if let Err(e) = self
            .transport
            .send(from, Envelope::new(Message::HandshakeResponse { seed }))
            .await
        {
            let _ = self.sessions.remove(from);
            self.emit(PeerEvent::HandshakeFailed {
                peer: from,
                reason: e.to_string(),
            });
            return Err(e.into());
        }

        self.sessions.establish(from, Some(seed))?;
        self.duel = Some(Duel::new(from, seed));
        tracing::info!(peer = %from, seed, "handshake complete");
        self.emit(PeerEvent::HandshakeComplete { peer: from, seed });
        Ok(())
    }

    /// Host: someone wants to watch.
    async fn on_spectator_request(&mut self, from: SocketAddr, seq: Option<u64>) -> Result<(), BattleError> {
        if self.config.role != Role::Host {
            return Err(self.unexpected(SPECTATOR_REQUEST));
        }

        if let Some(session) = self.sessions.get(from) {
            if session.role != Role::Spectator {
                return Err(self.unexpected(SPECTATOR_REQUEST));
            }
            self.transport
                .send(from, Envelope::new(Message::SpectatorResponse))
                .await?;
            return Ok(());
        }

        self.sessions.register(from, Role::Spectator)?;
        if let Some(seq) = seq {
            self.sessions.accept_sequence(from, seq)?;
        }

        if let Err(e) = self
            .transport
            .send(from, Envelope::new(Message::SpectatorResponse))
            .await
        {
            let _ = self.sessions.remove(from);
            self.emit(PeerEvent::HandshakeFailed {
                peer: from,
                reason: e.to_string(),
            });
            return Err(e.into());
        }

        self.sessions.establish(from, None)?;
        tracing::info!(peer = %from, "spectator joined");
        self.emit(PeerEvent::SpectatorJoined { peer: from });
        Ok(())
    }

    /// Joiner or Spectator: the Host answered.
    fn on_handshake_response(&mut self, from: SocketAddr, seed: Option<u64>) -> Result<(), BattleError> {
        let message_type = if seed.is_some() {
            HANDSHAKE_RESPONSE
        } else {
            SPECTATOR_RESPONSE
        };
        let pending = match self.pending_handshake.take() {
            Some(pending) if pending.host == from => pending,
            other => {
                self.pending_handshake = other;
                return Err(self.unexpected(message_type));
            }
        };

        match (pending.reply, seed) {
            (HandshakeReply::Battle(reply), Some(seed)) => {
                self.sessions.establish(from, Some(seed))?;
                self.duel = Some(Duel::new(from, seed));
                tracing::info!(host = %from, seed, "handshake complete");
                self.emit(PeerEvent::HandshakeComplete { peer: from, seed });
                let _ = reply.send(Ok(seed));
            }
            (HandshakeReply::Spectate(reply), None) => {
                self.sessions.establish(from, None)?;
                tracing::info!(host = %from, "spectating");
                self.emit(PeerEvent::SpectatorJoined { peer: from });
                let _ = reply.send(Ok(()));
            }
            (reply, _) => {
                self.pending_handshake = Some(PendingHandshake { host: from, reply });
                return Err(self.unexpected(message_type));
            }
        }
        Ok(())
    }

    fn on_battle_setup(&mut self, from: SocketAddr, setup: BattleSetup) -> Result<(), BattleError> {
        let expected = self.duel.as_ref().is_some_and(|duel| {
            duel.opponent == from && duel.phase() == Phase::HandshakeDone && duel.remote.is_none()
        });
        if !expected {
            return Err(self.unexpected(BATTLE_SETUP));
        }

        let Some(entity) = self.roster.get_entity(&setup.pokemon_name) else {
            let notice = ChatMessage::text(
                SYSTEM_SENDER,
                format!("unknown pokemon `{}`, setup rejected", setup.pokemon_name),
            );
            self.spawn_sends(vec![from], &Message::Chat(notice));
            return Err(BattleError::UnknownEntity(setup.pokemon_name));
        };

        let boosts = StatBoosts {
            special_attack_uses: setup.special_attack_uses,
            special_defense_uses: setup.special_defense_uses,
        };
        tracing::info!(
            peer = %from,
            pokemon = %entity.name,
            mode = %setup.communication_mode,
            "battle setup received"
        );
        if let Some(duel) = self.duel.as_mut() {
            duel.remote = Some(Combatant::from_entity(&entity, boosts));
        }
        self.try_start_battle();
        Ok(())
    }

    /// Defender: the turn owner picked a move.
    async fn on_attack_announce(&mut self, from: SocketAddr, move_name: String) -> Result<(), BattleError> {
        let side = self.local_side(ATTACK_ANNOUNCE)?;
        let ready = self.battle(from).is_some_and(|battle| {
            battle.phase() == Phase::Ready && battle.turn_owner() == side.other()
        });
        if !ready {
            return Err(self.unexpected(ATTACK_ANNOUNCE));
        }
        if let Some(battle) = self.battle_mut(from) {
            battle.receive_attack(&move_name);
        }

        tracing::info!(peer = %from, %move_name, "incoming attack");
        self.emit(PeerEvent::AttackAnnounced {
            from,
            move_name: move_name.clone(),
        });
        self.relay(&Message::AttackAnnounce { move_name });
        self.send_turn(from, Message::DefenseAnnounce).await
    }

    /// Turn owner: the defender is ready, compute and report.
    async fn on_defense_announce(&mut self, from: SocketAddr) -> Result<(), BattleError> {
        let side = self.local_side(DEFENSE_ANNOUNCE)?;
        let computed = match self.battle(from) {
            Some(battle)
                if battle.phase() == Phase::AwaitingDefense && battle.turn_owner() == side =>
            {
                let attacker = battle.combatant(side).name.clone();
                battle.preview().map(|resolution| (resolution, attacker))
            }
            _ => None,
        };
        let Some((resolution, attacker)) = computed else {
            return Err(self.unexpected(DEFENSE_ANNOUNCE));
        };

        let report = resolution.report(&attacker);
        let event = turn_resolved(&attacker, &resolution.outcome);
        if let Some(battle) = self.battle_mut(from) {
            battle.commit(resolution);
        }
        tracing::info!(
            peer = %from,
            damage = report.damage_dealt,
            defender_hp = report.defender_hp_remaining,
            "turn computed"
        );
        self.emit(event);

        let message = Message::CalculationReport(report);
        self.send_turn(from, message.clone()).await?;
        self.relay(&message);
        Ok(())
    }

    /// Defender: check the owner's numbers against our own.
    async fn on_calculation_report(
        &mut self,
        from: SocketAddr,
        report: CalculationReport,
    ) -> Result<(), BattleError> {
        let side = self.local_side(CALCULATION_REPORT)?;
        let computed = match self.battle(from) {
            Some(battle)
                if battle.phase() == Phase::Resolving
                    && battle.turn_owner() == side.other()
                    && battle.pending_outcome().is_none() =>
            {
                let attacker = battle.combatant(side.other()).name.clone();
                battle.preview().map(|resolution| (resolution, attacker))
            }
            _ => None,
        };
        let Some((resolution, attacker)) = computed else {
            return Err(self.unexpected(CALCULATION_REPORT));
        };

        let reply = if resolution.agrees_with_report(&report) {
            Message::CalculationConfirm
        } else {
            tracing::warn!(
                peer = %from,
                reported = report.damage_dealt,
                computed = resolution.outcome.damage,
                "calculation mismatch, sending own figures"
            );
            Message::ResolutionRequest(resolution.resolution_request(&attacker))
        };
        let event = turn_resolved(&attacker, &resolution.outcome);
        if let Some(battle) = self.battle_mut(from) {
            battle.commit(resolution);
        }
        self.emit(event);
        self.relay(&Message::CalculationReport(report));

        self.send_turn(from, reply).await?;
        let over = self
            .battle_mut(from)
            .is_some_and(|battle| battle.finish_turn());
        if over {
            tracing::info!(peer = %from, "fainted, awaiting game over");
        }
        Ok(())
    }

    /// Turn owner: the defender confirmed, or answered with its own
    /// figures.
    async fn on_turn_confirmed(
        &mut self,
        from: SocketAddr,
        request: Option<ResolutionRequest>,
    ) -> Result<(), BattleError> {
        let message_type = if request.is_some() {
            RESOLUTION_REQUEST
        } else {
            CALCULATION_CONFIRM
        };
        let side = self.local_side(message_type)?;
        let agreed = match self.battle(from) {
            Some(battle) if battle.phase() == Phase::Resolving && battle.turn_owner() == side => {
                match &request {
                    Some(request) => battle.agrees_with_request(request),
                    None => battle.pending_outcome().map(|_| true),
                }
            }
            _ => None,
        };
        let Some(agreed) = agreed else {
            return Err(self.unexpected(message_type));
        };

        if !agreed {
            self.abandon(from, "peers disagree on the turn's outcome".into());
            return Ok(());
        }

        let over = self
            .battle_mut(from)
            .is_some_and(|battle| battle.finish_turn());
        if over {
            self.conclude(from).await;
        } else {
            tracing::debug!(peer = %from, "turn complete");
        }
        Ok(())
    }

    /// Defender: the owner declared the battle over.
    fn on_game_over(&mut self, from: SocketAddr, winner: String, loser: String) -> Result<(), BattleError> {
        let live = self
            .battle(from)
            .is_some_and(|battle| battle.phase() != Phase::Abandoned);
        if !live {
            return Err(self.unexpected(GAME_OVER));
        }
        if let Some(battle) = self.battle_mut(from) {
            if battle.phase() != Phase::GameOver {
                battle.declare_over(&winner, &loser);
            }
        }

        tracing::info!(peer = %from, %winner, %loser, "game over");
        let message = Message::GameOver {
            winner: winner.clone(),
            loser: loser.clone(),
        };
        self.relay(&message);
        self.emit(PeerEvent::GameOver { winner, loser });
        let _ = self.sessions.remove(from);
        Ok(())
    }

    fn on_chat(&mut self, from: SocketAddr, chat: ChatMessage) -> Result<(), BattleError> {
        tracing::info!(peer = %from, sender = %chat.sender_name, "chat");
        if self.broadcasting() {
            let mut targets = self.sessions.spectators();
            if let Some(opponent) = self
                .sessions
                .opponent()
                .filter(|session| session.is_established())
            {
                targets.push(opponent.addr);
            }
            targets.retain(|addr| *addr != from);
            self.spawn_sends(targets, &Message::Chat(chat.clone()));
        }
        self.emit(PeerEvent::Chat(chat));
        Ok(())
    }

    /// Spectator: everything after the handshake is a relay to report.
    fn observe(&mut self, from: SocketAddr, message: Message) -> Result<(), BattleError> {
        match message {
            Message::SpectatorResponse => self.on_handshake_response(from, None),
            Message::AttackAnnounce { move_name } => {
                self.emit(PeerEvent::AttackAnnounced { from, move_name });
                Ok(())
            }
            Message::CalculationReport(report) => {
                self.emit(PeerEvent::TurnResolved {
                    attacker: report.attacker,
                    move_used: report.move_used,
                    damage: report.damage_dealt,
                    attacker_hp: report.remaining_health,
                    defender_hp: report.defender_hp_remaining,
                    message: report.status_message,
                });
                Ok(())
            }
            Message::GameOver { winner, loser } => {
                self.emit(PeerEvent::GameOver { winner, loser });
                Ok(())
            }
            Message::Chat(chat) => {
                self.emit(PeerEvent::Chat(chat));
                Ok(())
            }
            other => Err(self.unexpected(other.message_type())),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Creates the battle once both setups are known.
    fn try_start_battle(&mut self) {
        let Some(side) = Side::of(self.config.role) else {
            return;
        };
        let Some(duel) = self.duel.as_mut() else {
            return;
        };
        if duel.battle.is_some() {
            return;
        }
        let (Some((local, _)), Some(remote)) = (&duel.local, &duel.remote) else {
            return;
        };

        let (a, b) = match side {
            Side::A => (local.clone(), remote.clone()),
            Side::B => (remote.clone(), local.clone()),
        };
        let battle = BattleState::new(a, b, duel.seed);
        let (opponent, seed) = (duel.opponent, battle.seed());
        let event = PeerEvent::BattleReady {
            local: local.clone(),
            remote: remote.clone(),
            your_turn: battle.turn_owner() == side,
        };
        tracing::info!(
            peer = %duel.opponent,
            local = %local.name,
            remote = %remote.name,
            "battle ready"
        );
        duel.battle = Some(battle);

        if let Ok(session) = self.sessions.get_mut(opponent) {
            session.battle_id = Some(seed);
        }
        self.emit(event);
    }

    /// Turn owner after the final blow: announce the result and close the
    /// session.
    async fn conclude(&mut self, opponent: SocketAddr) {
        let Some((battle, side)) = self
            .battle(opponent)
            .and_then(|battle| battle.winner().map(|side| (battle, side)))
        else {
            return;
        };
        let winner = battle.combatant(side).name.clone();
        let loser = battle.combatant(side.other()).name.clone();
        let message = Message::GameOver {
            winner: winner.clone(),
            loser: loser.clone(),
        };

        if let Err(e) = self
            .transport
            .send(opponent, Envelope::new(message.clone()))
            .await
        {
            tracing::warn!(peer = %opponent, error = %e, "game over not delivered");
        }
        self.relay(&message);
        tracing::info!(peer = %opponent, %winner, %loser, "game over");
        self.emit(PeerEvent::GameOver { winner, loser });
        let _ = self.sessions.remove(opponent);
    }

    /// Sends a turn message. A delivery failure gets one more full `send`;
    /// if that fails too the session is abandoned.
    async fn send_turn(&mut self, dest: SocketAddr, message: Message) -> Result<(), BattleError> {
        let result = match self
            .transport
            .send(dest, Envelope::new(message.clone()))
            .await
        {
            Err(TransportError::DeliveryFailed { .. }) => {
                tracing::warn!(
                    peer = %dest,
                    message_type = message.message_type(),
                    "delivery failed, trying once more"
                );
                self.transport.send(dest, Envelope::new(message)).await
            }
            other => other,
        };

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.abandon(dest, e.to_string());
                Err(e.into())
            }
        }
    }

    /// Gives up on `peer`: the battle becomes `Abandoned` (or is dropped if
    /// it never started) and the session is closed.
    fn abandon(&mut self, peer: SocketAddr, reason: String) {
        tracing::warn!(%peer, %reason, "session abandoned");
        let before_battle = match self.duel.as_mut() {
            Some(duel) if duel.opponent == peer => match duel.battle.as_mut() {
                Some(battle) => {
                    battle.abandon();
                    false
                }
                None => true,
            },
            _ => false,
        };
        if before_battle {
            self.duel = None;
        }
        let _ = self.sessions.remove(peer);
        self.emit(PeerEvent::SessionAbandoned { peer, reason });
    }

    /// Host in broadcast mode: forwards a message to every spectator.
    fn relay(&self, message: &Message) {
        if !self.broadcasting() {
            return;
        }
        self.spawn_sends(self.sessions.spectators(), message);
    }

    /// Whether battle and chat traffic fans out to spectators. Only a Host
    /// broadcasts, and only once its own setup chose
    /// [`CommunicationMode::Broadcast`]. Until then traffic stays between
    /// the two ends of each exchange.
    fn broadcasting(&self) -> bool {
        self.config.role == Role::Host
            && self
                .duel
                .as_ref()
                .and_then(|duel| duel.local.as_ref())
                .is_some_and(|(_, mode)| *mode == CommunicationMode::Broadcast)
    }

    /// Fire-and-forget sends. Each runs on its own task, so there is no
    /// ordering between destinations.
    fn spawn_sends(&self, targets: Vec<SocketAddr>, message: &Message) {
        for dest in targets {
            let transport = Arc::clone(&self.transport);
            let envelope = Envelope::new(message.clone());
            tokio::spawn(async move {
                if let Err(e) = transport.send(dest, envelope).await {
                    tracing::warn!(%dest, error = %e, "relay failed");
                }
            });
        }
    }

    /// Expires handshakes that were never answered.
    fn sweep(&mut self) {
        let expired = self.sessions.expire_stale();
        if expired.is_empty() {
            return;
        }
        for addr in &expired {
            if self
                .pending_handshake
                .as_ref()
                .is_some_and(|pending| pending.host == *addr)
            {
                if let Some(pending) = self.pending_handshake.take() {
                    pending
                        .reply
                        .fail(SessionError::HandshakeExpired(*addr).into());
                }
            }
            self.emit(PeerEvent::HandshakeFailed {
                peer: *addr,
                reason: "handshake timed out".into(),
            });
        }
        self.sessions.cleanup_expired();
    }

    fn phase(&self) -> Phase {
        match self.config.role {
            Role::Spectator => {
                if self.sessions.iter().any(|s| s.is_established()) {
                    Phase::HandshakeDone
                } else {
                    Phase::Init
                }
            }
            Role::Host | Role::Joiner => self.duel.as_ref().map_or(Phase::Init, Duel::phase),
        }
    }

    fn local_side(&self, operation: &'static str) -> Result<Side, BattleError> {
        Side::of(self.config.role).ok_or(BattleError::WrongRole {
            operation,
            role: self.config.role,
        })
    }

    fn battle(&self, peer: SocketAddr) -> Option<&BattleState> {
        self.duel
            .as_ref()
            .filter(|duel| duel.opponent == peer)
            .and_then(|duel| duel.battle.as_ref())
    }

    fn battle_mut(&mut self, peer: SocketAddr) -> Option<&mut BattleState> {
        self.duel
            .as_mut()
            .filter(|duel| duel.opponent == peer)
            .and_then(|duel| duel.battle.as_mut())
    }

    fn unexpected(&self, message_type: &str) -> BattleError {
        BattleError::UnexpectedStateTransition {
            message_type: message_type.to_string(),
            phase: self.phase(),
        }
    }

    fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }
}

fn turn_resolved(attacker: &str, outcome: &AttackOutcome) -> PeerEvent {
    PeerEvent::TurnResolved {
        attacker: attacker.to_string(),
        move_used: outcome.move_used.to_string(),
        damage: outcome.damage,
        attacker_hp: Some(outcome.attacker_hp),
        defender_hp: outcome.defender_hp,
        message: Some(outcome.message.clone()),
    }
}
