//! Typed messages exchanged between peers.
//!
//! Every datagram that is not an ACK carries exactly one [`Message`],
//! wrapped in an [`Envelope`] that holds the sequence number and any fields
//! this version does not understand.
//!
//! ```text
//! Envelope
//! ├── seq: Option<u64>        → "sequence_number" on the wire
//! ├── message: Message
//! │   ├── HandshakeRequest / HandshakeResponse { seed }
//! │   ├── SpectatorRequest / SpectatorResponse
//! │   ├── BattleSetup(BattleSetup)
//! │   ├── AttackAnnounce { move_name } / DefenseAnnounce
//! │   ├── CalculationReport(..) / CalculationConfirm / ResolutionRequest(..)
//! │   ├── GameOver { winner, loser }
//! │   ├── Chat(ChatMessage)
//! │   └── Unknown { message_type }
//! └── extra: Document         → unrecognized fields, kept verbatim
//! ```

use std::fmt;

use crate::{Document, ProtocolError, Value};

pub(crate) const MESSAGE_TYPE: &str = "message_type";
pub(crate) const SEQUENCE_NUMBER: &str = "sequence_number";

// Wire names of the message kinds.
pub const HANDSHAKE_REQUEST: &str = "HANDSHAKE_REQUEST";
pub const HANDSHAKE_RESPONSE: &str = "HANDSHAKE_RESPONSE";
pub const SPECTATOR_REQUEST: &str = "SPECTATOR_REQUEST";
pub const SPECTATOR_RESPONSE: &str = "SPECTATOR_RESPONSE";
pub const BATTLE_SETUP: &str = "BATTLE_SETUP";
pub const ATTACK_ANNOUNCE: &str = "ATTACK_ANNOUNCE";
pub const DEFENSE_ANNOUNCE: &str = "DEFENSE_ANNOUNCE";
pub const CALCULATION_REPORT: &str = "CALCULATION_REPORT";
pub const CALCULATION_CONFIRM: &str = "CALCULATION_CONFIRM";
pub const RESOLUTION_REQUEST: &str = "RESOLUTION_REQUEST";
pub const GAME_OVER: &str = "GAME_OVER";
pub const CHAT_MESSAGE: &str = "CHAT_MESSAGE";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A message plus its delivery metadata.
///
/// `seq` is `None` until the reliable transport stamps it. `extra` holds
/// fields a newer peer might send that this version ignores; they survive
/// a decode/encode cycle so nothing is silently lost when relaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub seq: Option<u64>,
    pub message: Message,
    pub extra: Document,
}

impl Envelope {
    /// Wraps a message with no sequence number and no extra fields.
    pub fn new(message: Message) -> Self {
        Self {
            seq: None,
            message,
            extra: Document::new(),
        }
    }

    /// The `message_type` string this envelope is sent as.
    pub fn message_type(&self) -> &str {
        self.message.message_type()
    }

    /// Flattens the envelope into wire order: `message_type`, payload
    /// fields, `sequence_number`, then extras.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new().with(MESSAGE_TYPE, self.message_type());
        self.message.write_fields(&mut doc);
        if let Some(seq) = self.seq {
            // Sequence numbers start at 1 and never get near i64::MAX.
            doc.insert(SEQUENCE_NUMBER, Value::Int(seq as i64));
        }
        for (k, v) in self.extra.iter() {
            doc.insert(k, v.clone());
        }
        doc
    }
}

impl TryFrom<Document> for Envelope {
    type Error = ProtocolError;

    fn try_from(mut doc: Document) -> Result<Self, Self::Error> {
        let message_type = doc.take_text(MESSAGE_TYPE).map_err(|_| {
            ProtocolError::MalformedMessage("missing `message_type`".into())
        })?;
        let seq = match doc.get(SEQUENCE_NUMBER) {
            Some(_) => Some(doc.take_u64(SEQUENCE_NUMBER)?),
            None => None,
        };
        let message = Message::read_fields(&message_type, &mut doc)?;
        Ok(Self {
            seq,
            message,
            extra: doc,
        })
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One variant per message kind. Payload-heavy kinds carry a struct so the
/// state machine can pass them around whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Joiner → Host: open a battle session.
    HandshakeRequest,
    /// Host → Joiner: session accepted, here is the shared seed.
    HandshakeResponse { seed: u64 },
    /// Observer → Host: register as a spectator.
    SpectatorRequest,
    /// Host → Observer: registration accepted.
    SpectatorResponse,
    BattleSetup(BattleSetup),
    /// Turn owner → opponent: this is the move I am using.
    AttackAnnounce { move_name: String },
    /// Opponent → turn owner: announcement seen, go ahead and compute.
    DefenseAnnounce,
    CalculationReport(CalculationReport),
    /// Defender → attacker: my figures agree.
    CalculationConfirm,
    ResolutionRequest(ResolutionRequest),
    GameOver { winner: String, loser: String },
    Chat(ChatMessage),
    /// A `message_type` this version does not know. Its fields stay in the
    /// envelope's `extra`.
    Unknown { message_type: String },
}

impl Message {
    /// The wire name of this message kind.
    pub fn message_type(&self) -> &str {
        match self {
            Self::HandshakeRequest => HANDSHAKE_REQUEST,
            Self::HandshakeResponse { .. } => HANDSHAKE_RESPONSE,
            Self::SpectatorRequest => SPECTATOR_REQUEST,
            Self::SpectatorResponse => SPECTATOR_RESPONSE,
            Self::BattleSetup(_) => BATTLE_SETUP,
            Self::AttackAnnounce { .. } => ATTACK_ANNOUNCE,
            Self::DefenseAnnounce => DEFENSE_ANNOUNCE,
            Self::CalculationReport(_) => CALCULATION_REPORT,
            Self::CalculationConfirm => CALCULATION_CONFIRM,
            Self::ResolutionRequest(_) => RESOLUTION_REQUEST,
            Self::GameOver { .. } => GAME_OVER,
            Self::Chat(_) => CHAT_MESSAGE,
            Self::Unknown { message_type } => message_type.as_str(),
        }
    }

    fn write_fields(&self, doc: &mut Document) {
        match self {
            Self::HandshakeRequest
            | Self::SpectatorRequest
            | Self::SpectatorResponse
            | Self::DefenseAnnounce
            | Self::CalculationConfirm
            | Self::Unknown { .. } => {}
            Self::HandshakeResponse { seed } => {
                doc.insert("seed", Value::Int(*seed as i64));
            }
            Self::BattleSetup(setup) => {
                doc.insert("communication_mode", setup.communication_mode.as_str());
                doc.insert("pokemon_name", setup.pokemon_name.as_str());
                let boosts = Document::new()
                    .with("special_attack_uses", setup.special_attack_uses)
                    .with("special_defense_uses", setup.special_defense_uses);
                doc.insert("stat_boosts", boosts);
            }
            Self::AttackAnnounce { move_name } => {
                doc.insert("move_name", move_name.as_str());
            }
            Self::CalculationReport(report) => {
                doc.insert("attacker", report.attacker.as_str());
                doc.insert("move_used", report.move_used.as_str());
                if let Some(hp) = report.remaining_health {
                    doc.insert("remaining_health", hp);
                }
                doc.insert("damage_dealt", report.damage_dealt);
                doc.insert("defender_hp_remaining", report.defender_hp_remaining);
                if let Some(status) = &report.status_message {
                    doc.insert("status_message", status.as_str());
                }
            }
            Self::ResolutionRequest(req) => {
                doc.insert("attacker", req.attacker.as_str());
                doc.insert("move_used", req.move_used.as_str());
                doc.insert("damage_dealt", req.damage_dealt);
                doc.insert("defender_hp_remaining", req.defender_hp_remaining);
                if let Some(hp) = req.remaining_health {
                    doc.insert("remaining_health", hp);
                }
            }
            Self::GameOver { winner, loser } => {
                doc.insert("winner", winner.as_str());
                doc.insert("loser", loser.as_str());
            }
            Self::Chat(chat) => {
                doc.insert("sender_name", chat.sender_name.as_str());
                match &chat.content {
                    ChatContent::Text(text) => {
                        doc.insert("content_type", "TEXT");
                        doc.insert("message_text", text.as_str());
                    }
                    ChatContent::Sticker(data) => {
                        doc.insert("content_type", "STICKER");
                        doc.insert("sticker_data", data.as_str());
                    }
                }
            }
        }
    }

    fn read_fields(message_type: &str, doc: &mut Document) -> Result<Self, ProtocolError> {
        let message = match message_type {
            HANDSHAKE_REQUEST => Self::HandshakeRequest,
            HANDSHAKE_RESPONSE => Self::HandshakeResponse {
                seed: doc.take_u64("seed")?,
            },
            SPECTATOR_REQUEST => Self::SpectatorRequest,
            SPECTATOR_RESPONSE => Self::SpectatorResponse,
            BATTLE_SETUP => {
                let communication_mode = doc.take_text("communication_mode")?.parse()?;
                let pokemon_name = doc.take_text("pokemon_name")?;
                let mut boosts = doc.take_document("stat_boosts")?;
                Self::BattleSetup(BattleSetup {
                    communication_mode,
                    pokemon_name,
                    special_attack_uses: boosts.take_u32("special_attack_uses")?,
                    special_defense_uses: boosts.take_u32("special_defense_uses")?,
                })
            }
            ATTACK_ANNOUNCE => Self::AttackAnnounce {
                move_name: doc.take_text("move_name")?,
            },
            DEFENSE_ANNOUNCE => Self::DefenseAnnounce,
            CALCULATION_REPORT => Self::CalculationReport(CalculationReport {
                attacker: doc.take_text("attacker")?,
                move_used: doc.take_text("move_used")?,
                remaining_health: doc.take_u32_opt("remaining_health")?,
                damage_dealt: doc.take_u32("damage_dealt")?,
                defender_hp_remaining: doc.take_u32("defender_hp_remaining")?,
                status_message: doc.take_text_opt("status_message")?,
            }),
            CALCULATION_CONFIRM => Self::CalculationConfirm,
            RESOLUTION_REQUEST => Self::ResolutionRequest(ResolutionRequest {
                attacker: doc.take_text("attacker")?,
                move_used: doc.take_text("move_used")?,
                damage_dealt: doc.take_u32("damage_dealt")?,
                defender_hp_remaining: doc.take_u32("defender_hp_remaining")?,
                remaining_health: doc.take_u32_opt("remaining_health")?,
            }),
            GAME_OVER => Self::GameOver {
                winner: doc.take_text("winner")?,
                loser: doc.take_text("loser")?,
            },
            CHAT_MESSAGE => {
                let sender_name = doc.take_text("sender_name")?;
                let content = match doc.take_text("content_type")?.as_str() {
                    "TEXT" => ChatContent::Text(doc.take_text("message_text")?),
                    "STICKER" => ChatContent::Sticker(doc.take_text("sticker_data")?),
                    other => {
                        return Err(ProtocolError::invalid(
                            "content_type",
                            format!("expected TEXT or STICKER, got `{other}`"),
                        ));
                    }
                };
                Self::Chat(ChatMessage {
                    sender_name,
                    content,
                })
            }
            other => Self::Unknown {
                message_type: other.to_string(),
            },
        };
        Ok(message)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// How the battle is announced to observers. The Host's choice decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommunicationMode {
    /// Traffic stays between the two battlers.
    #[default]
    P2P,
    /// The Host relays battle traffic and chat to every spectator.
    Broadcast,
}

impl CommunicationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P2P => "P2P",
            Self::Broadcast => "BROADCAST",
        }
    }
}

impl fmt::Display for CommunicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommunicationMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("P2P") {
            Ok(Self::P2P)
        } else if s.eq_ignore_ascii_case("BROADCAST") {
            Ok(Self::Broadcast)
        } else {
            Err(ProtocolError::invalid(
                "communication_mode",
                format!("expected P2P or BROADCAST, got `{s}`"),
            ))
        }
    }
}

/// A battler's choice of combatant and special-move budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleSetup {
    pub communication_mode: CommunicationMode,
    pub pokemon_name: String,
    pub special_attack_uses: u32,
    pub special_defense_uses: u32,
}

/// The attacker's figures for one resolved turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculationReport {
    pub attacker: String,
    pub move_used: String,
    /// Attacker's HP after the move (differs from before only for heals).
    pub remaining_health: Option<u32>,
    pub damage_dealt: u32,
    pub defender_hp_remaining: u32,
    pub status_message: Option<String>,
}

/// The defender's own figures, sent when they disagree with a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub attacker: String,
    pub move_used: String,
    pub damage_dealt: u32,
    pub defender_hp_remaining: u32,
    pub remaining_health: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatContent {
    Text(String),
    /// Base64 image data. Never decoded by this crate.
    Sticker(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender_name: String,
    pub content: ChatContent,
}

impl ChatMessage {
    pub fn text(sender_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            content: ChatContent::Text(text.into()),
        }
    }

    pub fn sticker(sender_name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            content: ChatContent::Sticker(data.into()),
        }
    }
}
