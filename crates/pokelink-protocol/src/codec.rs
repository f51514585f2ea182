//! Codec trait and the line-oriented wire format.
//!
//! A "codec" (coder/decoder) converts between envelopes and raw bytes. The
//! transport only needs something that implements [`Codec`]; the battle
//! layer never sees bytes at all.
//!
//! [`LineCodec`] is the one format peers speak today: UTF-8 text, one
//! `key: value` field per line. Acknowledgments are a separate, reserved
//! frame (`ACK:<seq>`) that is never confused with a message because it has
//! no `": "` separator.

use crate::types::MESSAGE_TYPE;
use crate::{Document, Envelope, ProtocolError, Value};

/// Prefix of the acknowledgment frame, followed by the decimal sequence
/// number being acknowledged.
pub const ACK_PREFIX: &str = "ACK:";

/// What a single datagram turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// `ACK:<seq>`. Consumed by the transport, never surfaced.
    Ack(u64),
    /// Any other message.
    Message(Envelope),
}

/// Converts envelopes and ACK frames to bytes and back.
///
/// `Send + Sync + 'static` because the codec lives inside the transport,
/// which is shared between the listener task and the state machine task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes an envelope.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if a nested document cannot be
    /// rendered.
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes a message datagram.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedMessage`] if there is no `message_type`,
    /// [`ProtocolError::InvalidField`] if a known kind is missing a field.
    fn decode(&self, data: &[u8]) -> Result<Envelope, ProtocolError>;

    /// Serializes the acknowledgment for `seq`.
    fn encode_ack(&self, seq: u64) -> Vec<u8>;

    /// Like [`decode`](Self::decode), but also recognizes ACK frames.
    fn decode_packet(&self, data: &[u8]) -> Result<Packet, ProtocolError>;
}

// ---------------------------------------------------------------------------
// LineCodec
// ---------------------------------------------------------------------------

/// The `key: value` text format.
///
/// ## Example
///
/// ```rust
/// use pokelink_protocol::{Codec, Envelope, LineCodec, Message, Packet};
///
/// let codec = LineCodec;
///
/// let mut envelope = Envelope::new(Message::AttackAnnounce {
///     move_name: "Thunderbolt".into(),
/// });
/// envelope.seq = Some(7);
///
/// let bytes = codec.encode(&envelope).unwrap();
/// assert_eq!(
///     String::from_utf8(bytes.clone()).unwrap(),
///     "message_type: ATTACK_ANNOUNCE\nmove_name: Thunderbolt\nsequence_number: 7\n"
/// );
/// assert_eq!(codec.decode(&bytes).unwrap(), envelope);
///
/// assert_eq!(codec.decode_packet(b"ACK:7").unwrap(), Packet::Ack(7));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

impl Codec for LineCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        let mut out = String::new();
        for (key, value) in envelope.to_document().iter() {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&value.render()?);
            out.push('\n');
        }
        Ok(out.into_bytes())
    }

    fn decode(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        let doc = decode_document(data)?;
        Envelope::try_from(doc)
    }

    fn encode_ack(&self, seq: u64) -> Vec<u8> {
        format!("{ACK_PREFIX}{seq}").into_bytes()
    }

    fn decode_packet(&self, data: &[u8]) -> Result<Packet, ProtocolError> {
        if let Some(seq) = parse_ack(data) {
            return Ok(Packet::Ack(seq));
        }
        self.decode(data).map(Packet::Message)
    }
}

/// Splits a datagram into an ordered [`Document`] without interpreting
/// any message kind.
///
/// Each line is split at its first `": "`. Lines without the separator are
/// ignored and a trailing `\r` is stripped, so CRLF senders work too. Every
/// value goes through [`Value::parse`].
///
/// # Errors
/// [`ProtocolError::MalformedMessage`] if the bytes are not UTF-8 or no
/// `message_type` field is present.
pub fn decode_document(data: &[u8]) -> Result<Document, ProtocolError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| ProtocolError::MalformedMessage(format!("not UTF-8: {e}")))?;

    let mut doc = Document::new();
    for line in text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some((key, value)) = line.split_once(": ") {
            doc.insert(key, Value::parse(value));
        }
    }

    if doc.get(MESSAGE_TYPE).is_none() {
        return Err(ProtocolError::MalformedMessage(
            "missing `message_type`".into(),
        ));
    }
    Ok(doc)
}

fn parse_ack(data: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(data).ok()?;
    let digits = text.trim_end().strip_prefix(ACK_PREFIX)?;
    digits.trim().parse().ok()
}
