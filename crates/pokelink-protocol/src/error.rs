//! Error types for the protocol layer.
//!
//! Each crate in Pokelink defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in the bytes themselves, not in
//! delivery or battle rules.

/// Errors that can occur in the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The datagram carries no `message_type` field (or is not a message
    /// at all). Such datagrams are dropped without a reply.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A recognized message kind is missing a required field, or the field
    /// has the wrong shape (e.g. `seed: abc`).
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    /// Rendering a nested document failed.
    #[error("encode failed: {0}")]
    Encode(String),
}

impl ProtocolError {
    pub(crate) fn missing(field: &'static str) -> Self {
        Self::InvalidField {
            field,
            reason: "missing".into(),
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
