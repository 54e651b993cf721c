//! Error types for the protocol layer.
//!
//! Every variant's `Display` text is sent verbatim to clients inside an
//! `ErrorResponse`, so the wording here is part of the wire contract.

/// Errors that can occur while encoding, decoding, or validating messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes or JSON).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame is not a well-formed envelope at all.
    #[error("unable to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope's `type` tag is not part of the client catalog.
    #[error("{0} is an invalid message type")]
    UnknownType(String),

    /// A `Game/...` tag that doesn't have exactly one subtype segment.
    #[error(
        "{0} is an invalid Game message type, it should be of the format \
         'Game/<game-message-type>'"
    )]
    InvalidGameType(String),

    /// The tag is known but `contents` doesn't match the payload shape.
    #[error("unable to parse {kind}: {source}")]
    InvalidContents {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// An identifier that isn't a well-formed UUID.
    #[error("{value} is not a valid {kind} ID")]
    InvalidId { kind: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_message_names_the_tag() {
        let err = ProtocolError::UnknownType("Foo".into());
        assert_eq!(err.to_string(), "Foo is an invalid message type");
    }

    #[test]
    fn test_invalid_game_type_explains_format() {
        let err = ProtocolError::InvalidGameType("Game/a/b".into());
        let text = err.to_string();
        assert!(text.starts_with("Game/a/b is an invalid Game message type"));
        assert!(text.contains("'Game/<game-message-type>'"));
    }

    #[test]
    fn test_invalid_id_message() {
        let err = ProtocolError::InvalidId {
            kind: "player",
            value: "nope".into(),
        };
        assert_eq!(err.to_string(), "nope is not a valid player ID");
    }
}
