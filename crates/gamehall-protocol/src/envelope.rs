//! The `{type, contents}` envelope that wraps every message on the wire.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

/// A concrete message kind with a fixed wire tag.
///
/// Each payload struct in the catalog implements this, which ties the
/// struct to exactly one `type` string.
pub trait Message: Serialize {
    /// The envelope `type` tag for this kind.
    const TYPE: &'static str;
}

/// The top-level message wrapper. Every frame in both directions is one
/// `Envelope`:
///
/// ```text
/// { "type": "LobbyStartGameRequest", "contents": { "game": "tictactoe" } }
/// ```
///
/// `contents` stays untyped here; it's decoded into the payload struct once
/// the tag has been checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The message tag, e.g. `LobbyJoinRequest` or `Game/MakeMoveRequest`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Kind-specific payload. Missing `contents` decodes as `null`.
    #[serde(default)]
    pub contents: Value,
}

impl Envelope {
    /// Builds an envelope from a raw tag and payload.
    pub fn new(kind: impl Into<String>, contents: Value) -> Self {
        Self {
            kind: kind.into(),
            contents,
        }
    }

    /// Wraps a typed message, tagging it with the message's `TYPE`.
    pub fn of<M: Message>(message: &M) -> Result<Self, ProtocolError> {
        let contents =
            serde_json::to_value(message).map_err(ProtocolError::Encode)?;
        Ok(Self::new(M::TYPE, contents))
    }

    /// Prefixes the tag with a namespace: `MakeMoveBroadcast` becomes
    /// `Game/MakeMoveBroadcast`.
    pub fn namespaced(mut self, namespace: &str) -> Self {
        self.kind = format!("{namespace}/{}", self.kind);
        self
    }

    /// Decodes `contents` as the payload of message kind `M`.
    ///
    /// Empty payload structs accept a missing or `null` `contents`.
    pub fn decode_as<M: Message + DeserializeOwned>(
        &self,
    ) -> Result<M, ProtocolError> {
        decode_contents(M::TYPE, &self.contents)
    }
}

/// Decodes an untyped payload into `T`, treating `null` as `{}`.
///
/// Game services use this for `Game/<subtype>` contents, where the tag
/// has already been stripped.
pub fn decode_contents<T: DeserializeOwned>(
    kind: &'static str,
    contents: &Value,
) -> Result<T, ProtocolError> {
    let value = match contents {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value)
        .map_err(|source| ProtocolError::InvalidContents { kind, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        n: u32,
    }

    impl Message for Ping {
        const TYPE: &'static str = "Ping";
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Empty {}

    impl Message for Empty {
        const TYPE: &'static str = "Empty";
    }

    #[test]
    fn test_envelope_json_shape() {
        let env = Envelope::of(&Ping { n: 3 }).unwrap();
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json, json!({ "type": "Ping", "contents": { "n": 3 } }));
    }

    #[test]
    fn test_missing_contents_defaults_to_null() {
        let env: Envelope =
            serde_json::from_str(r#"{ "type": "Empty" }"#).unwrap();
        assert_eq!(env.contents, Value::Null);
        assert_eq!(env.decode_as::<Empty>().unwrap(), Empty {});
    }

    #[test]
    fn test_decode_as_reports_kind_on_shape_mismatch() {
        let env = Envelope::new("Ping", json!({ "n": "three" }));
        let err = env.decode_as::<Ping>().unwrap_err();
        assert!(err.to_string().starts_with("unable to parse Ping"));
    }

    #[test]
    fn test_namespaced_prefixes_tag() {
        let env = Envelope::of(&Ping { n: 1 }).unwrap().namespaced("Game");
        assert_eq!(env.kind, "Game/Ping");
        assert_eq!(env.contents, json!({ "n": 1 }));
    }
}
