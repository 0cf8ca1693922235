#![deny(unsafe_code)]

//! Wire-level operation types for the rendezvous signaling protocol.
//!
//! Every frame on the signaling connection is one JSON text message of the
//! form `{"opcode": "...", "data": {...}}`. This crate defines the
//! [`Operation`] sum type (one variant per opcode, typed payload fields) and
//! the stateless [`encode`]/[`decode`] functions over that envelope. No IO
//! lives here.

use serde::{Deserialize, Serialize};

/// A signaling operation: an opcode paired with its opcode-specific payload.
///
/// Operations are immutable value messages; they have no identity beyond
/// their payload fields. Field names follow the server's camelCase wire
/// schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opcode", content = "data", rename_all = "lowercase")]
pub enum Operation {
    /// Server-issued post-connect greeting carrying the client's identity.
    Acknowledged { id: String },

    /// A session description proposed by the offerer.
    Offer { id: String, offer: String },

    /// The answerer's reply to an offer, tagged with both roles.
    Answer {
        #[serde(rename = "offererId")]
        offerer_id: String,
        #[serde(rename = "answererId")]
        answerer_id: String,
        answer: String,
    },

    /// A trickled ICE candidate, tagged with both roles.
    Candidate {
        #[serde(rename = "offererId")]
        offerer_id: String,
        #[serde(rename = "answererId")]
        answerer_id: String,
        candidate: String,
    },

    /// A peer left the rendezvous.
    Goodbye { id: String },

    /// Outcome of a bind/shutdown/connect request.
    ///
    /// `set = true` means the alias/connection was accepted, `false` means
    /// rejected or removed. `client_connection_id` is present only when the
    /// alias event is a byproduct of a connect handshake.
    Alias {
        id: String,
        alias: String,
        set: bool,
        #[serde(
            rename = "clientConnectionId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        client_connection_id: Option<String>,
    },

    /// Request to bind an alias to the client's identity.
    Bind { id: String, alias: String },

    /// Request to remove a previously bound alias.
    Shutdown { id: String, alias: String },

    /// Request to connect to a remote alias.
    Connect {
        id: String,
        #[serde(rename = "clientConnectionId")]
        client_connection_id: String,
        #[serde(rename = "remoteAlias")]
        remote_alias: String,
    },
}

impl Operation {
    /// The wire name of this operation's opcode.
    pub fn opcode(&self) -> &'static str {
        match self {
            Operation::Acknowledged { .. } => "acknowledged",
            Operation::Offer { .. } => "offer",
            Operation::Answer { .. } => "answer",
            Operation::Candidate { .. } => "candidate",
            Operation::Goodbye { .. } => "goodbye",
            Operation::Alias { .. } => "alias",
            Operation::Bind { .. } => "bind",
            Operation::Shutdown { .. } => "shutdown",
            Operation::Connect { .. } => "connect",
        }
    }
}

/// Encode an operation as one JSON text frame.
pub fn encode(op: &Operation) -> Result<String, EncodeError> {
    serde_json::to_string(op).map_err(EncodeError)
}

/// Decode one JSON text frame into an operation.
///
/// Fails if the opcode is unrecognized or payload fields are missing or
/// mistyped. Unknown extra fields are ignored.
pub fn decode(text: &str) -> Result<Operation, DecodeError> {
    serde_json::from_str(text).map_err(DecodeError)
}

/// Failed to serialize an operation.
#[derive(Debug)]
pub struct EncodeError(serde_json::Error);

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "encode operation: {}", self.0)
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Malformed or unrecognized inbound frame.
#[derive(Debug)]
pub struct DecodeError(serde_json::Error);

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "decode operation: {}", self.0)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_acknowledged() {
        let op = decode(r#"{"opcode":"acknowledged","data":{"id":"X"}}"#).unwrap();
        assert_eq!(op, Operation::Acknowledged { id: "X".into() });
    }

    #[test]
    fn decodes_alias_without_connection_id() {
        let op =
            decode(r#"{"opcode":"alias","data":{"id":"X","alias":"a","set":true}}"#).unwrap();
        assert_eq!(
            op,
            Operation::Alias {
                id: "X".into(),
                alias: "a".into(),
                set: true,
                client_connection_id: None,
            }
        );
    }

    #[test]
    fn decodes_alias_with_null_connection_id() {
        let op = decode(
            r#"{"opcode":"alias","data":{"id":"X","alias":"a","set":false,"clientConnectionId":null}}"#,
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::Alias {
                id: "X".into(),
                alias: "a".into(),
                set: false,
                client_connection_id: None,
            }
        );
    }

    #[test]
    fn decodes_alias_with_connection_id() {
        let op = decode(
            r#"{"opcode":"alias","data":{"id":"X","alias":"a","set":true,"clientConnectionId":"t-1"}}"#,
        )
        .unwrap();
        let Operation::Alias {
            client_connection_id,
            ..
        } = op
        else {
            panic!("wrong variant");
        };
        assert_eq!(client_connection_id.as_deref(), Some("t-1"));
    }

    #[test]
    fn encodes_connect_with_camel_case_fields() {
        let text = encode(&Operation::Connect {
            id: "X".into(),
            client_connection_id: "t-1".into(),
            remote_alias: "bob".into(),
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["opcode"], "connect");
        assert_eq!(value["data"]["clientConnectionId"], "t-1");
        assert_eq!(value["data"]["remoteAlias"], "bob");
    }

    #[test]
    fn encoded_alias_omits_absent_connection_id() {
        let text = encode(&Operation::Alias {
            id: "X".into(),
            alias: "a".into(),
            set: true,
            client_connection_id: None,
        })
        .unwrap();
        assert!(!text.contains("clientConnectionId"));
    }

    #[test]
    fn rejects_unknown_opcode() {
        let err = decode(r#"{"opcode":"frobnicate","data":{}}"#).unwrap_err();
        assert!(err.to_string().contains("decode operation"));
    }

    #[test]
    fn rejects_missing_payload_field() {
        assert!(decode(r#"{"opcode":"offer","data":{"id":"X"}}"#).is_err());
    }

    #[test]
    fn rejects_mistyped_payload_field() {
        assert!(decode(r#"{"opcode":"alias","data":{"id":"X","alias":"a","set":"yes"}}"#).is_err());
    }

    #[test]
    fn ignores_unknown_extra_fields() {
        let op =
            decode(r#"{"opcode":"goodbye","data":{"id":"X","extra":42}}"#).unwrap();
        assert_eq!(op, Operation::Goodbye { id: "X".into() });
    }

    #[test]
    fn answer_round_trips() {
        let op = Operation::Answer {
            offerer_id: "Y".into(),
            answerer_id: "X".into(),
            answer: "sdp".into(),
        };
        assert_eq!(decode(&encode(&op).unwrap()).unwrap(), op);
    }
}
