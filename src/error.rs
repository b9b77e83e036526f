//! Decode-time error taxonomy for routing-packet content.
//!
//! Every variant here corresponds to one of the drop policies in the
//! `MalformedPacket` / `StrangerPacket` / `StaleLSP` bucket: none of them are
//! fatal, and none of them propagate past the [`crate::node::RouterNode`]
//! boundary — they exist so callers can log *why* a packet was dropped.

use thiserror::Error;

/// Why a routing-packet payload failed to become protocol state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("field `{0}` is missing")]
    MissingField(&'static str),
    #[error("field `{0}` has the wrong type")]
    WrongFieldType(&'static str),
}
