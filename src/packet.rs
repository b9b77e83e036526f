//! The packet shape and wire codecs routing packets ride on.
//!
//! Packet *structure* is nominally an external collaborator (spec.md §6: "the
//! transport-level packet structure ... is out of scope"), but both protocol
//! families need a concrete type to dispatch on, so this module defines the
//! narrow shape the simulator is expected to hand in: a kind tag, the two
//! opaque endpoint identifiers, and an opaque text payload.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::DecodeError;

/// What a [`Packet`] carries: ordinary data, or a routing-protocol update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Data,
    Routing,
}

/// A packet as handed to [`crate::node::RouterNode::on_packet`].
///
/// `content` is opaque to the forwarding path; only the protocol that owns a
/// `Routing` packet interprets it, via [`encode_distance_vector`] /
/// [`decode_distance_vector`] or [`Lsp::encode`] / [`Lsp::decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub kind: PacketKind,
    pub src: String,
    pub dst: String,
    pub content: String,
}

impl Packet {
    pub fn data(src: impl Into<String>, dst: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: PacketKind::Data,
            src: src.into(),
            dst: dst.into(),
            content: content.into(),
        }
    }

    pub fn routing(src: impl Into<String>, dst: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: PacketKind::Routing,
            src: src.into(),
            dst: dst.into(),
            content: content.into(),
        }
    }

    /// True iff this is a data packet — spec.md §6's "`is_traceroute` flag
    /// interchangeable with kind" rendered as a method instead of a second
    /// field, since the two are never independently true in this crate.
    pub fn is_traceroute(&self) -> bool {
        matches!(self.kind, PacketKind::Data)
    }
}

/// DV infinity constant (spec.md §3): costs at or above this are unreachable.
pub const DV_INFINITY: u32 = 16;

/// Encode a sanitized distance vector as `{"dest": cost, ...}`.
pub fn encode_distance_vector(vector: &BTreeMap<String, u32>) -> String {
    serde_json::to_string(vector).expect("BTreeMap<String, u32> always serializes")
}

/// Decode a DV routing-packet payload into its raw JSON number space.
///
/// Sanitization (clamping non-finite/negative/overlarge costs to
/// [`DV_INFINITY`]) is the caller's job — see [`crate::dv::sanitize_vector`] —
/// because the spec treats "parse" and "sanitize" as distinct steps with
/// distinct drop/clamp policies.
pub fn decode_distance_vector(content: &str) -> Result<BTreeMap<String, Value>, DecodeError> {
    let value: Value =
        serde_json::from_str(content).map_err(|err| DecodeError::InvalidJson(err.to_string()))?;
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(DecodeError::NotAnObject),
    }
}

/// A Link-State Packet: one node's self-advertisement, tagged with a
/// sequence number (spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lsp {
    pub origin: String,
    pub seq: i64,
    pub links: BTreeMap<String, u32>,
}

impl Lsp {
    pub fn encode(&self) -> String {
        let mut obj = serde_json::Map::new();
        obj.insert("origin".to_string(), Value::String(self.origin.clone()));
        obj.insert("seq".to_string(), Value::from(self.seq));
        let links: serde_json::Map<String, Value> = self
            .links
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(*v)))
            .collect();
        obj.insert("links".to_string(), Value::Object(links));
        serde_json::to_string(&Value::Object(obj)).expect("closed shape always serializes")
    }

    pub fn decode(content: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|err| DecodeError::InvalidJson(err.to_string()))?;
        let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;

        let origin = obj
            .get("origin")
            .ok_or(DecodeError::MissingField("origin"))?
            .as_str()
            .ok_or(DecodeError::WrongFieldType("origin"))?
            .to_string();

        let seq = obj
            .get("seq")
            .ok_or(DecodeError::MissingField("seq"))?
            .as_i64()
            .ok_or(DecodeError::WrongFieldType("seq"))?;

        let raw_links = obj
            .get("links")
            .ok_or(DecodeError::MissingField("links"))?
            .as_object()
            .ok_or(DecodeError::WrongFieldType("links"))?;

        let mut links = BTreeMap::new();
        for (neighbor, cost) in raw_links {
            let cost = cost
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or(DecodeError::WrongFieldType("links"))?;
            links.insert(neighbor.clone(), cost);
        }

        Ok(Self { origin, seq, links })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_is_traceroute_matches_kind() {
        let data = Packet::data("a", "b", "");
        let routing = Packet::routing("a", "b", "");
        assert!(data.is_traceroute());
        assert!(!routing.is_traceroute());
    }

    #[test]
    fn distance_vector_round_trips() {
        let mut vector = BTreeMap::new();
        vector.insert("a".to_string(), 0_u32);
        vector.insert("b".to_string(), 4_u32);
        let encoded = encode_distance_vector(&vector);
        let decoded = decode_distance_vector(&encoded).expect("valid json");
        assert_eq!(decoded.get("a").and_then(Value::as_u64), Some(0));
        assert_eq!(decoded.get("b").and_then(Value::as_u64), Some(4));
    }

    #[test]
    fn distance_vector_rejects_non_object() {
        let err = decode_distance_vector("[1,2,3]").unwrap_err();
        assert_eq!(err, DecodeError::NotAnObject);
    }

    #[test]
    fn distance_vector_rejects_garbage() {
        let err = decode_distance_vector("not json").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)));
    }

    #[test]
    fn lsp_round_trips() {
        let lsp = Lsp {
            origin: "A".to_string(),
            seq: 3,
            links: BTreeMap::from([("B".to_string(), 1_u32), ("C".to_string(), 2_u32)]),
        };
        let encoded = lsp.encode();
        let decoded = Lsp::decode(&encoded).expect("valid lsp");
        assert_eq!(decoded, lsp);
    }

    #[test]
    fn lsp_decode_rejects_missing_field() {
        let err = Lsp::decode(r#"{"origin":"A","seq":1}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("links"));
    }

    #[test]
    fn lsp_decode_rejects_wrong_seq_type() {
        let err = Lsp::decode(r#"{"origin":"A","seq":"x","links":{}}"#).unwrap_err();
        assert_eq!(err, DecodeError::WrongFieldType("seq"));
    }
}
