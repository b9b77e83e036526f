//! Distance-vector routing (spec.md §4.2): a RIP-style node that exchanges
//! full distance vectors with its neighbors, relaxes them via Bellman-Ford,
//! and advertises with split-horizon + poisoned reverse.
//!
//! Grounded in the teacher's `protocols/rip.rs` (`RipProtocol`: neighbor
//! vector storage, `recompute_routes`, `send_updates`) and in the original
//! `DVrouter.py` this spec was distilled from, generalized from the
//! teacher's `f64`-metric/`u32`-router-id space to the spec's `u32`-cost,
//! opaque-string-id, per-port model.

pub mod compute;

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::node::{NeighborTable, RouterNode, Sender};
use crate::packet::{decode_distance_vector, encode_distance_vector, Packet, PacketKind, DV_INFINITY};

/// Tunable knobs beyond the bare `(self_address, heartbeat_period_ms)`
/// constructor pair spec.md §6 mandates. `infinity` is exposed mainly so
/// tests can shrink it and watch count-to-infinity bottom out quickly.
#[derive(Debug, Clone, Copy)]
pub struct DvConfig {
    pub heartbeat_period_ms: u64,
    pub infinity: u32,
}

impl DvConfig {
    pub fn new(heartbeat_period_ms: u64) -> Self {
        Self {
            heartbeat_period_ms,
            infinity: DV_INFINITY,
        }
    }
}

/// A distance-vector routing node.
pub struct DvRouter {
    self_id: String,
    config: DvConfig,
    last_broadcast: u64,
    neighbors: NeighborTable,
    own_dv: BTreeMap<String, u32>,
    forward: BTreeMap<String, u32>,
    neighbor_vectors: BTreeMap<String, BTreeMap<String, u32>>,
}

impl DvRouter {
    pub fn new(self_id: impl Into<String>, heartbeat_period_ms: u64) -> Self {
        Self::with_config(self_id, DvConfig::new(heartbeat_period_ms))
    }

    pub fn with_config(self_id: impl Into<String>, config: DvConfig) -> Self {
        let self_id = self_id.into();
        let mut own_dv = BTreeMap::new();
        own_dv.insert(self_id.clone(), 0);
        Self {
            self_id,
            config,
            last_broadcast: 0,
            neighbors: NeighborTable::default(),
            own_dv,
            forward: BTreeMap::new(),
            neighbor_vectors: BTreeMap::new(),
        }
    }

    /// Current distance vector, for introspection (tests, the demo harness).
    pub fn distance_vector(&self) -> &BTreeMap<String, u32> {
        &self.own_dv
    }

    fn recompute(&mut self) -> bool {
        let result = compute::relax(
            &self.self_id,
            self.config.infinity,
            &self.neighbors,
            &self.neighbor_vectors,
            self.own_dv.keys().cloned(),
        );
        let changed = result.own_dv != self.own_dv || result.forward != self.forward;
        if changed {
            self.own_dv = result.own_dv;
            self.forward = result.forward;
        }
        changed
    }

    /// Build the poisoned-reverse vector advertised to `neighbor_id` on
    /// `port` (spec.md §4.2 "Advertising with poisoned reverse").
    fn advertised_vector_for(&self, neighbor_id: &str, port: u32) -> BTreeMap<String, u32> {
        self.own_dv
            .iter()
            .map(|(dest, cost)| {
                let poisoned = self.forward.get(dest) == Some(&port) && dest != neighbor_id;
                let advertised = if poisoned { self.config.infinity } else { *cost };
                (dest.clone(), advertised)
            })
            .collect()
    }

    fn send_to(&self, neighbor_id: &str, port: u32, sender: &mut dyn Sender) {
        let vector = self.advertised_vector_for(neighbor_id, port);
        let content = encode_distance_vector(&vector);
        sender.send(port, Packet::routing(self.self_id.clone(), neighbor_id, content));
    }

    fn broadcast(&self, sender: &mut dyn Sender) {
        let targets: Vec<(String, u32)> = self
            .neighbors
            .iter()
            .map(|(id, link)| (id.clone(), link.port))
            .collect();
        for (id, port) in targets {
            self.send_to(&id, port, sender);
        }
    }
}

/// Clamp every entry of a raw (just-decoded) vector to `[0, infinity)`,
/// replacing anything else with `infinity` (spec.md §4.2 "Sanitization of
/// received vectors").
pub fn sanitize_vector(
    raw: &BTreeMap<String, serde_json::Value>,
    infinity: u32,
) -> BTreeMap<String, u32> {
    raw.iter()
        .map(|(dest, value)| {
            let cost = value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .filter(|v| *v < infinity)
                .unwrap_or(infinity);
            (dest.clone(), cost)
        })
        .collect()
}

impl RouterNode for DvRouter {
    fn on_packet(&mut self, port: u32, packet: &Packet, sender: &mut dyn Sender) {
        match packet.kind {
            PacketKind::Data => {
                if let Some(&out_port) = self.forward.get(&packet.dst) {
                    sender.send(out_port, packet.clone());
                } else {
                    trace!(dst = %packet.dst, "dv: drop unroutable data packet");
                }
            }
            PacketKind::Routing => {
                if !self.neighbors.is_on_port(&packet.src, port) {
                    debug!(src = %packet.src, port, "dv: drop stranger routing packet");
                    return;
                }

                let raw = match decode_distance_vector(&packet.content) {
                    Ok(raw) => raw,
                    Err(err) => {
                        debug!(src = %packet.src, %err, "dv: drop malformed routing packet");
                        return;
                    }
                };
                let sanitized = sanitize_vector(&raw, self.config.infinity);

                if self.neighbor_vectors.get(&packet.src) == Some(&sanitized) {
                    return;
                }
                self.neighbor_vectors.insert(packet.src.clone(), sanitized);

                if self.recompute() {
                    self.broadcast(sender);
                }
            }
        }
    }

    fn on_new_link(&mut self, port: u32, endpoint: &str, cost: u32, sender: &mut dyn Sender) {
        self.neighbors.insert(endpoint, port, cost);
        self.neighbor_vectors
            .entry(endpoint.to_string())
            .or_insert_with(|| BTreeMap::from([(endpoint.to_string(), 0)]));

        if self.recompute() {
            self.broadcast(sender);
        } else {
            self.send_to(endpoint, port, sender);
        }
    }

    fn on_remove_link(&mut self, port: u32, sender: &mut dyn Sender) {
        let Some((removed_id, _link)) = self.neighbors.remove_by_port(port) else {
            return;
        };
        self.neighbor_vectors.remove(&removed_id);

        let stale_dests: Vec<String> = self
            .forward
            .iter()
            .filter(|(_, &bound_port)| bound_port == port)
            .map(|(dest, _)| dest.clone())
            .collect();
        for dest in &stale_dests {
            self.forward.remove(dest);
            self.own_dv.remove(dest);
        }

        if self.recompute() {
            self.broadcast(sender);
        }
    }

    fn on_tick(&mut self, time_ms: u64, sender: &mut dyn Sender) {
        if time_ms >= self.last_broadcast + self.config.heartbeat_period_ms {
            self.last_broadcast = time_ms;
            self.broadcast(sender);
        }
    }

    fn forward_table(&self) -> BTreeMap<String, u32> {
        self.forward.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(u32, Packet)>,
    }

    impl Sender for Recorder {
        fn send(&mut self, port: u32, packet: Packet) {
            self.sent.push((port, packet));
        }
    }

    #[test]
    fn new_link_with_no_change_sends_only_to_new_neighbor() {
        let mut router = DvRouter::new("a", 1000);
        let mut out = Recorder::default();
        router.on_new_link(1, "b", 5, &mut out);
        assert_eq!(out.sent.len(), 1);
        assert_eq!(out.sent[0].0, 1);
        assert_eq!(router.distance_vector().get("b"), Some(&5));
    }

    #[test]
    fn remove_unbound_port_is_noop() {
        let mut router = DvRouter::new("a", 1000);
        let mut out = Recorder::default();
        router.on_remove_link(9, &mut out);
        assert!(out.sent.is_empty());
    }

    #[test]
    fn remove_link_purges_forward_before_recompute() {
        let mut router = DvRouter::new("a", 1000);
        let mut out = Recorder::default();
        router.on_new_link(1, "b", 1, &mut out);

        // b advertises reachability to c at cost 1, so a learns c via b.
        let mut vector = BTreeMap::new();
        vector.insert("b".to_string(), serde_json::json!(0));
        vector.insert("c".to_string(), serde_json::json!(1));
        let sanitized = sanitize_vector(
            &vector
                .into_iter()
                .collect::<BTreeMap<String, serde_json::Value>>(),
            16,
        );
        router.neighbor_vectors.insert("b".to_string(), sanitized);
        router.recompute();
        assert_eq!(router.forward_table().get("c"), Some(&1));

        out.sent.clear();
        router.on_remove_link(1, &mut out);
        assert!(router.forward_table().get("c").is_none());
        assert!(router.distance_vector().get("c").is_none());
    }

    #[test]
    fn on_tick_broadcasts_at_most_once_for_the_same_time_twice() {
        let mut router = DvRouter::new("a", 1000);
        let mut out = Recorder::default();
        router.on_new_link(1, "b", 1, &mut out);
        out.sent.clear();

        router.on_tick(5_000, &mut out);
        assert_eq!(out.sent.len(), 1);

        out.sent.clear();
        router.on_tick(5_000, &mut out);
        assert!(out.sent.is_empty(), "repeating the same time_ms is not itself a new heartbeat boundary");
    }

    #[test]
    fn on_tick_respects_heartbeat_gap() {
        let mut router = DvRouter::new("a", 1000);
        let mut out = Recorder::default();
        router.on_new_link(1, "b", 1, &mut out);
        router.on_tick(0, &mut out);
        out.sent.clear();

        router.on_tick(500, &mut out);
        assert!(out.sent.is_empty(), "tick before heartbeat boundary sends nothing");

        router.on_tick(1_000, &mut out);
        assert_eq!(out.sent.len(), 1);
    }

    #[test]
    fn poisoned_reverse_advertises_next_hop_destination_as_infinity() {
        // a - b - c, cost 1 each. a's route to c goes via b (port 1).
        let mut router = DvRouter::new("a", 1000);
        let mut out = Recorder::default();
        router.on_new_link(1, "b", 1, &mut out);

        let mut vec_from_b = BTreeMap::new();
        vec_from_b.insert("b".to_string(), serde_json::json!(0));
        vec_from_b.insert("c".to_string(), serde_json::json!(1));
        router.neighbor_vectors.insert(
            "b".to_string(),
            sanitize_vector(&vec_from_b, 16),
        );
        router.recompute();

        let advertised_to_b = router.advertised_vector_for("b", 1);
        assert_eq!(advertised_to_b.get("c"), Some(&16));
    }

    #[test]
    fn sanitize_vector_is_idempotent() {
        let mut raw = BTreeMap::new();
        raw.insert("a".to_string(), serde_json::json!(3));
        raw.insert("b".to_string(), serde_json::json!(-1));
        raw.insert("c".to_string(), serde_json::json!(99));
        raw.insert("d".to_string(), serde_json::json!("nope"));

        let once = sanitize_vector(&raw, 16);
        let once_as_value: BTreeMap<String, serde_json::Value> = once
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::json!(v)))
            .collect();
        let twice = sanitize_vector(&once_as_value, 16);
        assert_eq!(once, twice);
        assert_eq!(once.get("b"), Some(&16));
        assert_eq!(once.get("c"), Some(&16));
        assert_eq!(once.get("d"), Some(&16));
        assert_eq!(once.get("a"), Some(&3));
    }
}
