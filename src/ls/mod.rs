//! Link-state routing (spec.md §4.3): an OSPF-style node that floods its own
//! adjacency as a sequenced LSP, maintains a link-state database keyed by
//! originator, and recomputes shortest paths via Dijkstra whenever the
//! database changes.
//!
//! Grounded in the teacher's `protocols/link_state.rs` / `protocols/ospf.rs`
//! (LSDB storage, flood-on-change, SPF recompute trigger) and in the
//! original `LSrouter.py` this spec was distilled from, generalized from the
//! teacher's numeric router-id / `f64`-metric space to opaque string ids and
//! `u32` costs.

pub mod compute;

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::node::{NeighborTable, RouterNode, Sender};
use crate::packet::{Lsp, Packet, PacketKind};

/// A link-state routing node.
pub struct LsRouter {
    self_id: String,
    heartbeat_period_ms: u64,
    last_broadcast: u64,
    neighbors: NeighborTable,
    /// Link-state database: originator -> (sequence number, its links).
    lsdb: BTreeMap<String, (i64, BTreeMap<String, u32>)>,
    own_seq: i64,
    forward: BTreeMap<String, u32>,
}

impl LsRouter {
    pub fn new(self_id: impl Into<String>, heartbeat_period_ms: u64) -> Self {
        let self_id = self_id.into();
        let mut lsdb = BTreeMap::new();
        lsdb.insert(self_id.clone(), (0_i64, BTreeMap::new()));
        Self {
            self_id,
            heartbeat_period_ms,
            last_broadcast: 0,
            neighbors: NeighborTable::default(),
            lsdb,
            own_seq: 0,
            forward: BTreeMap::new(),
        }
    }

    /// Current link-state database, for introspection (tests, the demo
    /// harness).
    pub fn lsdb(&self) -> &BTreeMap<String, (i64, BTreeMap<String, u32>)> {
        &self.lsdb
    }

    fn own_links(&self) -> BTreeMap<String, u32> {
        self.neighbors
            .iter()
            .map(|(id, link)| (id.clone(), link.cost))
            .collect()
    }

    fn recompute(&mut self) {
        let graph = compute::build_graph(&self.lsdb);
        self.forward = compute::forwarding_table(&self.self_id, &graph, &self.neighbors);
    }

    /// Re-derive and re-store this node's own LSP after an adjacency change
    /// (spec.md §4.3 "own-LSP lifecycle": every adjacency change bumps the
    /// sequence number and rewrites the LSDB entry for self).
    fn republish_own_lsp(&mut self) {
        self.own_seq += 1;
        let links = self.own_links();
        self.lsdb.insert(self.self_id.clone(), (self.own_seq, links));
        self.recompute();
    }

    fn own_lsp_content(&self) -> String {
        let (seq, links) = self
            .lsdb
            .get(&self.self_id)
            .cloned()
            .unwrap_or((self.own_seq, BTreeMap::new()));
        Lsp {
            origin: self.self_id.clone(),
            seq,
            links,
        }
        .encode()
    }

    /// Send this node's own current LSP to every neighbor.
    fn flood_own(&self, sender: &mut dyn Sender) {
        let content = self.own_lsp_content();
        let targets: Vec<(String, u32)> = self
            .neighbors
            .iter()
            .map(|(id, link)| (id.clone(), link.port))
            .collect();
        for (id, port) in targets {
            sender.send(port, Packet::routing(self.self_id.clone(), id, content.clone()));
        }
    }

    /// Re-send a just-accepted LSP payload to every neighbor except the one
    /// it arrived from (spec.md §4.3 "flood to all neighbors except the
    /// inbound port").
    fn flood_except(&self, inbound_port: u32, content: &str, sender: &mut dyn Sender) {
        let targets: Vec<(String, u32)> = self
            .neighbors
            .iter()
            .filter(|(_, link)| link.port != inbound_port)
            .map(|(id, link)| (id.clone(), link.port))
            .collect();
        for (id, port) in targets {
            sender.send(port, Packet::routing(self.self_id.clone(), id, content.to_string()));
        }
    }
}

impl RouterNode for LsRouter {
    fn on_packet(&mut self, port: u32, packet: &Packet, sender: &mut dyn Sender) {
        match packet.kind {
            PacketKind::Data => {
                if let Some(&out_port) = self.forward.get(&packet.dst) {
                    sender.send(out_port, packet.clone());
                } else {
                    trace!(dst = %packet.dst, "ls: drop unroutable data packet");
                }
            }
            PacketKind::Routing => {
                let lsp = match Lsp::decode(&packet.content) {
                    Ok(lsp) => lsp,
                    Err(err) => {
                        debug!(src = %packet.src, %err, "ls: drop malformed lsp");
                        return;
                    }
                };

                let is_fresh = match self.lsdb.get(&lsp.origin) {
                    Some((stored_seq, _)) => lsp.seq > *stored_seq,
                    None => true,
                };
                if !is_fresh {
                    trace!(origin = %lsp.origin, seq = lsp.seq, "ls: drop stale lsp");
                    return;
                }

                self.lsdb.insert(lsp.origin.clone(), (lsp.seq, lsp.links.clone()));
                self.recompute();
                self.flood_except(port, &packet.content, sender);
            }
        }
    }

    fn on_new_link(&mut self, port: u32, endpoint: &str, cost: u32, sender: &mut dyn Sender) {
        self.neighbors.insert(endpoint, port, cost);
        self.republish_own_lsp();
        self.flood_own(sender);
    }

    fn on_remove_link(&mut self, port: u32, sender: &mut dyn Sender) {
        let Some(_removed) = self.neighbors.remove_by_port(port) else {
            return;
        };
        self.republish_own_lsp();
        self.flood_own(sender);
    }

    fn on_tick(&mut self, time_ms: u64, sender: &mut dyn Sender) {
        if time_ms >= self.last_broadcast + self.heartbeat_period_ms {
            self.last_broadcast = time_ms;
            self.flood_own(sender);
        }
    }

    fn forward_table(&self) -> BTreeMap<String, u32> {
        self.forward.clone()
    }
}
