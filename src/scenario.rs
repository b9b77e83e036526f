//! A minimal in-process topology harness and scenario-file loader.
//!
//! The discrete-event simulator and wire transport that drive a
//! [`RouterNode`] in production are external collaborators; this module
//! exists only so the demo binary and the integration tests have something
//! to wire nodes together with, without reaching for a real transport.
//! Grounded in the teacher's `runtime/config.rs` (raw-then-validated
//! deserialize structs, `anyhow::Context`-wrapped file loading) and
//! `runtime/daemon.rs` (the event-loop shape: drain a queue of inbound work
//! until empty, then advance time).

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::dv::DvRouter;
use crate::ls::LsRouter;
use crate::node::{RouterNode, Sender};
use crate::packet::Packet;

#[derive(Debug, Deserialize)]
pub struct LinkConfig {
    pub a: String,
    pub a_port: u32,
    pub b: String,
    pub b_port: u32,
    pub cost: u32,
}

fn default_heartbeat_period_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize)]
pub struct ScenarioConfig {
    /// `"dv"` or `"ls"`.
    pub protocol: String,
    #[serde(default = "default_heartbeat_period_ms")]
    pub heartbeat_period_ms: u64,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

/// Load a scenario description from a YAML file.
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig> {
    let raw_text = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file {}", path.display()))?;
    serde_yaml::from_str(&raw_text).context("failed to parse scenario yaml")
}

/// Construct a fully wired [`Harness`] from a loaded [`ScenarioConfig`].
pub fn build_harness(config: &ScenarioConfig) -> Result<Harness> {
    let mut node_ids: BTreeSet<String> = BTreeSet::new();
    for link in &config.links {
        node_ids.insert(link.a.clone());
        node_ids.insert(link.b.clone());
    }

    let mut harness = Harness::new();
    for id in &node_ids {
        let node: Box<dyn RouterNode> = match config.protocol.as_str() {
            "dv" => Box::new(DvRouter::new(id.clone(), config.heartbeat_period_ms)),
            "ls" => Box::new(LsRouter::new(id.clone(), config.heartbeat_period_ms)),
            other => bail!("unknown protocol `{other}`, expected `dv` or `ls`"),
        };
        harness.add_node(id.clone(), node);
    }
    for link in &config.links {
        harness.add_link(&link.a, link.a_port, &link.b, link.b_port, link.cost);
    }
    Ok(harness)
}

/// A [`Sender`] that resolves `(node_id, port)` to the peer on the other end
/// of the link and enqueues the packet for later delivery, rather than
/// delivering it inline — this keeps every `on_*` call's reentrant sends
/// confined to a plain breadth-first drain instead of deep recursion.
struct Relay<'a> {
    node_id: &'a str,
    topology: &'a BTreeMap<(String, u32), (String, u32)>,
    queue: &'a mut VecDeque<(String, u32, Packet)>,
}

impl Sender for Relay<'_> {
    fn send(&mut self, port: u32, packet: Packet) {
        if let Some((peer_id, peer_port)) = self.topology.get(&(self.node_id.to_string(), port)) {
            self.queue.push_back((peer_id.clone(), *peer_port, packet));
        }
    }
}

/// An in-process topology of [`RouterNode`]s connected by a static port
/// table, with a single in-flight delivery queue drained to a fixpoint after
/// every externally triggered event.
pub struct Harness {
    nodes: BTreeMap<String, Box<dyn RouterNode>>,
    topology: BTreeMap<(String, u32), (String, u32)>,
    queue: VecDeque<(String, u32, Packet)>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            topology: BTreeMap::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn add_node(&mut self, id: impl Into<String>, node: Box<dyn RouterNode>) {
        self.nodes.insert(id.into(), node);
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    pub fn forward_table(&self, id: &str) -> Option<BTreeMap<String, u32>> {
        self.nodes.get(id).map(|node| node.forward_table())
    }

    /// Wire `a`/`a_port` to `b`/`b_port` at `cost`, fire `on_new_link` on
    /// both endpoints, and drain the resulting cascade of updates.
    pub fn add_link(&mut self, a: &str, a_port: u32, b: &str, b_port: u32, cost: u32) {
        self.topology
            .insert((a.to_string(), a_port), (b.to_string(), b_port));
        self.topology
            .insert((b.to_string(), b_port), (a.to_string(), a_port));

        self.fire_new_link(a, a_port, b, cost);
        self.fire_new_link(b, b_port, a, cost);
        self.drain();
    }

    /// Tear down whichever link is bound to `node`/`port`, fire
    /// `on_remove_link` on both endpoints, and drain the cascade.
    pub fn remove_link(&mut self, node: &str, port: u32) {
        let Some((peer_id, peer_port)) = self.topology.remove(&(node.to_string(), port)) else {
            return;
        };
        self.topology.remove(&(peer_id.clone(), peer_port));

        self.fire_remove_link(node, port);
        self.fire_remove_link(&peer_id, peer_port);
        self.drain();
    }

    /// Fire `on_tick` on every node (in id order) at `time_ms`, then drain.
    pub fn tick(&mut self, time_ms: u64) {
        let ids: Vec<String> = self.nodes.keys().cloned().collect();
        for id in ids {
            let Self {
                nodes,
                topology,
                queue,
            } = self;
            if let Some(node) = nodes.get_mut(&id) {
                let mut relay = Relay {
                    node_id: &id,
                    topology,
                    queue,
                };
                node.on_tick(time_ms, &mut relay);
            }
        }
        self.drain();
    }

    fn fire_new_link(&mut self, node_id: &str, port: u32, endpoint: &str, cost: u32) {
        let Self {
            nodes,
            topology,
            queue,
        } = self;
        if let Some(node) = nodes.get_mut(node_id) {
            let mut relay = Relay {
                node_id,
                topology,
                queue,
            };
            node.on_new_link(port, endpoint, cost, &mut relay);
        }
    }

    fn fire_remove_link(&mut self, node_id: &str, port: u32) {
        let Self {
            nodes,
            topology,
            queue,
        } = self;
        if let Some(node) = nodes.get_mut(node_id) {
            let mut relay = Relay {
                node_id,
                topology,
                queue,
            };
            node.on_remove_link(port, &mut relay);
        }
    }

    fn drain(&mut self) {
        while let Some((node_id, port, packet)) = self.queue.pop_front() {
            let Self {
                nodes,
                topology,
                queue,
            } = self;
            if let Some(node) = nodes.get_mut(&node_id) {
                let mut relay = Relay {
                    node_id: &node_id,
                    topology,
                    queue,
                };
                node.on_packet(port, &packet, &mut relay);
            }
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_converges_from_link_events_alone() {
        let mut harness = Harness::new();
        harness.add_node("a", Box::new(DvRouter::new("a", 1000)));
        harness.add_node("b", Box::new(DvRouter::new("b", 1000)));
        harness.add_node("c", Box::new(DvRouter::new("c", 1000)));

        harness.add_link("a", 1, "b", 1, 1);
        harness.add_link("b", 2, "c", 1, 1);
        harness.add_link("a", 2, "c", 2, 1);

        assert_eq!(harness.forward_table("a").unwrap().get("b"), Some(&1));
        assert_eq!(harness.forward_table("a").unwrap().get("c"), Some(&2));
        assert_eq!(harness.forward_table("b").unwrap().get("a"), Some(&1));
        assert_eq!(harness.forward_table("c").unwrap().get("a"), Some(&2));
    }

    #[test]
    fn remove_link_converges_to_the_remaining_path() {
        let mut harness = Harness::new();
        harness.add_node("a", Box::new(DvRouter::new("a", 1000)));
        harness.add_node("b", Box::new(DvRouter::new("b", 1000)));
        harness.add_node("c", Box::new(DvRouter::new("c", 1000)));
        harness.add_link("a", 1, "b", 1, 1);
        harness.add_link("b", 2, "c", 1, 1);

        assert_eq!(harness.forward_table("a").unwrap().get("c"), Some(&1));

        harness.remove_link("b", 2);
        assert!(harness.forward_table("a").unwrap().get("c").is_none());
        assert!(harness.forward_table("b").unwrap().get("c").is_none());
    }

    #[test]
    fn ls_triangle_converges_from_link_events_alone() {
        let mut harness = Harness::new();
        harness.add_node("a", Box::new(LsRouter::new("a", 1000)));
        harness.add_node("b", Box::new(LsRouter::new("b", 1000)));
        harness.add_node("c", Box::new(LsRouter::new("c", 1000)));

        harness.add_link("a", 1, "b", 1, 1);
        harness.add_link("b", 2, "c", 1, 1);
        harness.add_link("a", 2, "c", 2, 1);

        assert_eq!(harness.forward_table("a").unwrap().get("b"), Some(&1));
        assert_eq!(harness.forward_table("a").unwrap().get("c"), Some(&2));
        assert_eq!(harness.forward_table("b").unwrap().get("c"), Some(&2));
    }
}
