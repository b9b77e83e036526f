//! Undirected-graph construction and Dijkstra over the link-state database
//! (spec.md §4.3 "Route computation").
//!
//! Grounded in the teacher's `route_compute/algorithms/dijkstra/mod.rs`
//! (lazy-deletion min-heap, stale-pop suppression via a freshness check on
//! pop) and `route_compute/frontier.rs` (`DistanceFrontier`), generalized
//! from `f64` metrics over `u32` node ids to `u32` metrics over opaque
//! string node ids, and simplified from ECMP/LFA/incremental-SPF bookkeeping
//! down to plain single-source shortest paths plus first-hop extraction.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::node::NeighborTable;

/// Adjacency built from the LSDB: node -> (neighbor -> collapsed cost).
pub type Graph = BTreeMap<String, BTreeMap<String, u32>>;

/// Fold a link-state database into the undirected graph spec.md §4.3
/// describes: "for every LSP in the LSDB and every (neighbor, cost) pair in
/// its links, add an undirected edge; where two LSPs disagree on a link's
/// cost, the edge weight is the minimum of the two".
pub fn build_graph(lsdb: &BTreeMap<String, (i64, BTreeMap<String, u32>)>) -> Graph {
    let mut graph: Graph = BTreeMap::new();
    for (origin, (_seq, links)) in lsdb {
        for (neighbor, cost) in links {
            relax_edge(&mut graph, origin, neighbor, *cost);
            relax_edge(&mut graph, neighbor, origin, *cost);
        }
    }
    graph
}

fn relax_edge(graph: &mut Graph, from: &str, to: &str, cost: u32) {
    let entry = graph.entry(from.to_string()).or_default();
    let slot = entry.entry(to.to_string()).or_insert(cost);
    if cost < *slot {
        *slot = cost;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    node: String,
    cost: u32,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `dist[n]` is the shortest distance from the source to `n`;
/// `predecessor[n]` is the node immediately before `n` on that path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShortestPaths {
    pub dist: BTreeMap<String, u32>,
    pub predecessor: BTreeMap<String, String>,
}

/// Single-source Dijkstra, with popped entries that are no longer the best
/// known distance for their node silently discarded (spec.md §4.3: "a pop
/// whose recorded cost exceeds the node's current best distance is stale and
/// is dropped rather than relaxed").
pub fn shortest_paths(source: &str, graph: &Graph) -> ShortestPaths {
    let mut dist: BTreeMap<String, u32> = BTreeMap::new();
    let mut predecessor: BTreeMap<String, String> = BTreeMap::new();
    let mut heap: BinaryHeap<QueueEntry> = BinaryHeap::new();

    dist.insert(source.to_string(), 0);
    heap.push(QueueEntry {
        node: source.to_string(),
        cost: 0,
    });

    while let Some(QueueEntry { node: u, cost: cost_u }) = heap.pop() {
        match dist.get(&u) {
            Some(&best) if cost_u > best => continue,
            _ => {}
        }

        if let Some(neighbors) = graph.get(&u) {
            for (v, edge_cost) in neighbors {
                let candidate = cost_u.saturating_add(*edge_cost);
                let better = match dist.get(v) {
                    Some(&best) => candidate < best,
                    None => true,
                };
                if better {
                    dist.insert(v.clone(), candidate);
                    predecessor.insert(v.clone(), u.clone());
                    heap.push(QueueEntry {
                        node: v.clone(),
                        cost: candidate,
                    });
                }
            }
        }
    }

    ShortestPaths { dist, predecessor }
}

/// Walk `predecessor` back from `dest` until the node whose predecessor is
/// `source` is found; that node is the first hop (spec.md §4.3 "Next-hop
/// extraction"). Returns `None` if `dest` is unreachable or `dest == source`.
fn first_hop(source: &str, dest: &str, predecessor: &BTreeMap<String, String>) -> Option<String> {
    if dest == source {
        return None;
    }
    let mut current = dest.to_string();
    loop {
        let prev = predecessor.get(&current)?;
        if prev == source {
            return Some(current);
        }
        current = prev.clone();
    }
}

/// Build the forwarding table for `self_id` from a freshly computed shortest
/// path tree: destinations whose extracted first hop is not a presently
/// bound neighbor are omitted, since the LSDB may still describe an
/// adjacency the neighbor table has already dropped.
pub fn forwarding_table(
    self_id: &str,
    graph: &Graph,
    neighbors: &NeighborTable,
) -> BTreeMap<String, u32> {
    let paths = shortest_paths(self_id, graph);
    let mut forward = BTreeMap::new();
    for dest in paths.dist.keys() {
        let Some(hop) = first_hop(self_id, dest, &paths.predecessor) else {
            continue;
        };
        if let Some(link) = neighbors.get(&hop) {
            forward.insert(dest.clone(), link.port);
        }
    }
    forward
}
