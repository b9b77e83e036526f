//! One Bellman-Ford relaxation step over the current neighbor table and the
//! last-received neighbor vectors (spec.md §4.2 "Relaxation").

use std::collections::{BTreeMap, BTreeSet};

use crate::node::NeighborTable;

/// Result of a single relaxation pass: the node's own distance vector
/// (always includes `{self: 0}`, every cost strictly below `infinity`) and
/// the matching forwarding table (destination -> outbound port).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaxResult {
    pub own_dv: BTreeMap<String, u32>,
    pub forward: BTreeMap<String, u32>,
}

/// Run the relaxation described in spec.md §4.2.
///
/// `previous_dests` supplies any destinations the caller's last own_dv knew
/// about, so a destination that every neighbor has stopped advertising (and
/// that is no longer a direct neighbor) is still considered and correctly
/// drops out of the result, rather than silently lingering because nothing
/// in the current inputs mentions it.
pub fn relax(
    self_id: &str,
    infinity: u32,
    neighbors: &NeighborTable,
    neighbor_vectors: &BTreeMap<String, BTreeMap<String, u32>>,
    previous_dests: impl IntoIterator<Item = String>,
) -> RelaxResult {
    let mut destinations: BTreeSet<String> = BTreeSet::new();
    destinations.insert(self_id.to_string());
    destinations.extend(previous_dests);
    destinations.extend(neighbors.ids().cloned());
    for vector in neighbor_vectors.values() {
        destinations.extend(vector.keys().cloned());
    }

    let mut own_dv = BTreeMap::new();
    own_dv.insert(self_id.to_string(), 0_u32);
    let mut forward = BTreeMap::new();

    for dest in destinations {
        if dest == self_id {
            continue;
        }

        let mut best_cost = infinity;
        let mut best_port = None;

        for (neighbor_id, link) in neighbors.iter() {
            let advertised = neighbor_vectors
                .get(neighbor_id)
                .and_then(|vector| vector.get(&dest))
                .copied()
                .unwrap_or(infinity);
            let candidate = link.cost.saturating_add(advertised).min(infinity);
            if candidate < best_cost {
                best_cost = candidate;
                best_port = Some(link.port);
            }
        }

        if let Some(port) = best_port {
            if best_cost < infinity {
                own_dv.insert(dest, best_cost);
                forward.insert(dest, port);
            }
        }
    }

    RelaxResult { own_dv, forward }
}
