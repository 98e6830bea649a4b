use std::collections::{BTreeSet, HashMap, HashSet};
use petgraph::Graph;
use petgraph::graph::NodeIndex;
use petgraph::algo::bellman_ford;
use petgraph::visit::EdgeRef;
use tracing::trace;
use crate::error::{Error, Result};
use crate::model_checking::mdp::MDP;
use crate::Label;

/// Edge length used by the shortest-path oracle. Weights are rewards, so a cost of 3 is a
/// weight of -3 and a length of 3; a larger reward is a shorter edge.
pub fn edge_length(weight: f64) -> f64 {
    -weight
}

/// For every state of `mdp`, the length of the shortest path to the closest target, lengths
/// taken from [`edge_length`]. States that cannot reach any target map to `f64::INFINITY`.
///
/// One Bellman-Ford pass is run per target over the reversed length graph, which yields the
/// target columns of the all-pairs table. Paths stop at the first target they meet, so edges
/// leaving a target are left out. A negative-length cycle (a cycle of positive total reward
/// avoiding the targets) is reported as [`Error::NonMonotoneBudget`].
pub fn shortest_distances_to_targets<S: Label, A: Label>(mdp: &MDP<S, A>, targets: &BTreeSet<S>)
    -> Result<HashMap<S, f64>>
{
    let g = mdp.graph();
    // node indices of `reversed` coincide with those of `g`
    let mut reversed: Graph<(), f64> = Graph::with_capacity(g.node_count(), g.edge_count());
    for _ in g.node_indices() {
        reversed.add_node(());
    }
    let target_ixs: HashSet<NodeIndex> = targets.iter().filter_map(|t| mdp.node_index(t)).collect();
    for e in g.edge_references().filter(|e| !target_ixs.contains(&e.source())) {
        reversed.add_edge(e.target(), e.source(), edge_length(e.weight().weight));
    }

    let mut distances: HashMap<S, f64> = mdp.states().map(|s| (s.clone(), f64::INFINITY)).collect();
    for target in targets.iter() {
        let t_ix = match mdp.node_index(target) {
            None => continue,
            Some(x) => x
        };
        let (dist, _) = bellman_ford(&reversed, t_ix).map_err(|_| Error::NonMonotoneBudget {
            target: format!("{:?}", target),
        })?;
        for ix in g.node_indices() {
            let best = distances.entry(g[ix].clone()).or_insert(f64::INFINITY);
            if dist[ix.index()] < *best {
                *best = dist[ix.index()];
            }
        }
        trace!(target = ?target, "shortest path column computed");
    }
    Ok(distances)
}
