use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use petgraph::{Graph, Direction, graph::NodeIndex};
use petgraph::algo::has_path_connecting;
use petgraph::dot::Dot;
use petgraph::visit::EdgeRef;
use serde::Deserialize;
use tracing::debug;
use crate::error::ConfigurationError;
use crate::Label;

/// Tolerance used when checking that a distribution sums to one
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// state -> (action -> cost)
pub type StateActionCosts<S, A> = BTreeMap<S, BTreeMap<A, f64>>;
/// action -> (next state -> probability)
pub type ActionDistributions<A, S> = BTreeMap<A, BTreeMap<S, f64>>;

/// Edge label of the MDP multigraph. The weight belongs to the whole (state, action) family,
/// every edge of one family carries the same value.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<A> {
    pub action: A,
    pub probability: f64,
    pub weight: f64,
}

impl<A: fmt::Debug> fmt::Display for Transition<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} p={} w={}", self.action, self.probability, self.weight)
    }
}

/// Domain data in the two-table format, as read from a json model file e.g.
/// ```json
/// {
///   "state_actions": {"home": {"bike": -45.0}, "work": {"done": 0.0}},
///   "action_states": {"bike": {"work": 1.0}, "done": {"work": 1.0}},
///   "start": "home",
///   "end": "work"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    pub state_actions: StateActionCosts<String, String>,
    pub action_states: ActionDistributions<String, String>,
    pub start: String,
    pub end: String,
}

impl ModelSpec {
    pub fn build(&self) -> Result<MDP<String, String>, ConfigurationError> {
        MDP::from_tables(&self.state_actions, &self.action_states)
    }
}

/// Markov Decision Process stored as a directed multigraph. States are nodes and every
/// (state, action, next state) triple is one edge.
#[derive(Debug, Clone)]
pub struct MDP<S: Label, A: Label> {
    graph: Graph<S, Transition<A>>,
    index: HashMap<S, NodeIndex>,
}

impl<S: Label, A: Label> Default for MDP<S, A> {
    fn default() -> Self {
        MDP::new()
    }
}

impl<S: Label, A: Label> MDP<S, A> {
    pub fn new() -> MDP<S, A> {
        MDP {
            graph: Graph::new(),
            index: HashMap::new(),
        }
    }

    /// Builds an MDP from the two-table format. For every state, every action offered at the
    /// state and every next state of that action's distribution one edge is added with the
    /// state's cost for the action and the action's probability for the next state.
    pub fn from_tables(
        state_actions: &StateActionCosts<S, A>,
        action_states: &ActionDistributions<A, S>,
    ) -> Result<MDP<S, A>, ConfigurationError> {
        let mut mdp = MDP::new();
        for state in state_actions.keys() {
            mdp.add_state(state.clone());
        }
        for (state, actions) in state_actions.iter() {
            for (action, cost) in actions.iter() {
                let distribution = action_states.get(action).ok_or_else(|| {
                    ConfigurationError::MissingDistribution {
                        state: format!("{:?}", state),
                        action: format!("{:?}", action),
                    }
                })?;
                let mut sum = 0.0;
                for (next_state, p) in distribution.iter() {
                    if !p.is_finite() || *p < 0.0 {
                        return Err(ConfigurationError::InvalidProbability {
                            state: format!("{:?}", state),
                            action: format!("{:?}", action),
                            next_state: format!("{:?}", next_state),
                            probability: *p,
                        });
                    }
                    sum += p;
                }
                if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
                    return Err(ConfigurationError::InvalidDistribution {
                        state: format!("{:?}", state),
                        action: format!("{:?}", action),
                        sum,
                    });
                }
                for (next_state, p) in distribution.iter() {
                    mdp.add_transition(state, action.clone(), next_state, *p, *cost);
                }
            }
        }
        debug!(states = mdp.len(), edges = mdp.graph.edge_count(), "built MDP from tables");
        Ok(mdp)
    }

    /// Adds a state if it is not already present and returns its node
    pub fn add_state(&mut self, state: S) -> NodeIndex {
        if let Some(ix) = self.index.get(&state) {
            return *ix;
        }
        let ix = self.graph.add_node(state.clone());
        self.index.insert(state, ix);
        ix
    }

    /// Adds the edge `from -action-> to`. Both states are created on demand. Inserting the same
    /// (from, action, to) triple twice accumulates the probability on the existing edge.
    pub fn add_transition(&mut self, from: &S, action: A, to: &S, probability: f64, weight: f64) {
        let from_ix = self.add_state(from.clone());
        let to_ix = self.add_state(to.clone());
        let existing = self.graph.edges(from_ix)
            .find(|e| e.target() == to_ix && e.weight().action == action)
            .map(|e| e.id());
        match existing {
            Some(e) => { self.graph[e].probability += probability; }
            None => {
                self.graph.add_edge(from_ix, to_ix, Transition { action, probability, weight });
            }
        }
    }

    pub fn states(&self) -> impl Iterator<Item = &S> + '_ {
        self.graph.node_indices().map(move |ix| &self.graph[ix])
    }

    pub fn contains(&self, state: &S) -> bool {
        self.index.contains_key(state)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node_index(&self, state: &S) -> Option<NodeIndex> {
        self.index.get(state).copied()
    }

    pub fn graph(&self) -> &Graph<S, Transition<A>> {
        &self.graph
    }

    /// Outgoing edges of a state as (next state, transition) pairs. Unknown states have none.
    pub fn edges<'a>(&'a self, state: &S) -> impl Iterator<Item = (&'a S, &'a Transition<A>)> + 'a {
        let ix = self.node_index(state);
        ix.into_iter()
            .flat_map(move |ix| self.graph.edges(ix))
            .map(move |e| (&self.graph[e.target()], e.weight()))
    }

    /// Actions of a state with their next-state distributions. An unknown state, or a state
    /// without outgoing edges, yields an empty map; callers must check for emptiness.
    pub fn actions(&self, state: &S) -> BTreeMap<A, BTreeMap<S, f64>> {
        let mut actions: BTreeMap<A, BTreeMap<S, f64>> = BTreeMap::new();
        for (next_state, t) in self.edges(state) {
            *actions.entry(t.action.clone()).or_default()
                .entry(next_state.clone()).or_insert(0.0) += t.probability;
        }
        actions
    }

    /// The weight of `state -action-> next_state`. Without a next state any edge of the action
    /// family is used. `None` if no such edge exists.
    pub fn weight(&self, state: &S, action: &A, next_state: Option<&S>) -> Option<f64> {
        self.edges(state)
            .find(|(s, t)| t.action == *action && next_state.map_or(true, |n| *s == n))
            .map(|(_, t)| t.weight)
    }

    /// Whether `to` can be reached from `from` along any path. `None` if either state is not
    /// part of the model.
    pub fn connectivity(&self, from: &S, to: &S) -> Option<bool> {
        let from_ix = self.node_index(from)?;
        let to_ix = self.node_index(to)?;
        Some(has_path_connecting(&self.graph, from_ix, to_ix, None))
    }

    /// All states with a path to at least one of the targets, the targets included.
    /// Unknown targets are ignored.
    pub fn backward_reachable<'a, I>(&self, targets: I) -> HashSet<NodeIndex>
        where I: IntoIterator<Item = &'a S>, S: 'a
    {
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        for t in targets {
            if let Some(ix) = self.node_index(t) {
                if seen.insert(ix) {
                    queue.push_back(ix);
                }
            }
        }
        while let Some(ix) = queue.pop_front() {
            for pred in self.graph.neighbors_directed(ix, Direction::Incoming) {
                if seen.insert(pred) {
                    queue.push_back(pred);
                }
            }
        }
        seen
    }

    /// Returns the first (state, action, sum) whose distribution does not add up to one
    pub fn check_distributions(&self) -> Option<(S, A, f64)> {
        for state in self.states() {
            for (action, distribution) in self.actions(state) {
                let sum: f64 = distribution.values().sum();
                if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
                    return Some((state.clone(), action, sum));
                }
            }
        }
        None
    }

    /// Graphviz rendering of the model
    pub fn to_dot(&self) -> String {
        let labelled = self.graph.map(|_, s| format!("{:?}", s), |_, t| format!("{}", t));
        format!("{}", Dot::new(&labelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environments::commute;

    fn two_tables() -> (StateActionCosts<&'static str, &'static str>, ActionDistributions<&'static str, &'static str>) {
        let mut s2a = BTreeMap::new();
        s2a.insert("home", vec![("go", -1.0)].into_iter().collect());
        s2a.insert("work", vec![("done", 0.0)].into_iter().collect());
        let mut a2s = BTreeMap::new();
        a2s.insert("go", vec![("work", 1.0)].into_iter().collect());
        a2s.insert("done", vec![("work", 1.0)].into_iter().collect());
        (s2a, a2s)
    }

    #[test]
    fn tables_build_one_edge_per_next_state() {
        let mdp = commute::commute().unwrap();
        assert_eq!(mdp.len(), 7);
        let home = mdp.actions(&"home".to_string());
        assert_eq!(home.len(), 3);
        assert_eq!(home["car"].len(), 3);
        assert_eq!(mdp.weight(&"home".to_string(), &"car".to_string(), None), Some(-1.0));
        assert_eq!(
            mdp.weight(&"home".to_string(), &"car".to_string(), Some(&"heavy_traffic".to_string())),
            Some(-1.0)
        );
        assert!(mdp.check_distributions().is_none());
    }

    #[test]
    fn unknown_state_queries_are_weak_failures() {
        let (s2a, a2s) = two_tables();
        let mdp = MDP::from_tables(&s2a, &a2s).unwrap();
        assert!(mdp.actions(&"moon").is_empty());
        assert_eq!(mdp.weight(&"moon", &"go", None), None);
        assert_eq!(mdp.weight(&"home", &"fly", None), None);
        assert_eq!(mdp.weight(&"home", &"go", Some(&"home")), None);
        assert_eq!(mdp.connectivity(&"moon", &"work"), None);
    }

    #[test]
    fn connectivity_follows_edge_direction() {
        let (s2a, a2s) = two_tables();
        let mdp = MDP::from_tables(&s2a, &a2s).unwrap();
        assert_eq!(mdp.connectivity(&"home", &"work"), Some(true));
        assert_eq!(mdp.connectivity(&"work", &"home"), Some(false));
        let back = mdp.backward_reachable(&["work"]);
        assert_eq!(back.len(), 2);
        let back = mdp.backward_reachable(&["home"]);
        assert_eq!(back.len(), 1);
    }

    #[test]
    fn missing_distribution_is_rejected() {
        let (mut s2a, a2s) = two_tables();
        s2a.get_mut("home").unwrap().insert("teleport", -1.0);
        let err = MDP::from_tables(&s2a, &a2s).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingDistribution { .. }));
    }

    #[test]
    fn distribution_must_sum_to_one() {
        let (s2a, mut a2s) = two_tables();
        a2s.insert("go", vec![("work", 0.5), ("home", 0.4)].into_iter().collect());
        let err = MDP::from_tables(&s2a, &a2s).unwrap_err();
        match err {
            ConfigurationError::InvalidDistribution { sum, .. } => assert!((sum - 0.9).abs() < 1e-12),
            e => panic!("unexpected error {:?}", e),
        }
        a2s.insert("go", vec![("work", 1.5), ("home", -0.5)].into_iter().collect());
        let err = MDP::from_tables(&s2a, &a2s).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidProbability { .. }));
    }

    #[test]
    fn repeated_transitions_accumulate() {
        let mut mdp: MDP<u32, u32> = MDP::new();
        for _ in 0..3 {
            mdp.add_transition(&0, 1, &1, 1.0 / 3.0, -1.0);
        }
        assert_eq!(mdp.graph().edge_count(), 1);
        assert!(mdp.check_distributions().is_none());
    }

    #[test]
    fn dot_lists_every_state() {
        let (s2a, a2s) = two_tables();
        let mdp = MDP::from_tables(&s2a, &a2s).unwrap();
        let dot = mdp.to_dot();
        assert!(dot.contains("home"));
        assert!(dot.contains("work"));
    }
}
