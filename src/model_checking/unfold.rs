//! Product construction of an MDP with an accumulated-budget dimension.
//!
//! A budget-constrained question "reach T from s0 with accumulated weight >= length" becomes a
//! plain reachability question on a finite MDP whose states are (state, budget) pairs. Edges whose
//! best case can no longer meet the threshold are redirected to the absorbing [`UnfoldedState::Bot`].
//!
//! Termination relies on the weights pushing the accumulated value towards the threshold, i.e.
//! no cycle of non-negative total reward can be followed forever without hitting the pruning
//! bound. With [`Pruning::ShortestPath`] cycles of positive reward are detected up front, and
//! [`UnfoldConfig::max_states`] bounds the product in every mode.

use std::collections::BTreeSet;
use std::fmt;
use ordered_float::OrderedFloat;
use serde::Deserialize;
use tracing::{debug, info};
use crate::error::{Error, Result};
use crate::model_checking::helper_methods::shortest_distances_to_targets;
use crate::model_checking::mdp::MDP;
use crate::Label;

pub type Budget = OrderedFloat<f64>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnfoldedState<S> {
    /// Budget exhausted, the constraint can no longer be met
    Bot,
    Pair(S, Budget),
}

impl<S> UnfoldedState<S> {
    pub fn new(state: S, value: f64) -> UnfoldedState<S> {
        UnfoldedState::Pair(state, OrderedFloat(value))
    }

    pub fn state(&self) -> Option<&S> {
        match self {
            UnfoldedState::Bot => None,
            UnfoldedState::Pair(s, _) => Some(s)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            UnfoldedState::Bot => None,
            UnfoldedState::Pair(_, v) => Some(v.into_inner())
        }
    }
}

impl<S: fmt::Debug> fmt::Display for UnfoldedState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnfoldedState::Bot => write!(f, "BOT"),
            UnfoldedState::Pair(s, v) => write!(f, "({:?},{})", s, v)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnfoldedAction<A> {
    /// Self-loop of BOT, and of targets that have no terminal action of their own
    Loop,
    Take(A),
}

impl<A: fmt::Debug> fmt::Display for UnfoldedAction<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnfoldedAction::Loop => write!(f, "loop"),
            UnfoldedAction::Take(a) => write!(f, "{:?}", a)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pruning {
    /// Cut an edge as soon as the accumulated value drops below the threshold
    Threshold,
    /// Cut an edge when even the shortest remaining path to a target misses the threshold
    ShortestPath,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UnfoldConfig {
    pub pruning: Pruning,
    /// Upper bound on the number of unfolded states, BOT included
    pub max_states: usize,
    /// Budget value attached to the source state
    pub init_value: f64,
}

impl Default for UnfoldConfig {
    fn default() -> Self {
        UnfoldConfig {
            pruning: Pruning::ShortestPath,
            max_states: 1_000_000,
            init_value: 0.0,
        }
    }
}

pub struct UnfoldedMDP<S: Label, A: Label> {
    pub mdp: MDP<UnfoldedState<S>, UnfoldedAction<A>>,
    pub targets: BTreeSet<UnfoldedState<S>>,
    pub initial: UnfoldedState<S>,
}

impl<S: Label, A: Label> UnfoldedMDP<S, A> {
    /// Unfolds `mdp` from `source` towards `targets` keeping only the pairs whose accumulated
    /// value can still end at or above `length`.
    pub fn new(mdp: &MDP<S, A>, source: &S, targets: &BTreeSet<S>, length: f64, config: &UnfoldConfig)
        -> Result<UnfoldedMDP<S, A>>
    {
        let remaining = match config.pruning {
            Pruning::ShortestPath => Some(shortest_distances_to_targets(mdp, targets)?),
            Pruning::Threshold => None
        };
        let admissible = |next_state: &S, next_value: f64| -> bool {
            match &remaining {
                None => next_value >= length,
                Some(d) => {
                    let best = d.get(next_state).copied().unwrap_or(f64::INFINITY);
                    next_value - best >= length
                }
            }
        };

        let mut unfolded: MDP<UnfoldedState<S>, UnfoldedAction<A>> = MDP::new();
        let mut unfolded_targets: BTreeSet<UnfoldedState<S>> = BTreeSet::new();
        let bot = UnfoldedState::Bot;
        unfolded.add_transition(&bot, UnfoldedAction::Loop, &bot, 1.0, 0.0);

        let initial = UnfoldedState::new(source.clone(), config.init_value);
        unfolded.add_state(initial.clone());
        let mut stack: Vec<(S, f64)> = vec![(source.clone(), config.init_value)];
        while let Some((state, value)) = stack.pop() {
            let here = UnfoldedState::new(state.clone(), value);
            if targets.contains(&state) {
                unfolded_targets.insert(here.clone());
                let mut terminal = false;
                for (action, distribution) in mdp.actions(&state) {
                    if distribution.contains_key(&state) {
                        unfolded.add_transition(&here, UnfoldedAction::Take(action), &here, 1.0, 0.0);
                        terminal = true;
                    }
                }
                if !terminal {
                    unfolded.add_transition(&here, UnfoldedAction::Loop, &here, 1.0, 0.0);
                }
                continue;
            }
            for (next_state, t) in mdp.edges(&state) {
                let next_value = value + t.weight;
                if admissible(next_state, next_value) {
                    let there = UnfoldedState::new(next_state.clone(), next_value);
                    if !unfolded.contains(&there) {
                        if unfolded.len() >= config.max_states {
                            return Err(Error::UnfoldingLimit { limit: config.max_states });
                        }
                        unfolded.add_state(there.clone());
                        stack.push((next_state.clone(), next_value));
                    }
                    unfolded.add_transition(&here, UnfoldedAction::Take(t.action.clone()), &there,
                                            t.probability, t.weight);
                } else {
                    unfolded.add_transition(&here, UnfoldedAction::Take(t.action.clone()), &bot,
                                            t.probability, t.weight);
                }
            }
        }
        info!(states = unfolded.len(), targets = unfolded_targets.len(), "unfolded MDP");
        debug!(edges = unfolded.graph().edge_count(), pruning = ?config.pruning, length, "unfolding done");
        Ok(UnfoldedMDP {
            mdp: unfolded,
            targets: unfolded_targets,
            initial,
        })
    }
}
