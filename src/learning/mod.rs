//! Expected-reward learners on an unmodified MDP: synchronous value iteration and the two
//! sample-based estimators, Q-learning and every-visit Monte Carlo control.

use std::collections::BTreeMap;
use serde::Deserialize;

pub mod sampling;
pub mod value_iteration;
pub mod q_learning;
pub mod monte_carlo;

/// Action values, state -> action -> value
pub type QTable<S, A> = BTreeMap<S, BTreeMap<A, f64>>;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Learning rate, Q-learning only
    pub alpha: f64,
    /// Discount factor
    pub gamma: f64,
    /// Initial exploration rate
    pub epsilon: f64,
    pub eps_min: f64,
    /// Applied to epsilon once per episode
    pub eps_decay: f64,
    /// Episodes for the sampling learners, sweeps for value iteration
    pub episodes: usize,
    /// Hard cutoff on the length of one episode
    pub max_steps: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig {
            alpha: 0.01,
            gamma: 1.0,
            epsilon: 1.0,
            eps_min: 0.1,
            eps_decay: 0.9,
            episodes: 50,
            max_steps: 1000,
        }
    }
}

impl LearnerConfig {
    /// Exploration rate for the episode after one running with `epsilon`
    pub fn decay(&self, epsilon: f64) -> f64 {
        self.eps_min.max(epsilon * self.eps_decay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeStats {
    pub steps: usize,
    pub total_reward: f64,
    /// The step cutoff ended the episode before the end state was reached
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct Learned<S: crate::Label, A: crate::Label> {
    pub q: QTable<S, A>,
    pub policy: crate::Policy<S, A>,
    pub episodes: Vec<EpisodeStats>,
}

impl<S: crate::Label, A: crate::Label> Learned<S, A> {
    pub fn truncated_episodes(&self) -> usize {
        self.episodes.iter().filter(|e| e.truncated).count()
    }
}
