use std::collections::BTreeMap;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::IteratorRandom;
use crate::error::Result;
use crate::model_checking::mdp::MDP;
use crate::{Label, Policy};

/// The model a learner runs on, with the state every episode starts from and the state that
/// ends an episode.
#[derive(Debug, Clone)]
pub struct Environment<'a, S: Label, A: Label> {
    pub mdp: &'a MDP<S, A>,
    pub start: &'a S,
    pub end: &'a S,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step<S> {
    pub next: S,
    pub reward: f64,
    pub done: bool,
}

/// Categorical draw over the support of `distribution`
pub fn draw<S: Clone, R: Rng + ?Sized>(distribution: &BTreeMap<S, f64>, rng: &mut R) -> Result<S> {
    let support: Vec<&S> = distribution.keys().collect();
    let dist: WeightedIndex<f64> = WeightedIndex::new(distribution.values())?;
    Ok(support[dist.sample(rng)].clone())
}

impl<'a, S: Label, A: Label> Environment<'a, S, A> {
    pub fn new(mdp: &'a MDP<S, A>, start: &'a S, end: &'a S) -> Environment<'a, S, A> {
        Environment { mdp, start, end }
    }

    /// Samples the successor of `state` under `action`. The reward is the weight of the action
    /// family and the step is done when the successor is the end state. `None` if the action is
    /// not available at `state`.
    pub fn sample_step<R: Rng + ?Sized>(&self, state: &S, action: &A, rng: &mut R) -> Result<Option<Step<S>>> {
        let actions = self.mdp.actions(state);
        let distribution = match actions.get(action) {
            None => return Ok(None),
            Some(d) => d
        };
        let next = draw(distribution, rng)?;
        let reward = self.mdp.weight(state, action, Some(&next)).unwrap_or(0.0);
        let done = next == *self.end;
        Ok(Some(Step { next, reward, done }))
    }

    /// Epsilon-greedy choice: the policy's action with probability `1 - epsilon`, otherwise a
    /// uniformly random action of `state`. Falls back to a random action where the policy has
    /// no entry; `None` only if the state has no actions.
    pub fn choose_action<R: Rng + ?Sized>(&self, state: &S, policy: &Policy<S, A>, epsilon: f64, rng: &mut R)
        -> Option<A>
    {
        if rng.gen::<f64>() > epsilon {
            if let Some(a) = policy.get(state) {
                return Some(a.clone());
            }
        }
        self.mdp.actions(state).into_iter().map(|(a, _)| a).choose(rng)
    }

    /// A policy choosing one action uniformly at random in every state that has actions
    pub fn random_policy<R: Rng + ?Sized>(&self, rng: &mut R) -> Policy<S, A> {
        let mut policy: Policy<S, A> = BTreeMap::new();
        for s in self.mdp.states() {
            if let Some(a) = self.mdp.actions(s).into_iter().map(|(a, _)| a).choose(rng) {
                policy.insert(s.clone(), a);
            }
        }
        policy
    }

    /// Zero-initialised action values for every (state, action) pair of the model
    pub fn zero_q(&self) -> BTreeMap<S, BTreeMap<A, f64>> {
        self.mdp.states()
            .map(|s| (s.clone(), self.mdp.actions(s).into_iter().map(|(a, _)| (a, 0.0)).collect()))
            .collect()
    }
}

/// The first action with the largest value
pub fn greedy<A: Label>(values: &BTreeMap<A, f64>) -> Option<A> {
    let mut best: Option<(&A, f64)> = None;
    for (a, v) in values.iter() {
        match best {
            Some((_, b)) if *v <= b => {}
            _ => best = Some((a, *v))
        }
    }
    best.map(|(a, _)| a.clone())
}
