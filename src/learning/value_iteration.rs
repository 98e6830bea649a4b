use std::collections::BTreeMap;
use tracing::{debug, trace};
use crate::model_checking::mdp::MDP;
use crate::{Label, Policy, ValueTable};

/// One synchronous Bellman backup. Every state with actions gets the best one step lookahead on
/// `values`; states without actions keep their value.
fn bellman_op<S: Label, A: Label>(mdp: &MDP<S, A>, values: &ValueTable<S>, gamma: f64)
    -> (ValueTable<S>, Policy<S, A>)
{
    let mut v0: ValueTable<S> = BTreeMap::new();
    let mut pi0: Policy<S, A> = BTreeMap::new();
    for state in mdp.states() {
        let actions = mdp.actions(state);
        if actions.is_empty() {
            v0.insert(state.clone(), values.get(state).copied().unwrap_or(0.0));
            continue;
        }
        let mut best = f64::NEG_INFINITY;
        for (action, distribution) in actions.iter() {
            let mut v_temp = 0.0;
            for (next_state, p) in distribution.iter() {
                let reward = mdp.weight(state, action, Some(next_state)).unwrap_or(0.0);
                v_temp += p * (reward + gamma * values.get(next_state).copied().unwrap_or(0.0));
            }
            if v_temp > best {
                best = v_temp;
                pi0.insert(state.clone(), action.clone());
            }
        }
        v0.insert(state.clone(), best);
    }
    (v0, pi0)
}

/// Value iteration with a fixed number of sweeps, starting from all zero values.
/// With zero sweeps the policy is empty.
pub fn value_iteration<S: Label, A: Label>(mdp: &MDP<S, A>, gamma: f64, sweeps: usize)
    -> (ValueTable<S>, Policy<S, A>)
{
    let mut v: ValueTable<S> = mdp.states().map(|s| (s.clone(), 0.0)).collect();
    let mut pi: Policy<S, A> = BTreeMap::new();
    for k in 0..sweeps {
        let (v0, pi0) = bellman_op(mdp, &v, gamma);
        let delta = v0.iter()
            .map(|(s, x)| (x - v.get(s).copied().unwrap_or(0.0)).abs())
            .fold(0.0, f64::max);
        trace!(sweep = k, delta, "bellman sweep");
        v = v0;
        pi = pi0;
    }
    debug!(sweeps, states = v.len(), "value iteration finished");
    (v, pi)
}
