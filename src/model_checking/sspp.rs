//! Stochastic shortest path percentile queries: reach a target within a budget with at least a
//! given probability.

use std::collections::{BTreeMap, BTreeSet};
use rand::Rng;
use tracing::info;
use crate::error::{Error, Result};
use crate::learning::sampling::draw;
use crate::model_checking::mdp::MDP;
use crate::model_checking::reachability::{reachability_optimal_policy, LP_TOLERANCE};
use crate::model_checking::unfold::{UnfoldConfig, UnfoldedAction, UnfoldedMDP, UnfoldedState};
use crate::{Label, Policy, ValueTable};

pub struct GuaranteedPolicy<S: Label, A: Label> {
    /// Actions of the unfolded states whose success probability meets the threshold
    pub policy: Policy<UnfoldedState<S>, UnfoldedAction<A>>,
    /// Success probability of every unfolded state
    pub x: ValueTable<UnfoldedState<S>>,
    pub unfolded: UnfoldedMDP<S, A>,
}

impl<S: Label, A: Label> GuaranteedPolicy<S, A> {
    /// Success probability from the source with the initial budget
    pub fn initial_probability(&self) -> f64 {
        self.x.get(&self.unfolded.initial).copied().unwrap_or(0.0)
    }

    /// One action per original state. Where a state was unfolded with several budgets the entry
    /// with the largest remaining budget wins.
    pub fn project_policy(&self) -> BTreeMap<S, A> {
        let mut best: BTreeMap<S, (f64, A)> = BTreeMap::new();
        for (state, action) in self.policy.iter() {
            if let (UnfoldedState::Pair(s, v), UnfoldedAction::Take(a)) = (state, action) {
                let v = v.into_inner();
                if best.get(s).map_or(true, |(w, _)| *w < v) {
                    best.insert(s.clone(), (v, a.clone()));
                }
            }
        }
        best.into_iter().map(|(s, (_, a))| (s, a)).collect()
    }
}

/// Policy reaching `targets` from `source` with accumulated weight of at least `length`
/// (weights are rewards, so a cost budget of 60 is `length = -60`).
///
/// The MDP is unfolded along the accumulated weight, the reachability LP is solved on the
/// unfolded MDP and the policy is restricted to the unfolded states whose probability is at
/// least `proba_threshold`, up to the LP's round-off.
pub fn guaranteed_short_path<S: Label, A: Label>(
    mdp: &MDP<S, A>,
    source: &S,
    targets: &BTreeSet<S>,
    length: f64,
    proba_threshold: f64,
    config: &UnfoldConfig,
) -> Result<GuaranteedPolicy<S, A>> {
    if !(0.0..=1.0).contains(&proba_threshold) {
        return Err(Error::InvalidParameter { name: "proba_threshold", value: proba_threshold });
    }
    if length.is_nan() {
        return Err(Error::InvalidParameter { name: "length", value: length });
    }
    let unfolded = UnfoldedMDP::new(mdp, source, targets, length, config)?;
    let (policy, x) = reachability_optimal_policy(&unfolded.mdp, &unfolded.targets)?;
    let policy: Policy<UnfoldedState<S>, UnfoldedAction<A>> = policy.into_iter()
        .filter(|(state, _)| x.get(state).copied().unwrap_or(0.0) + LP_TOLERANCE >= proba_threshold)
        .collect();
    let guaranteed = GuaranteedPolicy { policy, x, unfolded };
    info!(
        probability = guaranteed.initial_probability(),
        guaranteed_states = guaranteed.policy.len(),
        "guaranteed short path computed"
    );
    Ok(guaranteed)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// A target was reached within the budget
    Reached { steps: usize, value: f64 },
    /// The run left the states covered by the policy
    Failed { steps: usize, value: f64 },
    TimedOut,
}

/// Follows a guaranteed policy on the original MDP for at most `max_steps` steps
pub fn simulate<S: Label, A: Label, R: Rng + ?Sized>(
    mdp: &MDP<S, A>,
    guaranteed: &GuaranteedPolicy<S, A>,
    source: &S,
    targets: &BTreeSet<S>,
    max_steps: usize,
    rng: &mut R,
) -> Result<RunOutcome> {
    let mut state = source.clone();
    let mut value = guaranteed.unfolded.initial.value().unwrap_or(0.0);
    for step in 0..max_steps {
        if targets.contains(&state) {
            return Ok(RunOutcome::Reached { steps: step, value });
        }
        let action = match guaranteed.policy.get(&UnfoldedState::new(state.clone(), value)) {
            Some(UnfoldedAction::Take(a)) => a,
            _ => return Ok(RunOutcome::Failed { steps: step, value })
        };
        let distribution = mdp.actions(&state);
        let next = match distribution.get(action) {
            Some(d) => draw(d, rng)?,
            None => return Ok(RunOutcome::Failed { steps: step, value })
        };
        value += mdp.weight(&state, action, Some(&next)).unwrap_or(0.0);
        state = next;
    }
    if targets.contains(&state) {
        Ok(RunOutcome::Reached { steps: max_steps, value })
    } else {
        Ok(RunOutcome::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use crate::environments::commute;
    use crate::model_checking::unfold::Pruning;

    fn work() -> BTreeSet<String> {
        vec!["work".to_string()].into_iter().collect()
    }

    fn home() -> String {
        "home".to_string()
    }

    #[test]
    fn tight_budget_prefers_the_train() {
        let mdp = commute::commute().unwrap();
        let g = guaranteed_short_path(&mdp, &home(), &work(), -40.0, 0.0, &UnfoldConfig::default())
            .unwrap();
        assert_float_eq!(g.initial_probability(), 0.999, abs <= 1e-6);
        assert_eq!(g.policy[&UnfoldedState::new(home(), 0.0)], UnfoldedAction::Take("railway".to_string()));
        let waiting = UnfoldedState::new("waiting_room".to_string(), -2.0);
        assert_float_eq!(g.x[&waiting], 0.99, abs <= 1e-6);
        assert_eq!(g.policy[&waiting], UnfoldedAction::Take("wait".to_string()));
    }

    #[test]
    fn loose_budget_is_certain() {
        let mdp = commute::commute().unwrap();
        let g = guaranteed_short_path(&mdp, &home(), &work(), -60.0, 1.0, &UnfoldConfig::default())
            .unwrap();
        assert_float_eq!(g.initial_probability(), 1.0, abs <= 1e-6);
        let action = &g.policy[&UnfoldedState::new(home(), 0.0)];
        assert!(
            *action == UnfoldedAction::Take("railway".to_string())
                || *action == UnfoldedAction::Take("bike".to_string())
        );
        for state in g.policy.keys() {
            assert!(g.x[state] >= 1.0 - 1e-6);
        }
    }

    #[test]
    fn pruning_modes_agree() {
        let mdp = commute::commute().unwrap();
        for length in &[-25.0, -40.0, -45.0, -60.0] {
            let plain = UnfoldConfig { pruning: Pruning::Threshold, ..UnfoldConfig::default() };
            let a = guaranteed_short_path(&mdp, &home(), &work(), *length, 0.0, &plain).unwrap();
            let b = guaranteed_short_path(&mdp, &home(), &work(), *length, 0.0, &UnfoldConfig::default())
                .unwrap();
            assert_float_eq!(a.initial_probability(), b.initial_probability(), abs <= 1e-6);
        }
    }

    #[test]
    fn threshold_filters_policy() {
        let mdp = commute::commute().unwrap();
        let g = guaranteed_short_path(&mdp, &home(), &work(), -40.0, 0.995, &UnfoldConfig::default())
            .unwrap();
        assert!(g.policy.contains_key(&UnfoldedState::new(home(), 0.0)));
        assert!(!g.policy.contains_key(&UnfoldedState::new("waiting_room".to_string(), -2.0)));
        assert!(!g.policy.contains_key(&UnfoldedState::Bot));
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let mdp = commute::commute().unwrap();
        let r = guaranteed_short_path(&mdp, &home(), &work(), -40.0, 1.5, &UnfoldConfig::default());
        assert!(matches!(r.err(), Some(Error::InvalidParameter { name: "proba_threshold", .. })));
    }

    #[test]
    fn projected_policy_uses_largest_budget() {
        let mdp = commute::commute().unwrap();
        let g = guaranteed_short_path(&mdp, &home(), &work(), -40.0, 0.0, &UnfoldConfig::default())
            .unwrap();
        let projected = g.project_policy();
        assert_eq!(projected[&home()], "railway");
        assert_eq!(projected["waiting_room"], "wait");
    }

    #[test]
    fn simulated_runs_respect_the_budget() {
        let mdp = commute::commute().unwrap();
        let g = guaranteed_short_path(&mdp, &home(), &work(), -60.0, 1.0, &UnfoldConfig::default())
            .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            match simulate(&mdp, &g, &home(), &work(), 100, &mut rng).unwrap() {
                RunOutcome::Reached { value, .. } => assert!(value >= -60.0),
                other => panic!("run did not reach work: {:?}", other),
            }
        }
    }

    #[test]
    fn pruning_modes_agree_on_reward_cycles_through_a_target() {
        let mut mdp: MDP<u32, u32> = MDP::new();
        mdp.add_transition(&0, 0, &1, 1.0, -1.0);
        mdp.add_transition(&1, 0, &0, 1.0, 5.0);
        let targets: BTreeSet<u32> = vec![1].into_iter().collect();
        let plain = UnfoldConfig { pruning: Pruning::Threshold, ..UnfoldConfig::default() };
        let a = guaranteed_short_path(&mdp, &0, &targets, -3.0, 0.0, &plain).unwrap();
        let b = guaranteed_short_path(&mdp, &0, &targets, -3.0, 0.0, &UnfoldConfig::default()).unwrap();
        assert_float_eq!(a.initial_probability(), 1.0, abs <= 1e-6);
        assert_float_eq!(b.initial_probability(), 1.0, abs <= 1e-6);
    }

    #[test]
    fn runs_fail_outside_the_guaranteed_states() {
        let mdp = commute::commute().unwrap();
        let g = guaranteed_short_path(&mdp, &home(), &work(), -40.0, 0.995, &UnfoldConfig::default())
            .unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut failed = 0;
        for _ in 0..200 {
            match simulate(&mdp, &g, &home(), &work(), 100, &mut rng).unwrap() {
                RunOutcome::Reached { value, .. } => assert_float_eq!(value, -37.0, abs <= 1e-9),
                RunOutcome::Failed { steps, value } => {
                    // the railway left us in the waiting room, which is below the threshold
                    assert_eq!(steps, 1);
                    assert_float_eq!(value, -2.0, abs <= 1e-9);
                    failed += 1;
                }
                RunOutcome::TimedOut => panic!("run timed out"),
            }
        }
        assert!(failed > 0 && failed < 200);
    }

    #[test]
    fn runs_time_out_after_max_steps() {
        let mdp = commute::commute().unwrap();
        let g = guaranteed_short_path(&mdp, &home(), &work(), -40.0, 0.0, &UnfoldConfig::default())
            .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            // one step of the railway ends at the train or the waiting room, never at work
            assert_eq!(simulate(&mdp, &g, &home(), &work(), 1, &mut rng).unwrap(), RunOutcome::TimedOut);
        }
        assert_eq!(simulate(&mdp, &g, &home(), &work(), 0, &mut rng).unwrap(), RunOutcome::TimedOut);
    }
}
