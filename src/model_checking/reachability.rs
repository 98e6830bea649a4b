use std::collections::{BTreeMap, BTreeSet, HashMap};
use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem, Variable};
use tracing::{debug, info};
use crate::error::Result;
use crate::model_checking::mdp::MDP;
use crate::{Label, Policy, ValueTable};

/// Round-off accepted on values returned by the LP solver
pub const LP_TOLERANCE: f64 = 1e-9;

/// Outcome of the classification pass for a single state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Target,
    /// No path to any target
    Unreachable,
    /// Resolved by the linear program
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Reach<S: Label> {
    /// Maximal probability of eventually reaching the targets, per state
    pub x: ValueTable<S>,
    /// Number of LP variables, zero when classification resolved every state
    pub lp_variables: usize,
}

pub fn classify<S: Label, A: Label>(mdp: &MDP<S, A>, targets: &BTreeSet<S>) -> BTreeMap<S, Classification> {
    let connected = mdp.backward_reachable(targets.iter());
    let mut classes: BTreeMap<S, Classification> = BTreeMap::new();
    for s in mdp.states() {
        let class = if targets.contains(s) {
            Classification::Target
        } else {
            match mdp.node_index(s) {
                Some(ix) if connected.contains(&ix) => Classification::Unknown,
                _ => Classification::Unreachable
            }
        };
        classes.insert(s.clone(), class);
    }
    classes
}

/// Maximal reachability probabilities of `targets`.
///
/// Trivial states are fixed to 1 (targets) or 0 (no path to a target). For the remaining states
/// the LP
///
///   min sum_s x_s  s.t.  x_s >= sum_s' P(s,a,s') x_s'  for every action a at s,  0 <= x_s <= 1
///
/// is solved; its least solution is the optimal reachability probability.
pub fn reach<S: Label, A: Label>(mdp: &MDP<S, A>, targets: &BTreeSet<S>) -> Result<Reach<S>> {
    let classes = classify(mdp, targets);
    let mut x: ValueTable<S> = BTreeMap::new();
    let mut untreated: Vec<&S> = Vec::new();
    for (s, class) in classes.iter() {
        match class {
            Classification::Target => { x.insert(s.clone(), 1.0); }
            Classification::Unreachable => { x.insert(s.clone(), 0.0); }
            Classification::Unknown => untreated.push(s)
        }
    }
    if untreated.is_empty() {
        debug!("every state resolved without the LP");
        return Ok(Reach { x, lp_variables: 0 });
    }

    let mut problem = Problem::new(OptimizationDirection::Minimize);
    let vars: Vec<Variable> = untreated.iter().map(|_| problem.add_var(1.0, (0.0, 1.0))).collect();
    let var_index: HashMap<&S, usize> = untreated.iter().enumerate().map(|(i, s)| (*s, i)).collect();
    let mut constraints: usize = 0;
    for (i, s) in untreated.iter().enumerate() {
        for (_action, distribution) in mdp.actions(s) {
            // x_s - sum_{unknown s'} p x_s' >= sum_{known s'} p x_s'
            let mut coefficients: BTreeMap<usize, f64> = BTreeMap::new();
            coefficients.insert(i, 1.0);
            let mut rhs = 0.0;
            for (next_state, p) in distribution.iter() {
                match var_index.get(next_state) {
                    Some(j) => { *coefficients.entry(*j).or_insert(0.0) -= p; }
                    None => { rhs += p * x.get(next_state).copied().unwrap_or(0.0); }
                }
            }
            let mut expr = LinearExpr::empty();
            let mut terms = 0;
            for (j, c) in coefficients.into_iter().filter(|(_, c)| c.abs() > 1e-12) {
                expr.add(vars[j], c);
                terms += 1;
            }
            if terms == 0 {
                // a probability-one self loop: 0 >= 0
                continue;
            }
            problem.add_constraint(expr, ComparisonOp::Ge, rhs);
            constraints += 1;
        }
    }
    info!(variables = untreated.len(), constraints, "solving reachability LP");

    let solution = problem.solve()?;
    debug!(objective = solution.objective(), "reachability LP solved");
    for (i, s) in untreated.iter().enumerate() {
        let value = solution[vars[i]];
        x.insert((*s).clone(), value.max(0.0).min(1.0));
    }
    Ok(Reach { x, lp_variables: untreated.len() })
}

/// Expected value of `x` after taking an action with the given next-state distribution
pub fn action_value<S: Label>(distribution: &BTreeMap<S, f64>, x: &ValueTable<S>) -> f64 {
    distribution.iter()
        .map(|(next_state, p)| p * x.get(next_state).copied().unwrap_or(0.0))
        .sum()
}

/// Policy maximising the probability of reaching `targets`, together with the probabilities.
/// Targets keep one of their own actions; every other state with actions picks the action with
/// the largest expected successor value, ties going to the first action in order.
///
/// Inside an end component a tie may pick an action that stays in the component, e.g. a
/// zero-weight self loop valued like an action that makes progress; such a policy never reaches
/// the target even though its states carry probability one.
pub fn reachability_optimal_policy<S: Label, A: Label>(mdp: &MDP<S, A>, targets: &BTreeSet<S>)
    -> Result<(Policy<S, A>, ValueTable<S>)>
{
    let Reach { x, .. } = reach(mdp, targets)?;
    let mut policy: Policy<S, A> = BTreeMap::new();
    for state in mdp.states() {
        let actions = mdp.actions(state);
        if targets.contains(state) {
            if let Some(action) = actions.keys().next() {
                policy.insert(state.clone(), action.clone());
            }
            continue;
        }
        let mut max_v = f64::NEG_INFINITY;
        let mut optimal_action: Option<&A> = None;
        for (action, distribution) in actions.iter() {
            let value = action_value(distribution, &x);
            if value > max_v {
                max_v = value;
                optimal_action = Some(action);
            }
        }
        if let Some(action) = optimal_action {
            policy.insert(state.clone(), action.clone());
        }
    }
    Ok((policy, x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;

    fn set<T: Label>(items: Vec<T>) -> BTreeSet<T> {
        items.into_iter().collect()
    }

    #[test]
    fn disconnected_loop_needs_no_lp() {
        let mut mdp: MDP<&str, &str> = MDP::new();
        mdp.add_transition(&"home", "go", &"gym", 1.0, -1.0);
        mdp.add_transition(&"gym", "go", &"home", 1.0, -1.0);
        let r = reach(&mdp, &set(vec!["work"])).unwrap();
        assert_eq!(r.lp_variables, 0);
        assert_eq!(r.x[&"home"], 0.0);
        assert_eq!(r.x[&"gym"], 0.0);
    }

    #[test]
    fn retrying_reaches_almost_surely() {
        let mut mdp: MDP<&str, &str> = MDP::new();
        mdp.add_transition(&"s", "try", &"goal", 0.5, -1.0);
        mdp.add_transition(&"s", "try", &"s", 0.5, -1.0);
        mdp.add_transition(&"goal", "stay", &"goal", 1.0, 0.0);
        let r = reach(&mdp, &set(vec!["goal"])).unwrap();
        assert_eq!(r.lp_variables, 1);
        assert_float_eq!(r.x[&"s"], 1.0, abs <= 1e-6);
        assert_float_eq!(r.x[&"goal"], 1.0, abs <= 1e-12);
    }

    #[test]
    fn best_action_is_selected() {
        let mut mdp: MDP<&str, &str> = MDP::new();
        mdp.add_transition(&"s", "a", &"goal", 0.5, -1.0);
        mdp.add_transition(&"s", "a", &"pit", 0.5, -1.0);
        mdp.add_transition(&"s", "b", &"goal", 0.3, -1.0);
        mdp.add_transition(&"s", "b", &"pit", 0.7, -1.0);
        mdp.add_transition(&"s", "c", &"t", 1.0, -1.0);
        mdp.add_transition(&"t", "a", &"goal", 0.6, -1.0);
        mdp.add_transition(&"t", "a", &"pit", 0.4, -1.0);
        mdp.add_transition(&"goal", "stay", &"goal", 1.0, 0.0);
        mdp.add_transition(&"pit", "stay", &"pit", 1.0, 0.0);
        let (policy, x) = reachability_optimal_policy(&mdp, &set(vec!["goal"])).unwrap();
        assert_float_eq!(x[&"s"], 0.6, abs <= 1e-6);
        assert_float_eq!(x[&"t"], 0.6, abs <= 1e-6);
        assert_eq!(x[&"pit"], 0.0);
        assert_eq!(policy[&"s"], "c");
        assert_eq!(policy[&"goal"], "stay");
        // the pit still gets its only action
        assert_eq!(policy[&"pit"], "stay");
    }

    #[test]
    fn end_components_do_not_inflate_values() {
        // "s" may loop forever on "wait", which must not count as reaching the goal
        let mut mdp: MDP<&str, &str> = MDP::new();
        mdp.add_transition(&"s", "wait", &"s", 1.0, 0.0);
        mdp.add_transition(&"s", "go", &"goal", 0.25, -1.0);
        mdp.add_transition(&"s", "go", &"pit", 0.75, -1.0);
        mdp.add_transition(&"goal", "stay", &"goal", 1.0, 0.0);
        mdp.add_transition(&"pit", "stay", &"pit", 1.0, 0.0);
        let (policy, x) = reachability_optimal_policy(&mdp, &set(vec!["goal"])).unwrap();
        assert_float_eq!(x[&"s"], 0.25, abs <= 1e-6);
        assert_eq!(policy[&"s"], "go");
    }

    #[test]
    fn classification_pass() {
        let mut mdp: MDP<u8, u8> = MDP::new();
        mdp.add_transition(&0, 0, &1, 1.0, -1.0);
        mdp.add_transition(&1, 0, &1, 1.0, 0.0);
        mdp.add_transition(&2, 0, &2, 1.0, 0.0);
        let classes = classify(&mdp, &set(vec![1]));
        assert_eq!(classes[&0], Classification::Unknown);
        assert_eq!(classes[&1], Classification::Target);
        assert_eq!(classes[&2], Classification::Unreachable);
    }

    #[test]
    fn ties_go_to_the_first_action_even_when_it_idles() {
        let mut mdp: MDP<&str, &str> = MDP::new();
        mdp.add_transition(&"s", "dawdle", &"s", 1.0, 0.0);
        mdp.add_transition(&"s", "go", &"goal", 1.0, -1.0);
        mdp.add_transition(&"goal", "stay", &"goal", 1.0, 0.0);
        let (policy, x) = reachability_optimal_policy(&mdp, &set(vec!["goal"])).unwrap();
        assert_float_eq!(x[&"s"], 1.0, abs <= 1e-6);
        let actions = mdp.actions(&"s");
        assert_float_eq!(action_value(&actions[&"dawdle"], &x), action_value(&actions[&"go"], &x), abs <= 1e-6);
        assert_eq!(policy[&"s"], "dawdle");
    }
}
