use std::collections::BTreeMap;
use rand::Rng;
use tracing::{debug, trace};
use crate::error::Result;
use crate::learning::sampling::{greedy, Environment};
use crate::learning::{EpisodeStats, Learned, LearnerConfig, QTable};
use crate::Label;

/// Every-visit Monte Carlo control. Visit counts accumulate over all episodes and each visit
/// moves the action value towards the observed return by `1 / count`. A trace cut off by
/// `max_steps` is backed up like a complete one.
pub fn monte_carlo<S: Label, A: Label, R: Rng + ?Sized>(
    env: &Environment<S, A>,
    config: &LearnerConfig,
    rng: &mut R,
) -> Result<Learned<S, A>> {
    let mut q: QTable<S, A> = env.zero_q();
    let mut count: BTreeMap<(S, A), u64> = BTreeMap::new();
    let mut pi = env.random_policy(rng);
    let mut epsilon = config.epsilon;
    let mut episodes: Vec<EpisodeStats> = Vec::with_capacity(config.episodes);

    for e in 0..config.episodes {
        let mut state = env.start.clone();
        let mut total_reward = 0.0;
        let mut done = false;
        let mut trajectory: Vec<(S, A, f64)> = Vec::new();
        while trajectory.len() < config.max_steps {
            let action = match env.choose_action(&state, &pi, epsilon, rng) {
                Some(a) => a,
                None => break
            };
            let step = match env.sample_step(&state, &action, rng)? {
                Some(s) => s,
                None => break
            };
            total_reward += step.reward;
            *count.entry((state.clone(), action.clone())).or_insert(0) += 1;
            trajectory.push((state, action, step.reward));
            state = step.next;
            if step.done {
                done = true;
                break;
            }
        }

        let mut g = 0.0;
        for (s, a, reward) in trajectory.iter().rev() {
            g = config.gamma * g + reward;
            let n = count.get(&(s.clone(), a.clone())).copied().unwrap_or(1) as f64;
            if let Some(values) = q.get_mut(s) {
                let value = values.entry(a.clone()).or_insert(0.0);
                *value += (g - *value) / n;
                if let Some(best) = greedy(values) {
                    pi.insert(s.clone(), best);
                }
            }
        }
        trace!(episode = e, visits = trajectory.len(), "returns backed up");
        debug!(episode = e, steps = trajectory.len(), total_reward, done, "episode finished");
        episodes.push(EpisodeStats { steps: trajectory.len(), total_reward, truncated: !done });
        epsilon = config.decay(epsilon);
    }
    Ok(Learned { q, policy: pi, episodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use crate::environments::commute;
    use crate::learning::value_iteration::value_iteration;
    use crate::model_checking::mdp::MDP;

    fn detour() -> MDP<&'static str, &'static str> {
        let mut mdp = MDP::new();
        mdp.add_transition(&"home", "go", &"work", 1.0, -1.0);
        mdp.add_transition(&"home", "detour", &"park", 1.0, -1.0);
        mdp.add_transition(&"park", "walk", &"home", 1.0, -1.0);
        mdp.add_transition(&"work", "done", &"work", 1.0, 0.0);
        mdp
    }

    #[test]
    fn agrees_with_value_iteration() {
        let mdp = detour();
        let env = Environment::new(&mdp, &"home", &"work");
        let (_, expected) = value_iteration(&mdp, 1.0, 10);
        let config = LearnerConfig { episodes: 500, ..LearnerConfig::default() };
        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            let learned = monte_carlo(&env, &config, &mut rng).unwrap();
            assert_eq!(learned.policy[&"home"], expected[&"home"]);
            // the return after "go" is always exactly -1
            assert_float_eq!(learned.q[&"home"][&"go"], -1.0, abs <= 1e-12);
            assert!(learned.q[&"home"][&"detour"] < -1.5);
        }
    }

    #[test]
    fn deterministic_returns_are_exact() {
        let mdp = commute::commute().unwrap();
        let (home, work) = ("home".to_string(), "work".to_string());
        let env = Environment::new(&mdp, &home, &work);
        let mut rng = StdRng::seed_from_u64(9);
        let learned = monte_carlo(&env, &LearnerConfig { episodes: 200, ..LearnerConfig::default() }, &mut rng)
            .unwrap();
        // biking always costs 45, when it was tried at all
        let bike = learned.q[&home][&"bike".to_string()];
        assert!(bike == 0.0 || (bike + 45.0).abs() < 1e-9);
        assert_float_eq!(learned.q[&"train".to_string()][&"relax".to_string()], -35.0, abs <= 1e-9);
    }

    #[test]
    fn truncated_traces_are_backed_up() {
        let mut mdp: MDP<u8, u8> = MDP::new();
        mdp.add_transition(&0, 0, &0, 1.0, -1.0);
        let env = Environment::new(&mdp, &0, &1);
        let config = LearnerConfig { episodes: 1, max_steps: 4, ..LearnerConfig::default() };
        let mut rng = StdRng::seed_from_u64(0);
        let learned = monte_carlo(&env, &config, &mut rng).unwrap();
        assert_eq!(learned.episodes[0], EpisodeStats { steps: 4, total_reward: -4.0, truncated: true });
        // returns -1, -2, -3, -4, each weighted by the final visit count
        assert_float_eq!(learned.q[&0][&0], -1.94921875, abs <= 1e-12);
    }
}
