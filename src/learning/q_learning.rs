use rand::Rng;
use tracing::{debug, trace};
use crate::error::Result;
use crate::learning::sampling::{greedy, Environment};
use crate::learning::{EpisodeStats, Learned, LearnerConfig};
use crate::Label;

/// Tabular Q-learning with an epsilon-greedy behaviour policy. Every episode starts at the
/// environment's start state and runs until the end state is reached or `max_steps` steps were
/// taken. The greedy policy is refreshed at each visited state and epsilon decays once per
/// episode.
pub fn q_learn<S: Label, A: Label, R: Rng + ?Sized>(
    env: &Environment<S, A>,
    config: &LearnerConfig,
    rng: &mut R,
) -> Result<Learned<S, A>> {
    let mut q = env.zero_q();
    let mut pi = env.random_policy(rng);
    let mut epsilon = config.epsilon;
    let mut episodes: Vec<EpisodeStats> = Vec::with_capacity(config.episodes);

    for e in 0..config.episodes {
        let mut state = env.start.clone();
        let mut total_reward = 0.0;
        let mut steps = 0;
        let mut done = false;
        while steps < config.max_steps {
            let action = match env.choose_action(&state, &pi, epsilon, rng) {
                Some(a) => a,
                None => break
            };
            let step = match env.sample_step(&state, &action, rng)? {
                Some(s) => s,
                None => break
            };
            steps += 1;
            total_reward += step.reward;
            let next_best = q.get(&step.next)
                .filter(|values| !values.is_empty())
                .map(|values| values.values().cloned().fold(f64::NEG_INFINITY, f64::max))
                .unwrap_or(0.0);
            if let Some(values) = q.get_mut(&state) {
                let value = values.entry(action.clone()).or_insert(0.0);
                *value += config.alpha * (step.reward + config.gamma * next_best - *value);
                if let Some(best) = greedy(values) {
                    pi.insert(state.clone(), best);
                }
            }
            trace!(state = ?state, action = ?action, next = ?step.next, "q update");
            state = step.next;
            if step.done {
                done = true;
                break;
            }
        }
        debug!(episode = e, steps, total_reward, done, "episode finished");
        episodes.push(EpisodeStats { steps, total_reward, truncated: !done });
        epsilon = config.decay(epsilon);
    }
    Ok(Learned { q, policy: pi, episodes })
}
