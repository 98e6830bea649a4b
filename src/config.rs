use serde::Deserialize;
use crate::learning::LearnerConfig;
use crate::model_checking::unfold::UnfoldConfig;

/// Settings of every solver, as read from a json file e.g.
/// ```json
/// {
///   "unfold": {"pruning": "threshold", "max_states": 50000},
///   "learner": {"alpha": 0.1, "episodes": 500},
///   "seed": 7
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub unfold: UnfoldConfig,
    pub learner: LearnerConfig,
    /// Seed of the random number generator, entropy when absent
    pub seed: Option<u64>,
}
