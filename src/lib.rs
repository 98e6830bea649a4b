//! Policies for Markov decision processes: maximal reachability by linear programming,
//! budget-constrained ("percentile") shortest paths by unfolding the accumulated weight into the
//! state, and expected-reward learners.
extern crate serde_json;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs::File;
use std::hash::Hash;
use std::io::BufReader;
use std::path::Path;
use serde::de::DeserializeOwned;

pub mod config;
pub mod environments;
pub mod error;
pub mod learning;
pub mod model_checking;

pub use config::SolverConfig;
pub use error::{ConfigurationError, Error, Result};
pub use model_checking::mdp::{ModelSpec, Transition, MDP};
pub use model_checking::sspp::{guaranteed_short_path, GuaranteedPolicy};
pub use model_checking::reachability::reachability_optimal_policy;
pub use model_checking::unfold::{Pruning, UnfoldConfig, UnfoldedAction, UnfoldedState};

/// Bound shared by states and actions
pub trait Label: Clone + Eq + Hash + Ord + Debug {}

impl<T: Clone + Eq + Hash + Ord + Debug> Label for T {}

/// One action per state
pub type Policy<S, A> = BTreeMap<S, A>;

pub type ValueTable<S> = BTreeMap<S, f64>;

fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let u = serde_json::from_reader(reader)?;
    Ok(u)
}

/// Reads a model in the two-table format, see [`ModelSpec`]
pub fn read_model_json<P: AsRef<Path>>(path: P) -> Result<ModelSpec> {
    read_json(path)
}

/// Reads solver settings; missing fields take their defaults
pub fn read_config_json<P: AsRef<Path>>(path: P) -> Result<SolverConfig> {
    read_json(path)
}
