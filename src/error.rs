//! Error types for model construction, unfolding and solving.

use thiserror::Error;

/// Malformed domain data, raised eagerly while an MDP is being built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A state offers an action that has no next-state distribution
    #[error("action {action} offered at state {state} has no transition distribution")]
    MissingDistribution { state: String, action: String },

    /// Probabilities of one (state, action) pair do not add up to one
    #[error("distribution of action {action} at state {state} sums to {sum}, expected 1")]
    InvalidDistribution {
        state: String,
        action: String,
        sum: f64,
    },

    /// Negative, NaN or infinite probability
    #[error("invalid probability {probability} for {state} -{action}-> {next_state}")]
    InvalidProbability {
        state: String,
        action: String,
        next_state: String,
        probability: f64,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("linear program failed: {0}")]
    Lp(#[from] minilp::Error),

    /// The shortest-path oracle found a cycle of positive total reward, along which the
    /// accumulated budget never runs out.
    #[error("budget is not monotone: the model contains a reward cycle reachable from target {target}")]
    NonMonotoneBudget { target: String },

    #[error("unfolding exceeded the limit of {limit} states")]
    UnfoldingLimit { limit: usize },

    #[error("invalid parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// Malformed or unknown command line argument
    #[error("invalid argument: {0}")]
    Cli(String),

    #[error("sampling error: {0}")]
    Sampling(#[from] rand::distributions::WeightedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
