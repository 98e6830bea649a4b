//! Getting to work: take the train, drive through traffic of unknown density, or bike.
use std::collections::BTreeMap;
use crate::error::ConfigurationError;
use crate::model_checking::mdp::{ModelSpec, MDP};

pub const START: &str = "home";
pub const END: &str = "work";

fn row(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// The commute model in the two-table format
pub fn commute_spec() -> ModelSpec {
    let mut state_actions = BTreeMap::new();
    state_actions.insert("home".to_string(), row(&[("railway", -2.0), ("car", -1.0), ("bike", -45.0)]));
    state_actions.insert("waiting_room".to_string(), row(&[("wait", -3.0), ("go_back", -2.0)]));
    state_actions.insert("train".to_string(), row(&[("relax", -35.0)]));
    state_actions.insert("light_traffic".to_string(), row(&[("drive", -20.0)]));
    state_actions.insert("medium_traffic".to_string(), row(&[("drive", -30.0)]));
    state_actions.insert("heavy_traffic".to_string(), row(&[("drive", -70.0)]));
    state_actions.insert("work".to_string(), row(&[("done", 0.0)]));

    let mut action_states = BTreeMap::new();
    action_states.insert("railway".to_string(), row(&[("waiting_room", 0.1), ("train", 0.9)]));
    action_states.insert("wait".to_string(), row(&[("waiting_room", 0.1), ("train", 0.9)]));
    action_states.insert("go_back".to_string(), row(&[("home", 1.0)]));
    action_states.insert("relax".to_string(), row(&[("work", 1.0)]));
    action_states.insert(
        "car".to_string(),
        row(&[("light_traffic", 0.2), ("medium_traffic", 0.7), ("heavy_traffic", 0.1)]),
    );
    action_states.insert("drive".to_string(), row(&[("work", 1.0)]));
    action_states.insert("bike".to_string(), row(&[("work", 1.0)]));
    action_states.insert("done".to_string(), row(&[("work", 1.0)]));

    ModelSpec {
        state_actions,
        action_states,
        start: START.to_string(),
        end: END.to_string(),
    }
}

pub fn commute() -> Result<MDP<String, String>, ConfigurationError> {
    commute_spec().build()
}
