pub mod helper_methods;
pub mod mdp;
pub mod reachability;
pub mod sspp;
pub mod unfold;
