//! Small models used by the tests, the benchmark and the command line front end
pub mod commute;
pub mod frozen_lake;
