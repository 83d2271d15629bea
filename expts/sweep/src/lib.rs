//! Parameter sweeps over caching strategies, topologies and workloads.

pub mod experiment;
pub mod mix;

pub use experiment::Experiment;
pub use mix::{Mix, MixId, TopologySpec};
