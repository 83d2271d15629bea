//! A discrete-event simulator for in-network caching.
//!
//! A run wires four pieces together: a [`topology::Topology`] describing the
//! network, a [`controller::NetworkController`] tracking caches and
//! per-request sessions, a [`strategy::Strategy`] deciding how requests are
//! routed and where copies land, and [`collectors`] measuring what happened.
//! [`engine::run`] drives a time-ordered event stream through them.

pub mod cache;
pub mod collectors;
pub mod controller;
pub mod engine;
pub mod strategy;
pub mod testing;
pub mod topology;
pub mod types;

pub use cache::Policy;
pub use collectors::{Collector, RecordCollector, StatsCollector, Summary};
pub use controller::{NetworkController, SessionRecord};
pub use engine::run;
pub use strategy::{Strategy, StrategyConfig, StrategyError};
pub use topology::{Link, Node, Topology, TopologyError};
pub use types::{ContentId, Event, NodeId};

/// Errors that abort a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A node expected to hold a copy could not serve it. For a source this
    /// means the content was never placed there.
    #[error("content {content} is not available at serving node {node}")]
    ContentNotFound { node: NodeId, content: ContentId },
    #[error("inter-cluster routing {0} is not supported")]
    UnsupportedInterRouting(&'static str),
    #[error(transparent)]
    Topology(#[from] TopologyError),
}
