//! Identifier newtypes and the event record consumed by the engine.

use std::fmt;

/// Identifies a node in the topology.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub const fn new(value: usize) -> Self {
        Self(value)
    }

    pub const fn inner(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a content item in the catalogue. Valid items start at 1.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct ContentId(u64);

impl ContentId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single content request, as produced by a workload generator.
///
/// Events handed to [`crate::engine::run`] must be ordered by `time`.
/// Warmup events carry `log = false` and leave no trace in collectors.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Event {
    pub time: f64,
    pub receiver: NodeId,
    pub content: ContentId,
    pub log: bool,
}

impl Event {
    pub fn new(time: f64, receiver: NodeId, content: ContentId, log: bool) -> Self {
        Self {
            time,
            receiver,
            content,
            log,
        }
    }
}
