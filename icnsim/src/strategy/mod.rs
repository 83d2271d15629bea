//! Caching strategies and their configuration surface.
//!
//! A strategy owns the full lifecycle of one request: it opens the session,
//! routes the request to whoever can serve it, routes the content back and
//! decides which caches keep a copy on the way. Configurations are plain
//! serde values; [`StrategyConfig::build`] validates parameters and performs
//! whatever precomputation the strategy needs against the topology.

use crate::controller::NetworkController;
use crate::topology::TopologyError;
use crate::types::{ContentId, Event, NodeId};
use crate::SimError;

pub mod hashrouting;
pub mod onpath;

pub use hashrouting::HashAssignment;

/// Handles one content request end to end.
pub trait Strategy {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError>;
}

/// A configuration that failed validation at strategy construction.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("{name} must be within [0, 1], got {value}")]
    InvalidRatio { name: &'static str, value: f64 },
    #[error("t_tw must be positive, got {0}")]
    InvalidTtw(f64),
    #[error("topology carries no cache assignment for receiver {0}")]
    MissingCacheAssignment(NodeId),
    #[error("clustered hash-routing requires every node to belong to a cluster, {0} does not")]
    UnclusteredNode(NodeId),
    #[error("cluster {0} contains no caching node")]
    ClusterWithoutCaches(usize),
    #[error("receiver {receiver} attaches to {proxy}, which has no cache")]
    ProxyWithoutCache { receiver: NodeId, proxy: NodeId },
    #[error("receiver {0} has no neighbor to proxy through")]
    IsolatedReceiver(NodeId),
    #[error("topology has no caching nodes")]
    NoCacheNodes,
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// How hash-routed content travels back from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Routing {
    /// Source to authoritative cache, then cache to receiver.
    Symm,
    /// Direct to the receiver; the cache is filled only if it lies on the way.
    Asymm,
    /// Direct to the receiver, with a side branch to the cache at the fork.
    Multicast,
}

/// How clustered hash-routing crosses cluster boundaries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterRouting {
    #[default]
    Lce,
    Edge,
}

/// Copy placement on the return path of nearest-replica routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Metacaching {
    Lce,
    Lcd,
}

/// Declarative strategy selection, as it appears in experiment inputs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "strategy", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyConfig {
    NoCache,
    Lce,
    Lcd,
    ProbCache {
        #[serde(default = "default_t_tw")]
        t_tw: f64,
    },
    Cl4m,
    RandBernoulli {
        #[serde(default = "default_p")]
        p: f64,
    },
    RandChoice,
    Nrr {
        metacaching: Metacaching,
    },
    Edge,
    Partition,
    HrSymm,
    HrAsymm,
    HrMulticast,
    HrHybridAm {
        /// Fraction of the topology diameter a side branch may stretch.
        #[serde(default = "default_max_stretch")]
        max_stretch: f64,
    },
    HrHybridSm,
    HrCluster {
        intra_routing: Routing,
        #[serde(default)]
        inter_routing: InterRouting,
    },
    HrEdgeCache {
        routing: Routing,
        edge_cache_ratio: f64,
    },
    HrOnPath {
        routing: Routing,
        on_path_cache_ratio: f64,
    },
}

fn default_t_tw() -> f64 {
    10.0
}

fn default_p() -> f64 {
    0.2
}

fn default_max_stretch() -> f64 {
    0.2
}

impl StrategyConfig {
    /// Validates the configuration against `ctrl`'s topology and builds the
    /// strategy. May reserve local cache partitions on the controller, so it
    /// must run before any event is processed.
    pub fn build(
        &self,
        ctrl: &mut NetworkController,
        seed: u64,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        match *self {
            StrategyConfig::NoCache => Ok(Box::new(onpath::NoCache)),
            StrategyConfig::Lce => Ok(Box::new(onpath::LeaveCopyEverywhere)),
            StrategyConfig::Lcd => Ok(Box::new(onpath::LeaveCopyDown)),
            StrategyConfig::ProbCache { t_tw } => {
                Ok(Box::new(onpath::ProbCache::new(ctrl.topology(), t_tw, seed)?))
            }
            StrategyConfig::Cl4m => Ok(Box::new(onpath::CacheLessForMore::new(ctrl.topology()))),
            StrategyConfig::RandBernoulli { p } => {
                Ok(Box::new(onpath::RandomBernoulli::new(p, seed)?))
            }
            StrategyConfig::RandChoice => Ok(Box::new(onpath::RandomChoice::new(seed))),
            StrategyConfig::Nrr { metacaching } => {
                Ok(Box::new(onpath::NearestReplicaRouting::new(
                    ctrl.topology(),
                    metacaching,
                )))
            }
            StrategyConfig::Edge => Ok(Box::new(onpath::EdgeCaching)),
            StrategyConfig::Partition => Ok(Box::new(onpath::Partition::new(ctrl.topology())?)),
            StrategyConfig::HrSymm => Ok(Box::new(hashrouting::Hashrouting::new(
                ctrl.topology(),
                Routing::Symm,
            )?)),
            StrategyConfig::HrAsymm => Ok(Box::new(hashrouting::Hashrouting::new(
                ctrl.topology(),
                Routing::Asymm,
            )?)),
            StrategyConfig::HrMulticast => Ok(Box::new(hashrouting::Hashrouting::new(
                ctrl.topology(),
                Routing::Multicast,
            )?)),
            StrategyConfig::HrHybridAm { max_stretch } => Ok(Box::new(
                hashrouting::HashroutingHybridAm::new(ctrl.topology(), max_stretch)?,
            )),
            StrategyConfig::HrHybridSm => Ok(Box::new(hashrouting::HashroutingHybridSm::new(
                ctrl.topology(),
            )?)),
            StrategyConfig::HrCluster {
                intra_routing,
                inter_routing,
            } => Ok(Box::new(hashrouting::HashroutingClustered::new(
                ctrl.topology(),
                intra_routing,
                inter_routing,
            )?)),
            StrategyConfig::HrEdgeCache {
                routing,
                edge_cache_ratio,
            } => {
                let strategy =
                    hashrouting::HashroutingEdge::new(ctrl.topology(), routing, edge_cache_ratio)?;
                ctrl.reserve_local_cache(edge_cache_ratio);
                Ok(Box::new(strategy))
            }
            StrategyConfig::HrOnPath {
                routing,
                on_path_cache_ratio,
            } => {
                let strategy =
                    hashrouting::HashroutingOnPath::new(ctrl.topology(), routing, on_path_cache_ratio)?;
                ctrl.reserve_local_cache(on_path_cache_ratio);
                Ok(Box::new(strategy))
            }
        }
    }
}

pub(crate) fn path_links(path: &[NodeId]) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
    path.windows(2).map(|w| (w[0], w[1]))
}

/// Walks the request path hop by hop, querying every cache on the way, and
/// returns the first node able to serve. Falls back to the source at the end
/// of the path.
pub(crate) fn locate_on_path(
    ctrl: &mut NetworkController,
    path: &[NodeId],
    content: ContentId,
) -> Result<NodeId, SimError> {
    for (u, v) in path_links(path) {
        ctrl.forward_request_hop(u, v);
        if ctrl.topology().has_cache(v) && ctrl.get_content(v) {
            return Ok(v);
        }
    }
    let source = path[path.len() - 1];
    if !ctrl.get_content(source) {
        return Err(SimError::ContentNotFound {
            node: source,
            content,
        });
    }
    Ok(source)
}

/// Last node the paths towards `cache` and towards the receiver have in
/// common. When the receiver path is a prefix of the cache path, the fork is
/// the cache itself.
pub(crate) fn fork_node(cache_path: &[NodeId], receiver_path: &[NodeId], cache: NodeId) -> NodeId {
    let limit = cache_path.len().min(receiver_path.len());
    for i in 1..limit {
        if cache_path[i] != receiver_path[i] {
            return cache_path[i - 1];
        }
    }
    cache
}
