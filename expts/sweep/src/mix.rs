//! One point in the sweep's parameter space.

use icnsim::cache::Policy;
use icnsim::strategy::StrategyConfig;
use icnsim::topology::Topology;
use scenarios::topologies;

pub type MixId = usize;

/// A fully specified run: topology, strategy, cache budget and workload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Mix {
    pub id: MixId,
    pub topology: TopologySpec,
    #[serde(flatten)]
    pub strategy: StrategyConfig,
    #[serde(default = "default_policy")]
    pub policy: Policy,
    /// Total cache capacity across the network, as a fraction of the
    /// catalogue.
    #[serde(default = "default_network_cache")]
    pub network_cache: f64,
    pub n_contents: u64,
    /// Zipf exponent of content popularity.
    pub alpha: f64,
    /// Zipf exponent of receiver load skew.
    #[serde(default)]
    pub beta: f64,
    #[serde(default = "default_rate")]
    pub rate: f64,
    pub n_warmup: usize,
    pub n_measured: usize,
    #[serde(default)]
    pub seed: u64,
}

fn default_policy() -> Policy {
    Policy::Lru
}

fn default_network_cache() -> f64 {
    0.01
}

fn default_rate() -> f64 {
    1.0
}

impl Mix {
    /// Per-node cache capacity: the network-wide budget split evenly across
    /// caching nodes, at least one item each.
    pub fn cache_size(&self) -> usize {
        let budget = self.network_cache * self.n_contents as f64;
        let per_node = budget / self.topology.nr_cache_nodes() as f64;
        (per_node.round() as usize).max(1)
    }

    pub fn build_topology(&self) -> Topology {
        self.topology.build(self.cache_size())
    }
}

/// Which topology factory to use and its shape parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    Line {
        nr_routers: usize,
    },
    KAryTree {
        k: usize,
        depth: usize,
    },
    ClusteredLine {
        nr_clusters: usize,
        routers_per_cluster: usize,
    },
}

impl TopologySpec {
    pub fn nr_cache_nodes(&self) -> usize {
        match *self {
            TopologySpec::Line { nr_routers } => nr_routers,
            TopologySpec::KAryTree { k, depth } => (1..=depth).map(|level| k.pow(level as u32)).sum(),
            TopologySpec::ClusteredLine {
                nr_clusters,
                routers_per_cluster,
            } => nr_clusters * routers_per_cluster,
        }
    }

    pub fn build(&self, cache_size: usize) -> Topology {
        match *self {
            TopologySpec::Line { nr_routers } => topologies::line(nr_routers, cache_size),
            TopologySpec::KAryTree { k, depth } => topologies::k_ary_tree(k, depth, cache_size),
            TopologySpec::ClusteredLine {
                nr_clusters,
                routers_per_cluster,
            } => topologies::clustered_line(nr_clusters, routers_per_cluster, cache_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_serde() {
        let data = r#"{
            "id": 0,
            "topology": {"kind": "line", "nr_routers": 4},
            "strategy": "LCE",
            "n_contents": 1000,
            "alpha": 0.8,
            "n_warmup": 100,
            "n_measured": 500
        }"#;
        let mix = serde_json::from_str::<Mix>(data).unwrap();
        assert_eq!(mix.id, 0);
        assert_eq!(mix.strategy, StrategyConfig::Lce);
        assert_eq!(mix.policy, Policy::Lru);
        assert_eq!(mix.topology, TopologySpec::Line { nr_routers: 4 });
        // 1% of 1000 contents over 4 caches.
        assert_eq!(mix.cache_size(), 3);
    }

    #[test]
    fn strategy_parameters_flatten_into_the_mix() {
        let data = r#"{
            "id": 1,
            "topology": {"kind": "k_ary_tree", "k": 2, "depth": 3},
            "strategy": "HR_EDGE_CACHE",
            "routing": "MULTICAST",
            "edge_cache_ratio": 0.25,
            "policy": "LFU",
            "n_contents": 100,
            "alpha": 1.0,
            "n_warmup": 10,
            "n_measured": 50
        }"#;
        let mix = serde_json::from_str::<Mix>(data).unwrap();
        assert_eq!(
            mix.strategy,
            StrategyConfig::HrEdgeCache {
                routing: icnsim::strategy::Routing::Multicast,
                edge_cache_ratio: 0.25,
            }
        );
        assert_eq!(mix.policy, Policy::Lfu);
        assert_eq!(mix.topology.nr_cache_nodes(), 14);
    }
}
