//! Synthetic topology factories.
//!
//! All factories follow the same conventions: receivers request, routers
//! forward and optionally cache, sources hold the permanent copies. Node ids
//! are assigned breadth-first from 0, links carry unit weight and delay.

use rustc_hash::FxHashMap;

use icnsim::topology::{Link, Node, Topology, TopologyError};
use icnsim::types::NodeId;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("topology has no caching nodes")]
    NoCacheNodes,
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// receiver - router x `nr_routers` - source, every router caching
/// `cache_size` items.
pub fn line(nr_routers: usize, cache_size: usize) -> Topology {
    assert!(nr_routers > 0);
    let last = nr_routers + 1;
    let mut nodes = vec![Node::receiver(NodeId::new(0))];
    nodes.extend((1..=nr_routers).map(|id| Node::router(NodeId::new(id)).with_cache(cache_size)));
    nodes.push(Node::source(NodeId::new(last)));
    let links = (0..last)
        .map(|i| Link::new(NodeId::new(i), NodeId::new(i + 1)))
        .collect();
    Topology::new(nodes, links).expect("line topology is well formed")
}

/// A k-ary tree of caching routers, `depth` levels deep, with the source at
/// the root and one receiver per leaf router.
pub fn k_ary_tree(k: usize, depth: usize, cache_size: usize) -> Topology {
    assert!(k > 0 && depth > 0);
    let mut nodes = vec![Node::source(NodeId::new(0))];
    let mut links = Vec::new();
    let mut next_id = 1;
    let mut frontier = vec![0];
    for _ in 0..depth {
        let mut children = Vec::new();
        for &parent in &frontier {
            for _ in 0..k {
                let id = next_id;
                next_id += 1;
                nodes.push(Node::router(NodeId::new(id)).with_cache(cache_size));
                links.push(Link::new(NodeId::new(parent), NodeId::new(id)));
                children.push(id);
            }
        }
        frontier = children;
    }
    for &leaf in &frontier {
        let id = next_id;
        next_id += 1;
        nodes.push(Node::receiver(NodeId::new(id)));
        links.push(Link::new(NodeId::new(leaf), NodeId::new(id)));
    }
    Topology::new(nodes, links).expect("tree topology is well formed")
}

/// A chain of `nr_clusters` groups of caching routers between one receiver
/// and one source, every node tagged with its cluster.
pub fn clustered_line(nr_clusters: usize, routers_per_cluster: usize, cache_size: usize) -> Topology {
    assert!(nr_clusters > 0 && routers_per_cluster > 0);
    let nr_routers = nr_clusters * routers_per_cluster;
    let last = nr_routers + 1;
    let mut nodes = vec![Node::receiver(NodeId::new(0)).in_cluster(0)];
    for id in 1..=nr_routers {
        let cluster = (id - 1) / routers_per_cluster;
        nodes.push(
            Node::router(NodeId::new(id))
                .with_cache(cache_size)
                .in_cluster(cluster),
        );
    }
    nodes.push(Node::source(NodeId::new(last)).in_cluster(nr_clusters - 1));
    let links = (0..last)
        .map(|i| Link::new(NodeId::new(i), NodeId::new(i + 1)))
        .collect();
    Topology::new(nodes, links).expect("clustered line topology is well formed")
}

/// Pins every receiver to its closest caching node, breaking distance ties
/// towards the lower node id. Feeds partitioned caching.
pub fn nearest_cache_assignment(topo: &Topology) -> Result<FxHashMap<NodeId, NodeId>, BuildError> {
    let caches = topo.cache_nodes();
    if caches.is_empty() {
        return Err(BuildError::NoCacheNodes);
    }
    let mut assignment = FxHashMap::default();
    for receiver in topo.receivers().collect::<Vec<_>>() {
        let mut best: Option<(usize, NodeId)> = None;
        for &(cache, _) in &caches {
            let hops = topo.hop_count(receiver, cache)?;
            if best.map_or(true, |current| (hops, cache) < current) {
                best = Some((hops, cache));
            }
        }
        let (_, cache) = best.ok_or(BuildError::NoCacheNodes)?;
        assignment.insert(receiver, cache);
    }
    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use icnsim::topology::Role;

    #[test]
    fn line_has_one_receiver_and_one_source() {
        let topo = line(4, 2);
        assert_eq!(topo.nr_nodes(), 6);
        assert_eq!(topo.receivers().count(), 1);
        assert_eq!(topo.sources().count(), 1);
        assert_eq!(topo.cache_nodes().len(), 4);
    }

    #[test]
    fn binary_tree_counts_add_up() {
        let topo = k_ary_tree(2, 2, 1);
        // 1 source + 2 + 4 routers + 4 receivers.
        assert_eq!(topo.nr_nodes(), 11);
        assert_eq!(topo.cache_nodes().len(), 6);
        assert_eq!(topo.receivers().count(), 4);
        // Every receiver reaches the root through `depth + 1` hops.
        for receiver in topo.receivers().collect::<Vec<_>>() {
            assert_eq!(topo.hop_count(receiver, NodeId::new(0)).unwrap(), 3);
        }
    }

    #[test]
    fn clustered_line_tags_every_node() {
        let topo = clustered_line(3, 2, 1);
        assert_eq!(topo.clusters().len(), 3);
        for node in topo.nodes() {
            assert!(node.cluster.is_some(), "node {} untagged", node.id);
        }
        // Sources and receivers join the boundary clusters.
        for source in topo.sources().collect::<Vec<_>>() {
            assert_eq!(topo.node(source).unwrap().role, Role::Source);
            assert_eq!(topo.cluster_of(source), Some(2));
        }
    }

    #[test]
    fn nearest_cache_assignment_prefers_close_low_ids() -> anyhow::Result<()> {
        let topo = line(3, 1);
        let assignment = nearest_cache_assignment(&topo)?;
        assert_eq!(assignment[&NodeId::new(0)], NodeId::new(1));
        Ok(())
    }
}
