//! Canonical small topologies shared by the unit tests.

use crate::topology::{Link, Node, Topology};
use crate::types::NodeId;

/// receiver(0) - routers(1..=nr_routers) - source(nr_routers + 1), with a
/// cache of `cache_size` items at every router.
pub fn line_topology(nr_routers: usize, cache_size: usize) -> Topology {
    let cache_nodes: Vec<_> = (1..=nr_routers).collect();
    line_with_caches(nr_routers, &cache_nodes, cache_size)
}

/// Like [`line_topology`], but only the routers named in `cache_nodes` cache.
pub fn line_with_caches(nr_routers: usize, cache_nodes: &[usize], cache_size: usize) -> Topology {
    let last = nr_routers + 1;
    let mut nodes = vec![Node::receiver(NodeId::new(0))];
    for id in 1..=nr_routers {
        let mut node = Node::router(NodeId::new(id));
        if cache_nodes.contains(&id) {
            node = node.with_cache(cache_size);
        }
        nodes.push(node);
    }
    nodes.push(Node::source(NodeId::new(last)));
    let links = (0..last)
        .map(|i| Link::new(NodeId::new(i), NodeId::new(i + 1)))
        .collect();
    Topology::new(nodes, links).expect("line topology is well formed")
}

/// A chain of `nr_clusters` groups of caching routers between one receiver
/// and one source. Every node carries a cluster tag: the receiver joins the
/// first cluster, the source the last.
pub fn clustered_line_topology(
    nr_clusters: usize,
    routers_per_cluster: usize,
    cache_size: usize,
) -> Topology {
    assert!(nr_clusters > 0 && routers_per_cluster > 0);
    let nr_routers = nr_clusters * routers_per_cluster;
    let last = nr_routers + 1;
    let mut nodes = vec![Node::receiver(NodeId::new(0)).in_cluster(0)];
    for id in 1..=nr_routers {
        let cluster = (id - 1) / routers_per_cluster;
        nodes.push(Node::router(NodeId::new(id)).with_cache(cache_size).in_cluster(cluster));
    }
    nodes.push(Node::source(NodeId::new(last)).in_cluster(nr_clusters - 1));
    let links = (0..last)
        .map(|i| Link::new(NodeId::new(i), NodeId::new(i + 1)))
        .collect();
    Topology::new(nodes, links).expect("clustered line topology is well formed")
}
