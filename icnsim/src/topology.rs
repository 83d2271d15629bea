//! The network topology and the read-only queries strategies run against it.
//!
//! Nodes carry a role (source, receiver or plain router), an optional cache
//! size and an optional cluster tag. Links are undirected and carry both a
//! routing weight (used for path selection) and a propagation delay (used for
//! latency accounting). Routing is static: every query answers from the same
//! shortest-path tables for the lifetime of a run.

use std::collections::VecDeque;

use petgraph::graph::{NodeIndex, UnGraph};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::types::{ContentId, NodeId};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TopologyError {
    #[error("duplicate node id {0}")]
    DuplicateNodeId(NodeId),
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node {0} is not a router but carries a cache")]
    CacheOnNonRouter(NodeId),
    #[error("no path between {from} and {to}")]
    NoPath { from: NodeId, to: NodeId },
    #[error("content {0} has not been placed at any source")]
    NoSource(ContentId),
    #[error("node {0} is not a source and cannot hold permanent copies")]
    NotASource(NodeId),
}

/// What a node does in the simulated network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Source,
    Receiver,
    Router,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub role: Role,
    /// Capacity of the co-located cache, in content items. Only routers may
    /// carry one. `Some(0)` is legal and behaves as a cache that never stores.
    #[serde(default)]
    pub cache_size: Option<usize>,
    #[serde(default)]
    pub cluster: Option<usize>,
}

impl Node {
    pub fn source(id: NodeId) -> Self {
        Self::new(id, Role::Source)
    }

    pub fn receiver(id: NodeId) -> Self {
        Self::new(id, Role::Receiver)
    }

    pub fn router(id: NodeId) -> Self {
        Self::new(id, Role::Router)
    }

    fn new(id: NodeId, role: Role) -> Self {
        Self {
            id,
            role,
            cache_size: None,
            cluster: None,
        }
    }

    pub fn with_cache(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    pub fn in_cluster(mut self, cluster: usize) -> Self {
        self.cluster = Some(cluster);
        self
    }
}

/// Whether a link is internal to the operator's network. External links are
/// reported separately by the link-load collector.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    #[default]
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    /// Routing weight. Shortest paths minimize the sum of these.
    pub weight: f64,
    /// Propagation delay contributed to session latency per traversal.
    pub delay: f64,
    #[serde(default)]
    pub kind: LinkKind,
}

impl Link {
    pub fn new(a: NodeId, b: NodeId) -> Self {
        Self {
            a,
            b,
            weight: 1.0,
            delay: 1.0,
            kind: LinkKind::Internal,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn external(mut self) -> Self {
        self.kind = LinkKind::External;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Topology {
    graph: UnGraph<Node, Link>,
    id2idx: FxHashMap<NodeId, NodeIndex>,
    /// Cluster index -> member nodes, ascending by id.
    clusters: Vec<Vec<NodeId>>,
    /// Receiver -> dedicated cache node, for partitioned strategies.
    cache_assignment: FxHashMap<NodeId, NodeId>,
    /// Content -> the source holding its permanent copy.
    content_source: FxHashMap<ContentId, NodeId>,
}

impl Topology {
    pub fn new(nodes: Vec<Node>, links: Vec<Link>) -> Result<Self, TopologyError> {
        let mut graph = UnGraph::default();
        let mut id2idx = FxHashMap::default();
        let nr_clusters = nodes
            .iter()
            .filter_map(|n| n.cluster)
            .max()
            .map_or(0, |max| max + 1);
        let mut clusters = vec![Vec::new(); nr_clusters];
        let mut sorted = nodes;
        sorted.sort_by_key(|n| n.id);
        for node in sorted {
            if node.cache_size.is_some() && node.role != Role::Router {
                return Err(TopologyError::CacheOnNonRouter(node.id));
            }
            if let Some(cluster) = node.cluster {
                clusters[cluster].push(node.id);
            }
            let idx = graph.add_node(node.clone());
            if id2idx.insert(node.id, idx).is_some() {
                return Err(TopologyError::DuplicateNodeId(node.id));
            }
        }
        for link in links {
            let a = *id2idx
                .get(&link.a)
                .ok_or(TopologyError::UnknownNode(link.a))?;
            let b = *id2idx
                .get(&link.b)
                .ok_or(TopologyError::UnknownNode(link.b))?;
            graph.add_edge(a, b, link);
        }
        Ok(Self {
            graph,
            id2idx,
            clusters,
            cache_assignment: FxHashMap::default(),
            content_source: FxHashMap::default(),
        })
    }

    /// Dedicates a cache node to each receiver. Used by partitioned caching.
    pub fn set_cache_assignment(
        &mut self,
        assignment: FxHashMap<NodeId, NodeId>,
    ) -> Result<(), TopologyError> {
        for (&receiver, &cache) in &assignment {
            self.idx(receiver)?;
            self.idx(cache)?;
        }
        self.cache_assignment = assignment;
        Ok(())
    }

    /// Registers the permanent copy of `content` at source `node`.
    pub fn place_content(&mut self, content: ContentId, node: NodeId) -> Result<(), TopologyError> {
        let idx = self.idx(node)?;
        if self.graph[idx].role != Role::Source {
            return Err(TopologyError::NotASource(node));
        }
        self.content_source.insert(content, node);
        Ok(())
    }

    pub fn apply_placement(
        &mut self,
        placement: impl IntoIterator<Item = (ContentId, NodeId)>,
    ) -> Result<(), TopologyError> {
        for (content, node) in placement {
            self.place_content(content, node)?;
        }
        Ok(())
    }

    fn idx(&self, node: NodeId) -> Result<NodeIndex, TopologyError> {
        self.id2idx
            .get(&node)
            .copied()
            .ok_or(TopologyError::UnknownNode(node))
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.id2idx.contains_key(&node)
    }

    pub fn nr_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn node(&self, node: NodeId) -> Result<&Node, TopologyError> {
        Ok(&self.graph[self.idx(node)?])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    pub fn sources(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.role_nodes(Role::Source)
    }

    pub fn receivers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.role_nodes(Role::Receiver)
    }

    fn role_nodes(&self, role: Role) -> impl Iterator<Item = NodeId> + '_ {
        self.graph
            .node_weights()
            .filter(move |n| n.role == role)
            .map(|n| n.id)
    }

    /// Caching nodes with their capacities, ascending by id. The order is part
    /// of the contract: hash-routing assigns authoritative caches by position
    /// in this list.
    pub fn cache_nodes(&self) -> Vec<(NodeId, usize)> {
        let mut nodes: Vec<_> = self
            .graph
            .node_weights()
            .filter_map(|n| n.cache_size.map(|size| (n.id, size)))
            .collect();
        nodes.sort_by_key(|&(id, _)| id);
        nodes
    }

    pub fn has_cache(&self, node: NodeId) -> bool {
        self.id2idx
            .get(&node)
            .is_some_and(|&idx| self.graph[idx].cache_size.is_some())
    }

    pub fn cluster_of(&self, node: NodeId) -> Option<usize> {
        self.id2idx.get(&node).and_then(|&idx| self.graph[idx].cluster)
    }

    pub fn clusters(&self) -> &[Vec<NodeId>] {
        &self.clusters
    }

    pub fn cache_assignment(&self) -> &FxHashMap<NodeId, NodeId> {
        &self.cache_assignment
    }

    pub fn content_source(&self, content: ContentId) -> Result<NodeId, TopologyError> {
        self.content_source
            .get(&content)
            .copied()
            .ok_or(TopologyError::NoSource(content))
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.graph.edge_weights()
    }

    pub fn adjacent(&self, a: NodeId, b: NodeId) -> bool {
        match (self.id2idx.get(&a), self.id2idx.get(&b)) {
            (Some(&ia), Some(&ib)) => self.graph.find_edge(ia, ib).is_some(),
            _ => false,
        }
    }

    pub fn link(&self, a: NodeId, b: NodeId) -> Option<&Link> {
        let (ia, ib) = (*self.id2idx.get(&a)?, *self.id2idx.get(&b)?);
        let edge = self.graph.find_edge(ia, ib)?;
        Some(&self.graph[edge])
    }

    pub fn neighbors(&self, node: NodeId) -> Result<Vec<NodeId>, TopologyError> {
        let idx = self.idx(node)?;
        let mut neighbors: Vec<_> = self.graph.neighbors(idx).map(|i| self.graph[i].id).collect();
        neighbors.sort_unstable();
        Ok(neighbors)
    }

    /// Weight-minimal path from `from` to `to`, endpoints included.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> Result<Vec<NodeId>, TopologyError> {
        let (a, b) = (self.idx(from)?, self.idx(to)?);
        let (_, path) = petgraph::algo::astar(
            &self.graph,
            a,
            |finish| finish == b,
            |e| e.weight().weight,
            |_| 0.0,
        )
        .ok_or(TopologyError::NoPath { from, to })?;
        Ok(path.into_iter().map(|i| self.graph[i].id).collect())
    }

    /// Number of links on the weight-minimal path between two nodes.
    pub fn hop_count(&self, from: NodeId, to: NodeId) -> Result<usize, TopologyError> {
        Ok(self.shortest_path(from, to)?.len() - 1)
    }

    /// Maximum hop eccentricity over all connected node pairs.
    pub fn diameter(&self) -> usize {
        let mut diameter = 0;
        for start in self.graph.node_indices() {
            for dist in self.bfs_hops(start).into_values() {
                diameter = diameter.max(dist);
            }
        }
        diameter
    }

    fn bfs_hops(&self, start: NodeIndex) -> FxHashMap<NodeIndex, usize> {
        let mut dist = FxHashMap::default();
        dist.insert(start, 0);
        let mut queue = VecDeque::from([start]);
        while let Some(u) = queue.pop_front() {
            let d = dist[&u];
            for v in self.graph.neighbors(u) {
                if !dist.contains_key(&v) {
                    dist.insert(v, d + 1);
                    queue.push_back(v);
                }
            }
        }
        dist
    }

    /// Normalized shortest-path betweenness centrality of every node, via
    /// Brandes' accumulation over unweighted paths.
    pub fn betweenness(&self) -> FxHashMap<NodeId, f64> {
        let n = self.graph.node_count();
        let mut betw = vec![0.0_f64; n];
        for s in self.graph.node_indices() {
            let mut stack = Vec::with_capacity(n);
            let mut preds: Vec<Vec<NodeIndex>> = vec![Vec::new(); n];
            let mut sigma = vec![0.0_f64; n];
            let mut dist = vec![-1_i64; n];
            sigma[s.index()] = 1.0;
            dist[s.index()] = 0;
            let mut queue = VecDeque::from([s]);
            while let Some(u) = queue.pop_front() {
                stack.push(u);
                for v in self.graph.neighbors(u) {
                    if dist[v.index()] < 0 {
                        dist[v.index()] = dist[u.index()] + 1;
                        queue.push_back(v);
                    }
                    if dist[v.index()] == dist[u.index()] + 1 {
                        sigma[v.index()] += sigma[u.index()];
                        preds[v.index()].push(u);
                    }
                }
            }
            let mut delta = vec![0.0_f64; n];
            while let Some(w) = stack.pop() {
                for &v in &preds[w.index()] {
                    delta[v.index()] +=
                        sigma[v.index()] / sigma[w.index()] * (1.0 + delta[w.index()]);
                }
                if w != s {
                    betw[w.index()] += delta[w.index()];
                }
            }
        }
        let scale = if n > 2 {
            1.0 / ((n - 1) as f64 * (n - 2) as f64)
        } else {
            1.0
        };
        self.graph
            .node_indices()
            .map(|i| (self.graph[i].id, betw[i.index()] * scale))
            .collect()
    }

    /// All-pairs delay-weighted distances, per Dijkstra over link delays.
    pub fn delay_distances(&self) -> FxHashMap<NodeId, FxHashMap<NodeId, f64>> {
        self.graph
            .node_indices()
            .map(|s| {
                let dist = petgraph::algo::dijkstra(&self.graph, s, None, |e| e.weight().delay);
                (
                    self.graph[s].id,
                    dist.into_iter()
                        .map(|(i, d)| (self.graph[i].id, d))
                        .collect(),
                )
            })
            .collect()
    }

    /// Union of the directed links on the shortest paths from `source` to
    /// every destination.
    pub fn multicast_tree(
        &self,
        source: NodeId,
        destinations: &[NodeId],
    ) -> Result<FxHashSet<(NodeId, NodeId)>, TopologyError> {
        let mut tree = FxHashSet::default();
        for &dest in destinations {
            let path = self.shortest_path(source, dest)?;
            tree.extend(path.windows(2).map(|w| (w[0], w[1])));
        }
        Ok(tree)
    }
}

/// Links of a multicast tree not shared with the main delivery path, in a
/// deterministic order.
pub fn side_branches(
    tree: &FxHashSet<(NodeId, NodeId)>,
    main_path: &FxHashSet<(NodeId, NodeId)>,
) -> Vec<(NodeId, NodeId)> {
    let mut branches: Vec<_> = tree.difference(main_path).copied().collect();
    branches.sort_unstable();
    branches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn line_shortest_path_is_the_line() -> anyhow::Result<()> {
        let topo = testing::line_topology(3, 1);
        let path = topo.shortest_path(NodeId::new(0), NodeId::new(4))?;
        let expected: Vec<_> = (0..5).map(NodeId::new).collect();
        assert_eq!(path, expected);
        assert_eq!(topo.hop_count(NodeId::new(0), NodeId::new(4))?, 4);
        Ok(())
    }

    #[test]
    fn weights_steer_path_selection() -> anyhow::Result<()> {
        // Triangle 0-1-2 where the direct 0-2 link is expensive.
        let nodes = vec![
            Node::receiver(NodeId::new(0)),
            Node::router(NodeId::new(1)).with_cache(1),
            Node::source(NodeId::new(2)),
        ];
        let links = vec![
            Link::new(NodeId::new(0), NodeId::new(1)),
            Link::new(NodeId::new(1), NodeId::new(2)),
            Link::new(NodeId::new(0), NodeId::new(2)).with_weight(10.0),
        ];
        let topo = Topology::new(nodes, links)?;
        let path = topo.shortest_path(NodeId::new(0), NodeId::new(2))?;
        assert_eq!(path, vec![NodeId::new(0), NodeId::new(1), NodeId::new(2)]);
        Ok(())
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let nodes = vec![
            Node::router(NodeId::new(0)),
            Node::router(NodeId::new(0)),
        ];
        let err = Topology::new(nodes, Vec::new()).unwrap_err();
        assert_eq!(err, TopologyError::DuplicateNodeId(NodeId::new(0)));
    }

    #[test]
    fn caches_on_non_routers_are_rejected() {
        let nodes = vec![Node::receiver(NodeId::new(0)).with_cache(4)];
        let err = Topology::new(nodes, Vec::new()).unwrap_err();
        assert_eq!(err, TopologyError::CacheOnNonRouter(NodeId::new(0)));
    }

    #[test]
    fn disconnected_pairs_report_no_path() -> anyhow::Result<()> {
        let nodes = vec![Node::router(NodeId::new(0)), Node::router(NodeId::new(1))];
        let topo = Topology::new(nodes, Vec::new())?;
        let err = topo.shortest_path(NodeId::new(0), NodeId::new(1)).unwrap_err();
        assert_eq!(
            err,
            TopologyError::NoPath {
                from: NodeId::new(0),
                to: NodeId::new(1)
            }
        );
        Ok(())
    }

    #[test]
    fn placement_only_lands_on_sources() -> anyhow::Result<()> {
        let mut topo = testing::line_topology(1, 1);
        let err = topo
            .place_content(ContentId::new(1), NodeId::new(1))
            .unwrap_err();
        assert_eq!(err, TopologyError::NotASource(NodeId::new(1)));
        topo.place_content(ContentId::new(1), NodeId::new(2))?;
        assert_eq!(topo.content_source(ContentId::new(1))?, NodeId::new(2));
        Ok(())
    }

    #[test]
    fn line_diameter_counts_end_to_end_hops() {
        let topo = testing::line_topology(3, 1);
        assert_eq!(topo.diameter(), 4);
    }

    #[test]
    fn line_betweenness_peaks_in_the_middle() {
        // 0-1-2-3-4: node 2 lies on the most pairs.
        let topo = testing::line_topology(3, 1);
        let betw = topo.betweenness();
        let mid = betw[&NodeId::new(2)];
        assert!(mid > betw[&NodeId::new(1)] || (mid - betw[&NodeId::new(1)]).abs() < 1e-12);
        assert!(mid > betw[&NodeId::new(0)]);
        assert!(mid > betw[&NodeId::new(4)]);
        // Endpoints sit on no interior pair.
        assert_eq!(betw[&NodeId::new(0)], 0.0);
        assert_eq!(betw[&NodeId::new(4)], 0.0);
    }

    #[test]
    fn delay_distances_accumulate_link_delays() -> anyhow::Result<()> {
        let nodes = vec![
            Node::receiver(NodeId::new(0)),
            Node::router(NodeId::new(1)).with_cache(1),
            Node::source(NodeId::new(2)),
        ];
        let links = vec![
            Link::new(NodeId::new(0), NodeId::new(1)).with_delay(2.0),
            Link::new(NodeId::new(1), NodeId::new(2)).with_delay(3.0),
        ];
        let topo = Topology::new(nodes, links)?;
        let dist = topo.delay_distances();
        assert_eq!(dist[&NodeId::new(0)][&NodeId::new(2)], 5.0);
        assert_eq!(dist[&NodeId::new(2)][&NodeId::new(0)], 5.0);
        Ok(())
    }

    #[test]
    fn multicast_tree_shares_common_prefix_links() -> anyhow::Result<()> {
        // Y shape: 0-1, then 1-2 and 1-3.
        let nodes = vec![
            Node::source(NodeId::new(0)),
            Node::router(NodeId::new(1)).with_cache(1),
            Node::receiver(NodeId::new(2)),
            Node::router(NodeId::new(3)).with_cache(1),
        ];
        let links = vec![
            Link::new(NodeId::new(0), NodeId::new(1)),
            Link::new(NodeId::new(1), NodeId::new(2)),
            Link::new(NodeId::new(1), NodeId::new(3)),
        ];
        let topo = Topology::new(nodes, links)?;
        let tree = topo.multicast_tree(NodeId::new(0), &[NodeId::new(2), NodeId::new(3)])?;
        assert_eq!(tree.len(), 3);
        let main: FxHashSet<_> = [(NodeId::new(0), NodeId::new(1)), (NodeId::new(1), NodeId::new(2))]
            .into_iter()
            .collect();
        let side = side_branches(&tree, &main);
        assert_eq!(side, vec![(NodeId::new(1), NodeId::new(3))]);
        Ok(())
    }

    #[test]
    fn cache_nodes_are_ordered_by_id() {
        let topo = testing::line_topology(3, 2);
        let caches = topo.cache_nodes();
        assert_eq!(
            caches,
            vec![
                (NodeId::new(1), 2),
                (NodeId::new(2), 2),
                (NodeId::new(3), 2)
            ]
        );
    }

    #[test]
    fn clusters_group_tagged_nodes() -> anyhow::Result<()> {
        let topo = testing::clustered_line_topology(2, 2, 1);
        assert_eq!(topo.clusters().len(), 2);
        for cluster in topo.clusters() {
            assert!(!cluster.is_empty());
        }
        for node in topo.nodes() {
            assert!(node.cluster.is_some());
        }
        Ok(())
    }
}
