//! Hash-routing strategies.
//!
//! Content is mapped to an authoritative cache by hashing its identifier, so
//! the whole network behaves as one large cache with no duplicated entries.
//! Requests always travel receiver -> authoritative cache -> source; the
//! variants differ in how content travels back and in which additional,
//! uncoordinated caches may keep copies.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{fork_node, path_links, InterRouting, Routing, Strategy, StrategyError};
use crate::controller::NetworkController;
use crate::topology::{side_branches, Topology, TopologyError};
use crate::types::{ContentId, Event, NodeId};
use crate::SimError;

const HASH_GAMMA: u64 = 0x9E3779B97F4A7C15;

/// Maps content identifiers to authoritative caches, network-wide and per
/// cluster. The mapping depends only on the content id and the ordered list
/// of caching nodes, so every node agrees on it without coordination.
#[derive(Debug, Clone)]
pub struct HashAssignment {
    nodes: Vec<NodeId>,
    clusters: Vec<Vec<NodeId>>,
}

impl HashAssignment {
    pub fn new(topo: &Topology) -> Result<Self, StrategyError> {
        let nodes: Vec<NodeId> = topo.cache_nodes().into_iter().map(|(id, _)| id).collect();
        if nodes.is_empty() {
            return Err(StrategyError::NoCacheNodes);
        }
        let cache_set: FxHashSet<NodeId> = nodes.iter().copied().collect();
        let clusters = topo
            .clusters()
            .iter()
            .map(|members| {
                members
                    .iter()
                    .copied()
                    .filter(|m| cache_set.contains(m))
                    .collect()
            })
            .collect();
        Ok(Self { nodes, clusters })
    }

    fn hash(content: ContentId) -> u64 {
        content.inner().wrapping_mul(HASH_GAMMA)
    }

    /// The cache responsible for `content` across the whole network.
    pub fn authoritative(&self, content: ContentId) -> NodeId {
        self.nodes[(Self::hash(content) % self.nodes.len() as u64) as usize]
    }

    /// The cache responsible for `content` within `cluster`.
    pub fn authoritative_in_cluster(&self, content: ContentId, cluster: usize) -> NodeId {
        let members = &self.clusters[cluster];
        members[(Self::hash(content) % members.len() as u64) as usize]
    }

    pub fn nr_caches(&self) -> usize {
        self.nodes.len()
    }
}

/// Plain hash-routing with a symmetric, asymmetric or multicast return path.
pub struct Hashrouting {
    assignment: HashAssignment,
    routing: Routing,
}

impl Hashrouting {
    pub fn new(topo: &Topology, routing: Routing) -> Result<Self, StrategyError> {
        Ok(Self {
            assignment: HashAssignment::new(topo)?,
            routing,
        })
    }
}

impl Strategy for Hashrouting {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let cache = self.assignment.authoritative(ev.content);
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        ctrl.forward_request_path(ev.receiver, cache)?;
        if ctrl.get_content(cache) {
            ctrl.forward_content_path(cache, ev.receiver, true)?;
            ctrl.end_session();
            return Ok(());
        }
        ctrl.forward_request_path(cache, source)?;
        if !ctrl.get_content(source) {
            return Err(SimError::ContentNotFound {
                node: source,
                content: ev.content,
            });
        }
        match self.routing {
            Routing::Symm => {
                ctrl.forward_content_path(source, cache, true)?;
                ctrl.put_content(cache);
                ctrl.forward_content_path(cache, ev.receiver, true)?;
            }
            Routing::Asymm => {
                if ctrl.topology().shortest_path(source, ev.receiver)?.contains(&cache) {
                    ctrl.forward_content_path(source, cache, true)?;
                    ctrl.put_content(cache);
                    ctrl.forward_content_path(cache, ev.receiver, true)?;
                } else {
                    ctrl.forward_content_path(source, ev.receiver, true)?;
                }
            }
            Routing::Multicast => {
                let direct = ctrl.topology().shortest_path(source, ev.receiver)?;
                if direct.contains(&cache) {
                    ctrl.forward_content_path(source, cache, true)?;
                    ctrl.put_content(cache);
                    ctrl.forward_content_path(cache, ev.receiver, true)?;
                } else {
                    let cache_path = ctrl.topology().shortest_path(source, cache)?;
                    let fork = fork_node(&cache_path, &direct, cache);
                    ctrl.forward_content_path(source, fork, true)?;
                    ctrl.forward_content_path(fork, ev.receiver, true)?;
                    ctrl.forward_content_path(fork, cache, false)?;
                    ctrl.put_content(cache);
                }
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// Hash-routing that multicasts a copy to the authoritative cache only when
/// the side branch is short relative to the topology diameter.
pub struct HashroutingHybridAm {
    assignment: HashAssignment,
    /// Maximum side-branch length, in hops.
    max_stretch: f64,
}

impl HashroutingHybridAm {
    pub fn new(topo: &Topology, max_stretch_fraction: f64) -> Result<Self, StrategyError> {
        if !(0.0..=1.0).contains(&max_stretch_fraction) {
            return Err(StrategyError::InvalidRatio {
                name: "max_stretch",
                value: max_stretch_fraction,
            });
        }
        Ok(Self {
            assignment: HashAssignment::new(topo)?,
            max_stretch: topo.diameter() as f64 * max_stretch_fraction,
        })
    }
}

impl Strategy for HashroutingHybridAm {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let cache = self.assignment.authoritative(ev.content);
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        ctrl.forward_request_path(ev.receiver, cache)?;
        if ctrl.get_content(cache) {
            ctrl.forward_content_path(cache, ev.receiver, true)?;
            ctrl.end_session();
            return Ok(());
        }
        ctrl.forward_request_path(cache, source)?;
        if !ctrl.get_content(source) {
            return Err(SimError::ContentNotFound {
                node: source,
                content: ev.content,
            });
        }
        let direct = ctrl.topology().shortest_path(source, ev.receiver)?;
        if direct.contains(&cache) {
            ctrl.forward_content_path(source, cache, true)?;
            ctrl.put_content(cache);
            ctrl.forward_content_path(cache, ev.receiver, true)?;
        } else {
            ctrl.forward_content_path(source, ev.receiver, true)?;
            let cache_path = ctrl.topology().shortest_path(source, cache)?;
            let fork = fork_node(&cache_path, &direct, cache);
            if (ctrl.topology().hop_count(fork, cache)? as f64) < self.max_stretch {
                ctrl.forward_content_path(fork, cache, false)?;
                ctrl.put_content(cache);
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// Hash-routing that picks, per request, the cheaper of the symmetric and
/// multicast return paths. The authoritative cache is always filled.
pub struct HashroutingHybridSm {
    assignment: HashAssignment,
}

impl HashroutingHybridSm {
    pub fn new(topo: &Topology) -> Result<Self, StrategyError> {
        Ok(Self {
            assignment: HashAssignment::new(topo)?,
        })
    }
}

impl Strategy for HashroutingHybridSm {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let cache = self.assignment.authoritative(ev.content);
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        ctrl.forward_request_path(ev.receiver, cache)?;
        if ctrl.get_content(cache) {
            ctrl.forward_content_path(cache, ev.receiver, true)?;
            ctrl.end_session();
            return Ok(());
        }
        ctrl.forward_request_path(cache, source)?;
        if !ctrl.get_content(source) {
            return Err(SimError::ContentNotFound {
                node: source,
                content: ev.content,
            });
        }
        let direct = ctrl.topology().shortest_path(source, ev.receiver)?;
        if direct.contains(&cache) {
            ctrl.forward_content_path(source, cache, true)?;
            ctrl.put_content(cache);
            ctrl.forward_content_path(cache, ev.receiver, true)?;
        } else {
            let cache_path = ctrl.topology().shortest_path(source, cache)?;
            let fork = fork_node(&cache_path, &direct, cache);
            let symm_len =
                ctrl.topology().hop_count(source, cache)? + ctrl.topology().hop_count(cache, ev.receiver)?;
            let multicast_len = ctrl.topology().hop_count(source, fork)?
                + ctrl.topology().hop_count(fork, cache)?
                + ctrl.topology().hop_count(fork, ev.receiver)?;
            ctrl.put_content(cache);
            // Ties go to the symmetric path: it loads fewer links.
            if symm_len <= multicast_len {
                ctrl.forward_content_path(source, cache, true)?;
                ctrl.forward_content_path(cache, ev.receiver, true)?;
            } else {
                ctrl.forward_content_path(source, ev.receiver, true)?;
                ctrl.forward_content_path(fork, cache, false)?;
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// Hash-routing over a clustered topology: each cluster runs its own hash
/// assignment, and requests walk the cluster chain towards the source,
/// querying one authoritative cache per cluster.
pub struct HashroutingClustered {
    assignment: HashAssignment,
    intra: Routing,
    inter: InterRouting,
    cluster_paths: FxHashMap<(usize, usize), Vec<usize>>,
}

impl HashroutingClustered {
    pub fn new(topo: &Topology, intra: Routing, inter: InterRouting) -> Result<Self, StrategyError> {
        let assignment = HashAssignment::new(topo)?;
        for (index, members) in assignment.clusters.iter().enumerate() {
            if members.is_empty() {
                return Err(StrategyError::ClusterWithoutCaches(index));
            }
        }
        for node in topo.nodes() {
            if node.cluster.is_none() {
                return Err(StrategyError::UnclusteredNode(node.id));
            }
        }
        Ok(Self {
            assignment,
            intra,
            inter,
            cluster_paths: cluster_paths(topo),
        })
    }
}

/// All-pairs shortest paths over the cluster-level graph, where two clusters
/// are adjacent if any link crosses their boundary.
fn cluster_paths(topo: &Topology) -> FxHashMap<(usize, usize), Vec<usize>> {
    let nr = topo.clusters().len();
    let mut adjacency = vec![FxHashSet::default(); nr];
    for link in topo.links() {
        let (Some(ca), Some(cb)) = (topo.cluster_of(link.a), topo.cluster_of(link.b)) else {
            continue;
        };
        if ca != cb {
            adjacency[ca].insert(cb);
            adjacency[cb].insert(ca);
        }
    }
    let mut paths = FxHashMap::default();
    for start in 0..nr {
        let mut parent: Vec<Option<usize>> = vec![None; nr];
        let mut seen = vec![false; nr];
        seen[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(u) = queue.pop_front() {
            for &v in &adjacency[u] {
                if !seen[v] {
                    seen[v] = true;
                    parent[v] = Some(u);
                    queue.push_back(v);
                }
            }
        }
        for end in 0..nr {
            if !seen[end] {
                continue;
            }
            let mut path = vec![end];
            let mut cur = end;
            while let Some(p) = parent[cur] {
                path.push(p);
                cur = p;
            }
            path.reverse();
            paths.insert((start, end), path);
        }
    }
    paths
}

impl Strategy for HashroutingClustered {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        if self.inter == InterRouting::Edge {
            return Err(SimError::UnsupportedInterRouting("EDGE"));
        }
        let source = ctrl.topology().content_source(ev.content)?;
        let receiver_cluster = ctrl
            .topology()
            .cluster_of(ev.receiver)
            .expect("all nodes clustered at construction");
        let source_cluster = ctrl
            .topology()
            .cluster_of(source)
            .expect("all nodes clustered at construction");
        let cluster_path = self
            .cluster_paths
            .get(&(receiver_cluster, source_cluster))
            .cloned()
            .ok_or(SimError::Topology(TopologyError::NoPath {
                from: ev.receiver,
                to: source,
            }))?;
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);

        // Request leg: query each cluster's authoritative cache in turn.
        let mut start = ev.receiver;
        let mut serving_cluster = source_cluster;
        let mut hit = false;
        for &cluster in &cluster_path {
            let cache = self.assignment.authoritative_in_cluster(ev.content, cluster);
            ctrl.forward_request_path(start, cache)?;
            start = cache;
            if ctrl.get_content(cache) {
                serving_cluster = cluster;
                hit = true;
                break;
            }
        }
        if !hit {
            ctrl.forward_request_path(start, source)?;
            start = source;
            if !ctrl.get_content(source) {
                return Err(SimError::ContentNotFound {
                    node: source,
                    content: ev.content,
                });
            }
        }

        // Content leg: back through the authoritative cache of every cluster
        // between the serving cluster and the receiver's.
        let back: Vec<usize> = self.cluster_paths[&(receiver_cluster, serving_cluster)]
            .iter()
            .rev()
            .copied()
            .collect();
        match self.intra {
            Routing::Symm => {
                let mut cur = start;
                for &cluster in &back {
                    let cache = self.assignment.authoritative_in_cluster(ev.content, cluster);
                    ctrl.forward_content_path(cur, cache, true)?;
                    ctrl.put_content(cache);
                    cur = cache;
                }
                ctrl.forward_content_path(cur, ev.receiver, true)?;
            }
            Routing::Asymm => {
                ctrl.forward_content_path(start, ev.receiver, true)?;
                let caches: FxHashSet<NodeId> = back
                    .iter()
                    .map(|&cluster| self.assignment.authoritative_in_cluster(ev.content, cluster))
                    .collect();
                let path = ctrl.topology().shortest_path(start, ev.receiver)?;
                for v in path {
                    if caches.contains(&v) {
                        ctrl.put_content(v);
                    }
                }
            }
            Routing::Multicast => {
                let destinations: Vec<NodeId> = back
                    .iter()
                    .map(|&cluster| self.assignment.authoritative_in_cluster(ev.content, cluster))
                    .collect();
                for &dest in &destinations {
                    ctrl.put_content(dest);
                }
                let main: Vec<_> =
                    path_links(&ctrl.topology().shortest_path(start, ev.receiver)?).collect();
                let main_set: FxHashSet<_> = main.iter().copied().collect();
                let tree = ctrl.topology().multicast_tree(start, &destinations)?;
                for (u, v) in side_branches(&tree, &main_set) {
                    ctrl.forward_content_hop(u, v, false);
                }
                for (u, v) in main {
                    ctrl.forward_content_hop(u, v, true);
                }
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// Hash-routing with an extra uncoordinated cache partition at each
/// receiver's attachment router.
pub struct HashroutingEdge {
    assignment: HashAssignment,
    routing: Routing,
    proxy: FxHashMap<NodeId, NodeId>,
}

impl HashroutingEdge {
    pub fn new(topo: &Topology, routing: Routing, ratio: f64) -> Result<Self, StrategyError> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(StrategyError::InvalidRatio {
                name: "edge_cache_ratio",
                value: ratio,
            });
        }
        let assignment = HashAssignment::new(topo)?;
        let mut proxy = FxHashMap::default();
        for receiver in topo.receivers() {
            let attachment = topo
                .neighbors(receiver)?
                .first()
                .copied()
                .ok_or(StrategyError::IsolatedReceiver(receiver))?;
            if !topo.has_cache(attachment) {
                return Err(StrategyError::ProxyWithoutCache {
                    receiver,
                    proxy: attachment,
                });
            }
            proxy.insert(receiver, attachment);
        }
        Ok(Self {
            assignment,
            routing,
            proxy,
        })
    }
}

impl Strategy for HashroutingEdge {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let cache = self.assignment.authoritative(ev.content);
        let proxy = self.proxy[&ev.receiver];
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        ctrl.forward_request_hop(ev.receiver, proxy);
        if proxy != cache {
            if ctrl.get_content_local_cache(proxy) {
                ctrl.forward_content_hop(proxy, ev.receiver, true);
                ctrl.end_session();
                return Ok(());
            }
            ctrl.forward_request_path(proxy, cache)?;
        }
        if ctrl.get_content(cache) {
            ctrl.forward_content_path(cache, proxy, true)?;
        } else {
            ctrl.forward_request_path(cache, source)?;
            if !ctrl.get_content(source) {
                return Err(SimError::ContentNotFound {
                    node: source,
                    content: ev.content,
                });
            }
            match self.routing {
                Routing::Symm => {
                    ctrl.forward_content_path(source, cache, true)?;
                    ctrl.put_content(cache);
                    ctrl.forward_content_path(cache, proxy, true)?;
                }
                Routing::Asymm => {
                    if ctrl.topology().shortest_path(source, proxy)?.contains(&cache) {
                        ctrl.forward_content_path(source, cache, true)?;
                        ctrl.put_content(cache);
                        ctrl.forward_content_path(cache, proxy, true)?;
                    } else {
                        ctrl.forward_content_path(source, proxy, true)?;
                    }
                }
                Routing::Multicast => {
                    let direct = ctrl.topology().shortest_path(source, proxy)?;
                    if direct.contains(&cache) {
                        ctrl.forward_content_path(source, cache, true)?;
                        ctrl.put_content(cache);
                        ctrl.forward_content_path(cache, proxy, true)?;
                    } else {
                        let cache_path = ctrl.topology().shortest_path(source, cache)?;
                        let fork = fork_node(&cache_path, &direct, cache);
                        ctrl.forward_content_path(source, fork, true)?;
                        ctrl.forward_content_path(fork, proxy, true)?;
                        ctrl.forward_content_path(fork, cache, false)?;
                        ctrl.put_content(cache);
                    }
                }
            }
        }
        if proxy != cache {
            ctrl.put_content_local_cache(proxy);
        }
        ctrl.forward_content_hop(proxy, ev.receiver, true);
        ctrl.end_session();
        Ok(())
    }
}

/// Hash-routing where every on-path router keeps an uncoordinated local
/// partition that is queried opportunistically as requests travel by.
pub struct HashroutingOnPath {
    assignment: HashAssignment,
    routing: Routing,
}

impl HashroutingOnPath {
    pub fn new(topo: &Topology, routing: Routing, ratio: f64) -> Result<Self, StrategyError> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(StrategyError::InvalidRatio {
                name: "on_path_cache_ratio",
                value: ratio,
            });
        }
        Ok(Self {
            assignment: HashAssignment::new(topo)?,
            routing,
        })
    }
}

impl Strategy for HashroutingOnPath {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let cache = self.assignment.authoritative(ev.content);
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);

        // Walk towards the authoritative cache, trying local partitions.
        let path = ctrl.topology().shortest_path(ev.receiver, cache)?;
        let mut serving = None;
        for (u, v) in path_links(&path) {
            ctrl.forward_request_hop(u, v);
            if v != cache && ctrl.get_content_local_cache(v) {
                serving = Some((v, true));
                break;
            }
        }
        if serving.is_none() {
            if ctrl.get_content(cache) {
                serving = Some((cache, true));
            } else {
                // Keep walking towards the source, still trying local
                // partitions on the way.
                let path = ctrl.topology().shortest_path(cache, source)?;
                for (u, v) in path_links(&path) {
                    ctrl.forward_request_hop(u, v);
                    if v != source && ctrl.get_content_local_cache(v) {
                        serving = Some((v, false));
                        break;
                    }
                }
                if serving.is_none() {
                    if !ctrl.get_content(source) {
                        return Err(SimError::ContentNotFound {
                            node: source,
                            content: ev.content,
                        });
                    }
                    serving = Some((source, false));
                }
            }
        }
        let (serving_node, before_cache) = serving.unwrap_or((source, false));

        // A copy found between receiver and authoritative cache returns
        // directly, seeding local partitions on the way.
        if before_cache {
            let back: Vec<_> = ctrl
                .topology()
                .shortest_path(ev.receiver, serving_node)?
                .into_iter()
                .rev()
                .collect();
            for (u, v) in path_links(&back) {
                ctrl.forward_content_hop(u, v, true);
                if v != ev.receiver {
                    ctrl.put_content_local_cache(v);
                }
            }
            ctrl.end_session();
            return Ok(());
        }
        match self.routing {
            Routing::Symm => {
                let to_cache: Vec<_> = ctrl
                    .topology()
                    .shortest_path(cache, serving_node)?
                    .into_iter()
                    .rev()
                    .collect();
                let to_receiver: Vec<_> = ctrl
                    .topology()
                    .shortest_path(ev.receiver, cache)?
                    .into_iter()
                    .rev()
                    .collect();
                for (u, v) in path_links(&to_cache).chain(path_links(&to_receiver)) {
                    ctrl.forward_content_hop(u, v, true);
                    if v == cache {
                        ctrl.put_content(v);
                    } else {
                        ctrl.put_content_local_cache(v);
                    }
                }
            }
            Routing::Asymm => {
                let back: Vec<_> = ctrl
                    .topology()
                    .shortest_path(ev.receiver, serving_node)?
                    .into_iter()
                    .rev()
                    .collect();
                for (u, v) in path_links(&back) {
                    ctrl.forward_content_hop(u, v, true);
                    if v == cache {
                        ctrl.put_content(v);
                    } else {
                        ctrl.put_content_local_cache(v);
                    }
                }
            }
            Routing::Multicast => {
                let main: Vec<_> =
                    path_links(&ctrl.topology().shortest_path(serving_node, ev.receiver)?)
                        .collect();
                let main_set: FxHashSet<_> = main.iter().copied().collect();
                let tree = ctrl
                    .topology()
                    .multicast_tree(serving_node, &[ev.receiver, cache])?;
                for (u, v) in side_branches(&tree, &main_set) {
                    ctrl.forward_content_hop(u, v, false);
                    if v == cache {
                        ctrl.put_content(v);
                    } else {
                        ctrl.put_content_local_cache(v);
                    }
                }
                for (u, v) in main {
                    ctrl.forward_content_hop(u, v, true);
                    if v == cache {
                        ctrl.put_content(v);
                    } else {
                        ctrl.put_content_local_cache(v);
                    }
                }
            }
        }
        ctrl.end_session();
        Ok(())
    }
}
