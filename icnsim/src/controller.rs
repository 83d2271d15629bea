//! Session bookkeeping and the forwarding/caching primitives strategies
//! compose their behavior from.
//!
//! A strategy opens a session per event, forwards requests and content over
//! topology links, queries and fills caches, and closes the session. The
//! controller records every hop and cache query of a logged session and hands
//! the finished record to the attached collectors. Opening a session while
//! one is in progress, forwarding without a session or forwarding across a
//! non-adjacent node pair is a strategy bug and panics.

use rustc_hash::FxHashMap;

use crate::cache::{Cache, Policy};
use crate::collectors::Collector;
use crate::topology::{LinkKind, Topology, TopologyError};
use crate::types::{ContentId, NodeId};

/// Direction of a recorded traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HopKind {
    Request,
    Content,
}

/// One link traversal within a session.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Hop {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: HopKind,
    /// Content hops off the main delivery path (multicast side branches) do
    /// not contribute to session latency.
    pub main_path: bool,
    pub delay: f64,
    pub external: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Cache,
    Source,
}

/// One cache or source lookup within a session.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CacheQuery {
    pub node: NodeId,
    pub kind: QueryKind,
    pub hit: bool,
}

/// Everything that happened during one logged session.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SessionRecord {
    pub time: f64,
    pub receiver: NodeId,
    pub content: ContentId,
    pub hops: Vec<Hop>,
    pub queries: Vec<CacheQuery>,
    /// The node that ultimately served the content.
    pub served_by: Option<NodeId>,
}

#[derive(Debug, Clone, Copy)]
struct Session {
    content: ContentId,
    log: bool,
}

const SEED_GAMMA: u64 = 0x9E3779B97F4A7C15;
const LOCAL_SALT: u64 = 0x517CC1B727220A95;

fn cache_seed(seed: u64, node: NodeId, salt: u64) -> u64 {
    seed ^ (node.inner() as u64).wrapping_mul(SEED_GAMMA) ^ salt
}

pub struct NetworkController {
    topology: Topology,
    policy: Policy,
    seed: u64,
    caches: FxHashMap<NodeId, Cache>,
    /// Uncoordinated partitions carved out of the node caches by
    /// [`Self::reserve_local_cache`].
    local_caches: FxHashMap<NodeId, Cache>,
    session: Option<Session>,
    record: SessionRecord,
    collectors: Vec<Box<dyn Collector>>,
}

impl NetworkController {
    /// Builds a controller with one empty cache per caching node, each seeded
    /// from `seed` and its node id.
    pub fn new(topology: Topology, policy: Policy, seed: u64) -> Self {
        let caches = topology
            .cache_nodes()
            .into_iter()
            .map(|(node, size)| (node, Cache::new(policy, size, cache_seed(seed, node, 0))))
            .collect();
        Self {
            topology,
            policy,
            seed,
            caches,
            local_caches: FxHashMap::default(),
            session: None,
            record: SessionRecord::default(),
            collectors: Vec::new(),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn attach_collector(&mut self, collector: Box<dyn Collector>) {
        self.collectors.push(collector);
    }

    pub fn cache(&self, node: NodeId) -> Option<&Cache> {
        self.caches.get(&node)
    }

    pub fn local_cache(&self, node: NodeId) -> Option<&Cache> {
        self.local_caches.get(&node)
    }

    /// Splits off `ratio` of every cache's capacity into an uncoordinated
    /// local partition. Must be called before any content is cached.
    pub fn reserve_local_cache(&mut self, ratio: f64) {
        assert!(
            (0.0..=1.0).contains(&ratio),
            "local cache ratio must be within [0, 1], got {ratio}"
        );
        if ratio == 0.0 {
            return;
        }
        let policy = self.policy;
        let seed = self.seed;
        for (&node, cache) in self.caches.iter_mut() {
            let local = (cache.capacity() as f64 * ratio).round() as usize;
            if local == 0 {
                continue;
            }
            let coordinated = cache.capacity() - local;
            *cache = Cache::new(policy, coordinated, cache_seed(seed, node, 0));
            self.local_caches
                .insert(node, Cache::new(policy, local, cache_seed(seed, node, LOCAL_SALT)));
        }
    }

    pub fn start_session(&mut self, time: f64, receiver: NodeId, content: ContentId, log: bool) {
        assert!(
            self.session.is_none(),
            "session already in progress for receiver {receiver}"
        );
        self.session = Some(Session { content, log });
        self.record = SessionRecord {
            time,
            receiver,
            content,
            ..SessionRecord::default()
        };
    }

    /// Closes the session and, if it was logged, flushes its record to the
    /// collectors.
    pub fn end_session(&mut self) {
        let session = self.session.take().expect("no session in progress");
        if session.log {
            for collector in &mut self.collectors {
                collector.record(&self.record);
            }
        }
        self.record = SessionRecord::default();
    }

    pub fn session_open(&self) -> bool {
        self.session.is_some()
    }

    fn session(&self) -> Session {
        self.session.expect("no session in progress")
    }

    fn log_hop(&mut self, from: NodeId, to: NodeId, kind: HopKind, main_path: bool) {
        let session = self.session();
        let link = self
            .topology
            .link(from, to)
            .unwrap_or_else(|| panic!("nodes {from} and {to} are not adjacent"));
        if session.log {
            self.record.hops.push(Hop {
                from,
                to,
                kind,
                main_path,
                delay: link.delay,
                external: link.kind == LinkKind::External,
            });
        }
    }

    fn log_query(&mut self, node: NodeId, kind: QueryKind, hit: bool) {
        if self.session().log {
            self.record.queries.push(CacheQuery { node, kind, hit });
        }
        if hit {
            self.record.served_by = Some(node);
        }
    }

    /// Forwards a request over one link.
    pub fn forward_request_hop(&mut self, from: NodeId, to: NodeId) {
        self.log_hop(from, to, HopKind::Request, true);
    }

    /// Forwards content over one link.
    pub fn forward_content_hop(&mut self, from: NodeId, to: NodeId, main_path: bool) {
        self.log_hop(from, to, HopKind::Content, main_path);
    }

    /// Forwards a request along the shortest path between two nodes.
    pub fn forward_request_path(&mut self, from: NodeId, to: NodeId) -> Result<(), TopologyError> {
        let path = self.topology.shortest_path(from, to)?;
        self.forward_request_along(&path);
        Ok(())
    }

    /// Forwards a request along an explicit path of adjacent nodes.
    pub fn forward_request_along(&mut self, path: &[NodeId]) {
        for hop in path.windows(2) {
            self.forward_request_hop(hop[0], hop[1]);
        }
    }

    /// Forwards content along the shortest path between two nodes.
    pub fn forward_content_path(
        &mut self,
        from: NodeId,
        to: NodeId,
        main_path: bool,
    ) -> Result<(), TopologyError> {
        let path = self.topology.shortest_path(from, to)?;
        self.forward_content_along(&path, main_path);
        Ok(())
    }

    /// Forwards content along an explicit path of adjacent nodes.
    pub fn forward_content_along(&mut self, path: &[NodeId], main_path: bool) {
        for hop in path.windows(2) {
            self.forward_content_hop(hop[0], hop[1], main_path);
        }
    }

    /// Queries `node` for the session's content. A caching node answers from
    /// its coordinated cache; the content's source always answers positively.
    /// Both outcomes are recorded; plain routers answer negatively without a
    /// record.
    pub fn get_content(&mut self, node: NodeId) -> bool {
        let content = self.session().content;
        if self.caches.contains_key(&node) {
            let hit = self
                .caches
                .get_mut(&node)
                .map(|cache| cache.get(content))
                .unwrap_or(false);
            self.log_query(node, QueryKind::Cache, hit);
            return hit;
        }
        if self.topology.content_source(content) == Ok(node) {
            self.log_query(node, QueryKind::Source, true);
            return true;
        }
        false
    }

    /// Inserts the session's content into the cache at `node`, if it has one.
    pub fn put_content(&mut self, node: NodeId) {
        let content = self.session().content;
        if let Some(cache) = self.caches.get_mut(&node) {
            cache.put(content);
        }
    }

    /// Queries the uncoordinated local partition at `node`.
    pub fn get_content_local_cache(&mut self, node: NodeId) -> bool {
        let content = self.session().content;
        if !self.local_caches.contains_key(&node) {
            return false;
        }
        let hit = self
            .local_caches
            .get_mut(&node)
            .map(|cache| cache.get(content))
            .unwrap_or(false);
        self.log_query(node, QueryKind::Cache, hit);
        hit
    }

    /// Inserts the session's content into the local partition at `node`, if
    /// one was reserved.
    pub fn put_content_local_cache(&mut self, node: NodeId) {
        let content = self.session().content;
        if let Some(cache) = self.local_caches.get_mut(&node) {
            cache.put(content);
        }
    }

    /// Whether the coordinated cache at `node` holds `content`, without
    /// touching policy state.
    pub fn cache_peek(&self, node: NodeId, content: ContentId) -> bool {
        self.caches
            .get(&node)
            .is_some_and(|cache| cache.contains(content))
    }

    /// Every node currently holding `content`: caching nodes first, ascending
    /// by id, then the source. On a distance tie a cache replica wins over
    /// the source.
    pub fn content_locations(&self, content: ContentId) -> Result<Vec<NodeId>, TopologyError> {
        let mut locations: Vec<NodeId> = self
            .caches
            .iter()
            .filter(|(_, cache)| cache.contains(content))
            .map(|(&node, _)| node)
            .collect();
        locations.sort_unstable();
        locations.push(self.topology.content_source(content)?);
        Ok(locations)
    }
}
