//! Strategies that cache along the request path.
//!
//! All of them share the same skeleton: route the request towards the
//! content's source, stop at the first cache holding a copy, deliver the
//! content back over the reverse path and decide who keeps a copy on the way
//! down. They differ only in that last decision.

use itertools::Itertools;
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rustc_hash::FxHashMap;

use super::{locate_on_path, path_links, Metacaching, Strategy, StrategyError};
use crate::controller::NetworkController;
use crate::topology::Topology;
use crate::types::{Event, NodeId};
use crate::SimError;

/// Serves everything from the sources. The baseline every caching strategy is
/// measured against.
pub struct NoCache;

impl Strategy for NoCache {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let path = ctrl.topology().shortest_path(ev.receiver, source)?;
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        ctrl.forward_request_along(&path);
        if !ctrl.get_content(source) {
            return Err(SimError::ContentNotFound {
                node: source,
                content: ev.content,
            });
        }
        let back: Vec<_> = path.into_iter().rev().collect();
        ctrl.forward_content_along(&back, true);
        ctrl.end_session();
        Ok(())
    }
}

/// Every cache on the delivery path keeps a copy.
pub struct LeaveCopyEverywhere;

impl Strategy for LeaveCopyEverywhere {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let path = ctrl.topology().shortest_path(ev.receiver, source)?;
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        let serving = locate_on_path(ctrl, &path, ev.content)?;
        let back: Vec<_> = ctrl
            .topology()
            .shortest_path(ev.receiver, serving)?
            .into_iter()
            .rev()
            .collect();
        for (u, v) in path_links(&back) {
            ctrl.forward_content_hop(u, v, true);
            if ctrl.topology().has_cache(v) {
                ctrl.put_content(v);
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// Only the cache one level below the serving node keeps a copy, so content
/// trickles towards the edge one request at a time.
pub struct LeaveCopyDown;

impl Strategy for LeaveCopyDown {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let path = ctrl.topology().shortest_path(ev.receiver, source)?;
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        let serving = locate_on_path(ctrl, &path, ev.content)?;
        let back: Vec<_> = ctrl
            .topology()
            .shortest_path(ev.receiver, serving)?
            .into_iter()
            .rev()
            .collect();
        let mut copied = false;
        for (u, v) in path_links(&back) {
            ctrl.forward_content_hop(u, v, true);
            if !copied && v != ev.receiver && ctrl.topology().has_cache(v) {
                ctrl.put_content(v);
                copied = true;
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// Caches probabilistically, weighting insertion towards nodes with little
/// remaining cache capacity downstream.
pub struct ProbCache {
    t_tw: f64,
    cache_size: FxHashMap<NodeId, usize>,
    rng: StdRng,
}

impl ProbCache {
    pub fn new(topo: &Topology, t_tw: f64, seed: u64) -> Result<Self, StrategyError> {
        if t_tw <= 0.0 {
            return Err(StrategyError::InvalidTtw(t_tw));
        }
        Ok(Self {
            t_tw,
            cache_size: topo.cache_nodes().into_iter().collect(),
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl Strategy for ProbCache {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let path = ctrl.topology().shortest_path(ev.receiver, source)?;
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        let serving = locate_on_path(ctrl, &path, ev.content)?;
        let back: Vec<_> = ctrl
            .topology()
            .shortest_path(ev.receiver, serving)?
            .into_iter()
            .rev()
            .collect();
        let c = back
            .iter()
            .filter(|v| self.cache_size.contains_key(v))
            .count() as f64;
        let mut x = 0.0;
        for hop in 1..back.len() {
            let u = back[hop - 1];
            let v = back[hop];
            let remaining: usize = back[hop - 1..]
                .iter()
                .filter_map(|n| self.cache_size.get(n))
                .sum();
            if self.cache_size.contains_key(&v) {
                x += 1.0;
            }
            ctrl.forward_content_hop(u, v, true);
            if v == ev.receiver {
                continue;
            }
            if let Some(&size) = self.cache_size.get(&v) {
                let prob = remaining as f64 / (self.t_tw * size as f64) * (x / c).powf(c);
                if self.rng.gen::<f64>() < prob {
                    ctrl.put_content(v);
                }
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// Caches at the on-path node with the highest betweenness centrality; ties
/// go to the node closest to the receiver.
pub struct CacheLessForMore {
    betw: FxHashMap<NodeId, f64>,
}

impl CacheLessForMore {
    pub fn new(topo: &Topology) -> Self {
        Self {
            betw: topo.betweenness(),
        }
    }
}

impl Strategy for CacheLessForMore {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let path = ctrl.topology().shortest_path(ev.receiver, source)?;
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        let serving = locate_on_path(ctrl, &path, ev.content)?;
        let back: Vec<_> = ctrl
            .topology()
            .shortest_path(ev.receiver, serving)?
            .into_iter()
            .rev()
            .collect();
        let mut max_betw = -1.0;
        let mut designated = None;
        for &v in &back[1..] {
            if ctrl.topology().has_cache(v) && self.betw[&v] >= max_betw {
                max_betw = self.betw[&v];
                designated = Some(v);
            }
        }
        for (u, v) in path_links(&back) {
            ctrl.forward_content_hop(u, v, true);
            if designated == Some(v) {
                ctrl.put_content(v);
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// Every on-path cache keeps a copy independently with probability `p`.
pub struct RandomBernoulli {
    p: f64,
    rng: StdRng,
}

impl RandomBernoulli {
    pub fn new(p: f64, seed: u64) -> Result<Self, StrategyError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(StrategyError::InvalidRatio { name: "p", value: p });
        }
        Ok(Self {
            p,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl Strategy for RandomBernoulli {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let path = ctrl.topology().shortest_path(ev.receiver, source)?;
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        let serving = locate_on_path(ctrl, &path, ev.content)?;
        let back: Vec<_> = ctrl
            .topology()
            .shortest_path(ev.receiver, serving)?
            .into_iter()
            .rev()
            .collect();
        for (u, v) in path_links(&back) {
            ctrl.forward_content_hop(u, v, true);
            if v != ev.receiver && ctrl.topology().has_cache(v) && self.rng.gen::<f64>() < self.p {
                ctrl.put_content(v);
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// One uniformly chosen cache strictly between the serving node and the
/// receiver keeps a copy.
pub struct RandomChoice {
    rng: StdRng,
}

impl RandomChoice {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Strategy for RandomChoice {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let path = ctrl.topology().shortest_path(ev.receiver, source)?;
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        let serving = locate_on_path(ctrl, &path, ev.content)?;
        let back: Vec<_> = ctrl
            .topology()
            .shortest_path(ev.receiver, serving)?
            .into_iter()
            .rev()
            .collect();
        let interior = &back[1..back.len().saturating_sub(1)];
        let caches: Vec<_> = interior
            .iter()
            .copied()
            .filter(|&v| ctrl.topology().has_cache(v))
            .collect();
        let designated = caches.choose(&mut self.rng).copied();
        for (u, v) in path_links(&back) {
            ctrl.forward_content_hop(u, v, true);
            if designated == Some(v) {
                ctrl.put_content(v);
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// Routes the request to the replica closest to the receiver by delay,
/// whether that is a cache or the source.
pub struct NearestReplicaRouting {
    metacaching: Metacaching,
    distance: FxHashMap<NodeId, FxHashMap<NodeId, f64>>,
}

impl NearestReplicaRouting {
    pub fn new(topo: &Topology, metacaching: Metacaching) -> Self {
        Self {
            metacaching,
            distance: topo.delay_distances(),
        }
    }
}

impl Strategy for NearestReplicaRouting {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let locations = ctrl.content_locations(ev.content)?;
        let from_receiver = &self.distance[&ev.receiver];
        // Ties go to the first candidate, so a cache beats the source and a
        // lower-numbered cache beats a higher-numbered one.
        let nearest = locations
            .iter()
            .position_min_by_key(|loc| OrderedFloat(from_receiver[loc]))
            .map(|pos| locations[pos])
            .unwrap_or_else(|| unreachable!("locations always include the source"));
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        ctrl.forward_request_path(ev.receiver, nearest)?;
        if !ctrl.get_content(nearest) {
            return Err(SimError::ContentNotFound {
                node: nearest,
                content: ev.content,
            });
        }
        let back: Vec<_> = ctrl
            .topology()
            .shortest_path(ev.receiver, nearest)?
            .into_iter()
            .rev()
            .collect();
        match self.metacaching {
            Metacaching::Lce => {
                for (u, v) in path_links(&back) {
                    ctrl.forward_content_hop(u, v, true);
                    if ctrl.topology().has_cache(v) && !ctrl.cache_peek(v, ev.content) {
                        ctrl.put_content(v);
                    }
                }
            }
            Metacaching::Lcd => {
                let mut copied = false;
                for (u, v) in path_links(&back) {
                    ctrl.forward_content_hop(u, v, true);
                    if !copied && v != ev.receiver && ctrl.topology().has_cache(v) {
                        ctrl.put_content(v);
                        copied = true;
                    }
                }
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// Caches only at the first caching node the request meets. A miss there goes
/// straight to the source and seeds that edge cache on the way back.
pub struct EdgeCaching;

impl Strategy for EdgeCaching {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let path = ctrl.topology().shortest_path(ev.receiver, source)?;
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        let mut edge_cache = None;
        let mut serving = None;
        for (u, v) in path_links(&path) {
            ctrl.forward_request_hop(u, v);
            if ctrl.topology().has_cache(v) {
                edge_cache = Some(v);
                serving = Some(if ctrl.get_content(v) {
                    v
                } else {
                    ctrl.forward_request_path(v, source)?;
                    if !ctrl.get_content(source) {
                        return Err(SimError::ContentNotFound {
                            node: source,
                            content: ev.content,
                        });
                    }
                    source
                });
                break;
            }
        }
        let serving = match serving {
            Some(node) => node,
            None => {
                // No cache anywhere on the path.
                if !ctrl.get_content(source) {
                    return Err(SimError::ContentNotFound {
                        node: source,
                        content: ev.content,
                    });
                }
                source
            }
        };
        let back: Vec<_> = ctrl
            .topology()
            .shortest_path(ev.receiver, serving)?
            .into_iter()
            .rev()
            .collect();
        ctrl.forward_content_along(&back, true);
        if serving == source {
            if let Some(cache) = edge_cache {
                ctrl.put_content(cache);
            }
        }
        ctrl.end_session();
        Ok(())
    }
}

/// Every receiver is pinned to one dedicated cache that mediates all of its
/// traffic. Requires a receiver-to-cache assignment on the topology.
pub struct Partition {
    assignment: FxHashMap<NodeId, NodeId>,
}

impl Partition {
    pub fn new(topo: &Topology) -> Result<Self, StrategyError> {
        let assignment = topo.cache_assignment().clone();
        for receiver in topo.receivers() {
            if !assignment.contains_key(&receiver) {
                return Err(StrategyError::MissingCacheAssignment(receiver));
            }
        }
        Ok(Self { assignment })
    }
}

impl Strategy for Partition {
    fn process_event(&mut self, ctrl: &mut NetworkController, ev: &Event) -> Result<(), SimError> {
        let source = ctrl.topology().content_source(ev.content)?;
        let cache = self.assignment[&ev.receiver];
        ctrl.start_session(ev.time, ev.receiver, ev.content, ev.log);
        ctrl.forward_request_path(ev.receiver, cache)?;
        if !ctrl.get_content(cache) {
            ctrl.forward_request_path(cache, source)?;
            if !ctrl.get_content(source) {
                return Err(SimError::ContentNotFound {
                    node: source,
                    content: ev.content,
                });
            }
            ctrl.forward_content_path(source, cache, true)?;
            ctrl.put_content(cache);
        }
        ctrl.forward_content_path(cache, ev.receiver, true)?;
        ctrl.end_session();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::cache::Policy;
    use crate::collectors::RecordCollector;
    use crate::controller::{HopKind, QueryKind};
    use crate::testing;
    use crate::topology::Topology;
    use crate::types::ContentId;

    fn n(id: usize) -> NodeId {
        NodeId::new(id)
    }

    fn c(id: u64) -> ContentId {
        ContentId::new(id)
    }

    fn controller(mut topo: Topology, source: usize) -> (NetworkController, Rc<RefCell<RecordCollector>>) {
        topo.place_content(c(1), n(source)).unwrap();
        let mut ctrl = NetworkController::new(topo, Policy::Lru, 0);
        let records = Rc::new(RefCell::new(RecordCollector::default()));
        ctrl.attach_collector(Box::new(Rc::clone(&records)));
        (ctrl, records)
    }

    fn ev(receiver: usize) -> Event {
        Event::new(0.0, n(receiver), c(1), true)
    }

    fn request_hops(records: &RecordCollector, session: usize) -> Vec<(NodeId, NodeId)> {
        records.records()[session]
            .hops
            .iter()
            .filter(|h| h.kind == HopKind::Request)
            .map(|h| (h.from, h.to))
            .collect()
    }

    fn content_hops(records: &RecordCollector, session: usize) -> Vec<(NodeId, NodeId)> {
        records.records()[session]
            .hops
            .iter()
            .filter(|h| h.kind == HopKind::Content)
            .map(|h| (h.from, h.to))
            .collect()
    }

    #[test]
    fn no_cache_always_reaches_the_source() -> anyhow::Result<()> {
        let (mut ctrl, records) = controller(testing::line_topology(3, 1), 4);
        let mut strategy = NoCache;
        strategy.process_event(&mut ctrl, &ev(0))?;
        strategy.process_event(&mut ctrl, &ev(0))?;
        for node in 1..=3 {
            assert!(!ctrl.cache_peek(n(node), c(1)));
        }
        let records = records.borrow();
        for session in 0..2 {
            assert_eq!(records.records()[session].served_by, Some(n(4)));
            assert_eq!(request_hops(&records, session).len(), 4);
            assert_eq!(content_hops(&records, session).len(), 4);
        }
        Ok(())
    }

    #[test]
    fn lce_miss_then_hit_on_a_line() -> anyhow::Result<()> {
        // One cache of capacity 1 at node 2 of a 5-node line.
        let (mut ctrl, records) = controller(testing::line_with_caches(3, &[2], 1), 4);
        let mut strategy = LeaveCopyEverywhere;
        strategy.process_event(&mut ctrl, &ev(0))?;
        assert!(ctrl.cache_peek(n(2), c(1)));
        strategy.process_event(&mut ctrl, &ev(0))?;

        let records = records.borrow();
        assert_eq!(
            request_hops(&records, 0),
            vec![(n(0), n(1)), (n(1), n(2)), (n(2), n(3)), (n(3), n(4))]
        );
        assert_eq!(
            content_hops(&records, 0),
            vec![(n(4), n(3)), (n(3), n(2)), (n(2), n(1)), (n(1), n(0))]
        );
        let miss = &records.records()[0];
        assert_eq!(miss.served_by, Some(n(4)));
        assert_eq!(
            miss.queries
                .iter()
                .map(|q| (q.node, q.kind, q.hit))
                .collect::<Vec<_>>(),
            vec![
                (n(2), QueryKind::Cache, false),
                (n(4), QueryKind::Source, true)
            ]
        );

        assert_eq!(request_hops(&records, 1), vec![(n(0), n(1)), (n(1), n(2))]);
        assert_eq!(content_hops(&records, 1), vec![(n(2), n(1)), (n(1), n(0))]);
        assert_eq!(records.records()[1].served_by, Some(n(2)));
        Ok(())
    }

    #[test]
    fn lce_fills_every_cache_on_the_path() -> anyhow::Result<()> {
        let (mut ctrl, _) = controller(testing::line_topology(3, 1), 4);
        LeaveCopyEverywhere.process_event(&mut ctrl, &ev(0))?;
        for node in 1..=3 {
            assert!(ctrl.cache_peek(n(node), c(1)));
        }
        Ok(())
    }

    #[test]
    fn lcd_moves_content_one_level_per_request() -> anyhow::Result<()> {
        let (mut ctrl, _) = controller(testing::line_topology(3, 1), 4);
        let mut strategy = LeaveCopyDown;
        strategy.process_event(&mut ctrl, &ev(0))?;
        assert!(!ctrl.cache_peek(n(1), c(1)));
        assert!(!ctrl.cache_peek(n(2), c(1)));
        assert!(ctrl.cache_peek(n(3), c(1)));
        strategy.process_event(&mut ctrl, &ev(0))?;
        assert!(!ctrl.cache_peek(n(1), c(1)));
        assert!(ctrl.cache_peek(n(2), c(1)));
        Ok(())
    }

    #[test]
    fn cl4m_prefers_high_betweenness_then_receiver_side() -> anyhow::Result<()> {
        // 0-1-2-3-4: node 2 has the highest centrality.
        let (mut ctrl, _) = controller(testing::line_topology(3, 1), 4);
        let mut strategy = CacheLessForMore::new(ctrl.topology());
        strategy.process_event(&mut ctrl, &ev(0))?;
        assert!(!ctrl.cache_peek(n(1), c(1)));
        assert!(ctrl.cache_peek(n(2), c(1)));
        assert!(!ctrl.cache_peek(n(3), c(1)));

        // 0-1-2-3 with caches at 1 and 2: equal centrality, the tie goes to
        // the node nearer the receiver.
        let (mut ctrl, _) = controller(testing::line_topology(2, 1), 3);
        let mut strategy = CacheLessForMore::new(ctrl.topology());
        strategy.process_event(&mut ctrl, &ev(0))?;
        assert!(ctrl.cache_peek(n(1), c(1)));
        assert!(!ctrl.cache_peek(n(2), c(1)));
        Ok(())
    }

    #[test]
    fn prob_cache_saturates_for_tiny_characteristic_time() -> anyhow::Result<()> {
        let (mut ctrl, _) = controller(testing::line_topology(3, 1), 4);
        let mut strategy = ProbCache::new(ctrl.topology(), 0.01, 0)?;
        strategy.process_event(&mut ctrl, &ev(0))?;
        for node in 1..=3 {
            assert!(ctrl.cache_peek(n(node), c(1)));
        }
        Ok(())
    }

    #[test]
    fn prob_cache_rarely_inserts_for_huge_characteristic_time() -> anyhow::Result<()> {
        let (mut ctrl, _) = controller(testing::line_topology(3, 1), 4);
        let mut strategy = ProbCache::new(ctrl.topology(), 1e12, 0)?;
        strategy.process_event(&mut ctrl, &ev(0))?;
        for node in 1..=3 {
            assert!(!ctrl.cache_peek(n(node), c(1)));
        }
        Ok(())
    }

    #[test]
    fn bernoulli_extremes_cache_everywhere_or_nowhere() -> anyhow::Result<()> {
        let (mut ctrl, _) = controller(testing::line_topology(3, 1), 4);
        RandomBernoulli::new(1.0, 0)?.process_event(&mut ctrl, &ev(0))?;
        for node in 1..=3 {
            assert!(ctrl.cache_peek(n(node), c(1)));
        }
        let (mut ctrl, _) = controller(testing::line_topology(3, 1), 4);
        RandomBernoulli::new(0.0, 0)?.process_event(&mut ctrl, &ev(0))?;
        for node in 1..=3 {
            assert!(!ctrl.cache_peek(n(node), c(1)));
        }
        Ok(())
    }

    #[test]
    fn random_choice_designates_exactly_one_interior_cache() -> anyhow::Result<()> {
        let (mut ctrl, _) = controller(testing::line_topology(3, 1), 4);
        RandomChoice::new(7).process_event(&mut ctrl, &ev(0))?;
        let holders = (1..=3).filter(|&v| ctrl.cache_peek(n(v), c(1))).count();
        assert_eq!(holders, 1);
        Ok(())
    }

    #[test]
    fn nrr_fetches_from_the_closest_replica() -> anyhow::Result<()> {
        let (mut ctrl, records) = controller(testing::line_topology(3, 1), 4);
        // Seed a replica close to the receiver.
        ctrl.start_session(0.0, n(0), c(1), false);
        ctrl.put_content(n(3));
        ctrl.end_session();

        let mut strategy = NearestReplicaRouting::new(ctrl.topology(), Metacaching::Lce);
        strategy.process_event(&mut ctrl, &ev(0))?;
        let records = records.borrow();
        assert_eq!(records.records()[0].served_by, Some(n(3)));
        assert_eq!(
            request_hops(&records, 0),
            vec![(n(0), n(1)), (n(1), n(2)), (n(2), n(3))]
        );
        // LCE metacaching fills the caches passed on the way back.
        assert!(ctrl.cache_peek(n(2), c(1)));
        assert!(ctrl.cache_peek(n(1), c(1)));
        Ok(())
    }

    #[test]
    fn nrr_lcd_copies_one_level_below_the_replica() -> anyhow::Result<()> {
        let (mut ctrl, _) = controller(testing::line_topology(3, 1), 4);
        ctrl.start_session(0.0, n(0), c(1), false);
        ctrl.put_content(n(3));
        ctrl.end_session();

        let mut strategy = NearestReplicaRouting::new(ctrl.topology(), Metacaching::Lcd);
        strategy.process_event(&mut ctrl, &ev(0))?;
        assert!(ctrl.cache_peek(n(2), c(1)));
        assert!(!ctrl.cache_peek(n(1), c(1)));
        Ok(())
    }

    #[test]
    fn edge_caches_only_at_the_first_cache_met() -> anyhow::Result<()> {
        let (mut ctrl, records) = controller(testing::line_with_caches(3, &[2], 1), 4);
        let mut strategy = EdgeCaching;
        strategy.process_event(&mut ctrl, &ev(0))?;
        assert!(ctrl.cache_peek(n(2), c(1)));
        strategy.process_event(&mut ctrl, &ev(0))?;
        let records = records.borrow();
        assert_eq!(records.records()[1].served_by, Some(n(2)));
        assert_eq!(content_hops(&records, 1), vec![(n(2), n(1)), (n(1), n(0))]);
        Ok(())
    }

    #[test]
    fn edge_handles_paths_without_caches() -> anyhow::Result<()> {
        let (mut ctrl, records) = controller(testing::line_with_caches(2, &[], 1), 3);
        EdgeCaching.process_event(&mut ctrl, &ev(0))?;
        let records = records.borrow();
        assert_eq!(records.records()[0].served_by, Some(n(3)));
        Ok(())
    }

    #[test]
    fn partition_pins_receivers_to_their_cache() -> anyhow::Result<()> {
        let mut topo = testing::line_with_caches(3, &[2], 1);
        topo.set_cache_assignment([(n(0), n(2))].into_iter().collect())?;
        let (mut ctrl, records) = controller(topo, 4);
        let mut strategy = Partition::new(ctrl.topology())?;
        strategy.process_event(&mut ctrl, &ev(0))?;
        strategy.process_event(&mut ctrl, &ev(0))?;
        let records = records.borrow();
        assert_eq!(records.records()[0].served_by, Some(n(4)));
        assert_eq!(records.records()[1].served_by, Some(n(2)));
        assert_eq!(request_hops(&records, 1), vec![(n(0), n(1)), (n(1), n(2))]);
        Ok(())
    }
}
