//! Measurement sinks for finished sessions.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::controller::{HopKind, QueryKind, SessionRecord};
use crate::types::NodeId;

/// Receives the record of every logged session.
pub trait Collector {
    fn record(&mut self, record: &SessionRecord);
}

/// Lets callers keep a handle on a collector after attaching it to a
/// controller.
impl<C: Collector> Collector for Rc<RefCell<C>> {
    fn record(&mut self, record: &SessionRecord) {
        self.borrow_mut().record(record);
    }
}

/// Keeps every session record verbatim. Mostly useful in tests.
#[derive(Debug, Default)]
pub struct RecordCollector {
    records: Vec<SessionRecord>,
}

impl RecordCollector {
    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }
}

impl Collector for RecordCollector {
    fn record(&mut self, record: &SessionRecord) {
        self.records.push(record.clone());
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct LinkCounters {
    requests: usize,
    content: usize,
    external: bool,
}

/// Aggregates cache hit ratio, mean session latency and per-link traffic
/// counts over the measured phase of a run.
#[derive(Debug, Default)]
pub struct StatsCollector {
    nr_sessions: usize,
    nr_cache_hits: usize,
    nr_server_hits: usize,
    latency_sum: f64,
    link_counts: FxHashMap<(NodeId, NodeId), LinkCounters>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nr_sessions(&self) -> usize {
        self.nr_sessions
    }

    /// Fraction of sessions answered by a cache rather than a source.
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.nr_cache_hits + self.nr_server_hits;
        if total == 0 {
            return 0.0;
        }
        self.nr_cache_hits as f64 / total as f64
    }

    /// Mean per-session latency: request hop delays plus main-path content
    /// hop delays.
    pub fn mean_latency(&self) -> f64 {
        if self.nr_sessions == 0 {
            return 0.0;
        }
        self.latency_sum / self.nr_sessions as f64
    }

    pub fn summary(&self) -> Summary {
        let mut link_loads: Vec<LinkLoad> = self
            .link_counts
            .iter()
            .map(|(&(from, to), counters)| LinkLoad {
                from,
                to,
                external: counters.external,
                nr_requests: counters.requests,
                nr_content: counters.content,
            })
            .collect();
        link_loads.sort_by_key(|load| (load.from, load.to));
        Summary {
            nr_sessions: self.nr_sessions,
            cache_hit_ratio: self.cache_hit_ratio(),
            mean_latency: self.mean_latency(),
            link_loads,
        }
    }
}

impl Collector for StatsCollector {
    fn record(&mut self, rec: &SessionRecord) {
        self.nr_sessions += 1;
        // The first positive query identifies who served the session.
        if let Some(query) = rec.queries.iter().find(|q| q.hit) {
            match query.kind {
                QueryKind::Cache => self.nr_cache_hits += 1,
                QueryKind::Source => self.nr_server_hits += 1,
            }
        }
        for hop in &rec.hops {
            let counters = self.link_counts.entry((hop.from, hop.to)).or_default();
            counters.external = hop.external;
            match hop.kind {
                HopKind::Request => {
                    counters.requests += 1;
                    self.latency_sum += hop.delay;
                }
                HopKind::Content => {
                    counters.content += 1;
                    if hop.main_path {
                        self.latency_sum += hop.delay;
                    }
                }
            }
        }
    }
}

/// Aggregate results of one run, ready for serialization.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Summary {
    pub nr_sessions: usize,
    pub cache_hit_ratio: f64,
    pub mean_latency: f64,
    pub link_loads: Vec<LinkLoad>,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LinkLoad {
    pub from: NodeId,
    pub to: NodeId,
    pub external: bool,
    pub nr_requests: usize,
    pub nr_content: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{CacheQuery, Hop};
    use crate::types::ContentId;

    fn hop(from: usize, to: usize, kind: HopKind, main_path: bool) -> Hop {
        Hop {
            from: NodeId::new(from),
            to: NodeId::new(to),
            kind,
            main_path,
            delay: 1.0,
            external: false,
        }
    }

    fn session(queries: Vec<CacheQuery>, hops: Vec<Hop>) -> SessionRecord {
        SessionRecord {
            time: 0.0,
            receiver: NodeId::new(0),
            content: ContentId::new(1),
            hops,
            queries,
            served_by: None,
        }
    }

    #[test]
    fn hit_ratio_counts_first_positive_query() {
        let mut stats = StatsCollector::new();
        stats.record(&session(
            vec![
                CacheQuery {
                    node: NodeId::new(1),
                    kind: QueryKind::Cache,
                    hit: false,
                },
                CacheQuery {
                    node: NodeId::new(2),
                    kind: QueryKind::Cache,
                    hit: true,
                },
            ],
            Vec::new(),
        ));
        stats.record(&session(
            vec![CacheQuery {
                node: NodeId::new(4),
                kind: QueryKind::Source,
                hit: true,
            }],
            Vec::new(),
        ));
        assert_eq!(stats.cache_hit_ratio(), 0.5);
    }

    #[test]
    fn latency_skips_side_branch_hops() {
        let mut stats = StatsCollector::new();
        stats.record(&session(
            Vec::new(),
            vec![
                hop(0, 1, HopKind::Request, true),
                hop(1, 0, HopKind::Content, true),
                hop(1, 2, HopKind::Content, false),
            ],
        ));
        assert_eq!(stats.mean_latency(), 2.0);
    }

    #[test]
    fn link_loads_count_per_direction() {
        let mut stats = StatsCollector::new();
        stats.record(&session(
            Vec::new(),
            vec![
                hop(0, 1, HopKind::Request, true),
                hop(0, 1, HopKind::Request, true),
                hop(1, 0, HopKind::Content, true),
            ],
        ));
        let summary = stats.summary();
        assert_eq!(summary.link_loads.len(), 2);
        let forward = &summary.link_loads[0];
        assert_eq!((forward.from, forward.to), (NodeId::new(0), NodeId::new(1)));
        assert_eq!(forward.nr_requests, 2);
        assert_eq!(forward.nr_content, 0);
        let back = &summary.link_loads[1];
        assert_eq!(back.nr_content, 1);
    }
}
