//! Content-to-source placement.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rustc_hash::FxHashMap;

use icnsim::topology::Topology;
use icnsim::types::{ContentId, NodeId};

#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("topology has no source nodes")]
    NoSources,
    #[error("invalid source weights: {0}")]
    Weights(#[from] rand::distributions::WeightedError),
}

/// Assigns every content to a uniformly drawn source.
pub fn uniform_content_placement(
    topo: &Topology,
    contents: impl IntoIterator<Item = ContentId>,
    seed: u64,
) -> Result<FxHashMap<ContentId, NodeId>, PlacementError> {
    let sources: Vec<NodeId> = topo.sources().collect();
    if sources.is_empty() {
        return Err(PlacementError::NoSources);
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(contents
        .into_iter()
        .map(|content| (content, sources[rng.gen_range(0..sources.len())]))
        .collect())
}

/// Assigns every content to a source drawn proportionally to its weight.
/// Weights are a slice rather than a map so draws stay deterministic.
pub fn weighted_content_placement(
    contents: impl IntoIterator<Item = ContentId>,
    weights: &[(NodeId, f64)],
    seed: u64,
) -> Result<FxHashMap<ContentId, NodeId>, PlacementError> {
    if weights.is_empty() {
        return Err(PlacementError::NoSources);
    }
    let index = WeightedIndex::new(weights.iter().map(|&(_, w)| w))?;
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(contents
        .into_iter()
        .map(|content| (content, weights[index.sample(&mut rng)].0))
        .collect())
}
