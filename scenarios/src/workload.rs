//! Synthetic request workloads.

use rand::prelude::*;
use rand_distr::{Exp, Zipf};
use typed_builder::TypedBuilder;

use icnsim::types::{ContentId, Event, NodeId};

#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("no receivers to draw requests from")]
    NoReceivers,
    #[error("content catalogue must not be empty")]
    EmptyCatalogue,
    #[error("alpha must be positive, got {0}")]
    InvalidAlpha(f64),
    #[error("beta must be non-negative, got {0}")]
    InvalidBeta(f64),
    #[error("request rate must be positive, got {0}")]
    InvalidRate(f64),
}

/// A stationary Poisson request stream over a Zipf-popular catalogue.
///
/// The first `n_warmup` events carry `log = false` and only warm the caches;
/// the following `n_measured` are what collectors see. Receivers are drawn
/// uniformly unless `beta` is positive, in which case they are drawn
/// Zipf-skewed by their position in `receivers`, busiest first.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StationaryWorkload {
    receivers: Vec<NodeId>,
    n_contents: u64,
    /// Zipf exponent of content popularity.
    alpha: f64,
    /// Zipf exponent of receiver load skew. Zero means uniform.
    #[builder(default = 0.0)]
    beta: f64,
    /// Mean request arrivals per time unit.
    #[builder(default = 1.0)]
    rate: f64,
    n_warmup: usize,
    n_measured: usize,
    #[builder(default = 0)]
    seed: u64,
}

impl StationaryWorkload {
    /// The full catalogue, `1..=n_contents`.
    pub fn contents(&self) -> impl Iterator<Item = ContentId> {
        (1..=self.n_contents).map(ContentId::new)
    }

    pub fn nr_events(&self) -> usize {
        self.n_warmup + self.n_measured
    }

    /// Validates the parameters and returns the event stream.
    pub fn events(&self) -> Result<Events, WorkloadError> {
        if self.receivers.is_empty() {
            return Err(WorkloadError::NoReceivers);
        }
        if self.n_contents == 0 {
            return Err(WorkloadError::EmptyCatalogue);
        }
        if self.beta < 0.0 {
            return Err(WorkloadError::InvalidBeta(self.beta));
        }
        let contents = Zipf::new(self.n_contents, self.alpha)
            .map_err(|_| WorkloadError::InvalidAlpha(self.alpha))?;
        let arrivals =
            Exp::new(self.rate).map_err(|_| WorkloadError::InvalidRate(self.rate))?;
        let receiver_ranks = if self.beta > 0.0 {
            Some(
                Zipf::new(self.receivers.len() as u64, self.beta)
                    .map_err(|_| WorkloadError::InvalidBeta(self.beta))?,
            )
        } else {
            None
        };
        Ok(Events {
            rng: StdRng::seed_from_u64(self.seed),
            receivers: self.receivers.clone(),
            contents,
            arrivals,
            receiver_ranks,
            n_warmup: self.n_warmup,
            total: self.nr_events(),
            emitted: 0,
            time: 0.0,
        })
    }
}

/// The lazily generated event stream of a [`StationaryWorkload`].
pub struct Events {
    rng: StdRng,
    receivers: Vec<NodeId>,
    contents: Zipf<f64>,
    arrivals: Exp<f64>,
    receiver_ranks: Option<Zipf<f64>>,
    n_warmup: usize,
    total: usize,
    emitted: usize,
    time: f64,
}

impl Iterator for Events {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if self.emitted == self.total {
            return None;
        }
        self.time += self.arrivals.sample(&mut self.rng);
        let receiver = match &self.receiver_ranks {
            Some(ranks) => {
                let rank = ranks.sample(&mut self.rng) as usize;
                self.receivers[rank - 1]
            }
            None => *self
                .receivers
                .choose(&mut self.rng)
                .unwrap_or(&self.receivers[0]),
        };
        let content = ContentId::new(self.contents.sample(&mut self.rng) as u64);
        let log = self.emitted >= self.n_warmup;
        self.emitted += 1;
        Some(Event::new(self.time, receiver, content, log))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.emitted;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Events {}

#[cfg(test)]
mod tests {
    use super::*;

    fn workload() -> StationaryWorkload {
        StationaryWorkload::builder()
            .receivers(vec![NodeId::new(0), NodeId::new(1)])
            .n_contents(100)
            .alpha(0.8)
            .n_warmup(50)
            .n_measured(100)
            .seed(7)
            .build()
    }

    #[test]
    fn emits_warmup_then_measured_events_in_time_order() -> anyhow::Result<()> {
        let events: Vec<_> = workload().events()?.collect();
        assert_eq!(events.len(), 150);
        assert!(events[..50].iter().all(|ev| !ev.log));
        assert!(events[50..].iter().all(|ev| ev.log));
        for pair in events.windows(2) {
            assert!(pair[0].time <= pair[1].time);
        }
        for ev in &events {
            assert!(ev.content.inner() >= 1 && ev.content.inner() <= 100);
        }
        Ok(())
    }

    #[test]
    fn same_seed_gives_the_same_stream() -> anyhow::Result<()> {
        let a: Vec<_> = workload().events()?.collect();
        let b: Vec<_> = workload().events()?.collect();
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn popularity_is_skewed_towards_low_content_ids() -> anyhow::Result<()> {
        let workload = StationaryWorkload::builder()
            .receivers(vec![NodeId::new(0)])
            .n_contents(1000)
            .alpha(1.2)
            .n_warmup(0)
            .n_measured(5000)
            .seed(1)
            .build();
        let events: Vec<_> = workload.events()?.collect();
        let top_decile = events
            .iter()
            .filter(|ev| ev.content.inner() <= 100)
            .count();
        // Under a 1.2-exponent Zipf the top 10% of the catalogue draws well
        // over half the requests.
        assert!(top_decile > events.len() / 2);
        Ok(())
    }

    #[test]
    fn receiver_skew_favors_the_front_of_the_list() -> anyhow::Result<()> {
        let workload = StationaryWorkload::builder()
            .receivers(vec![NodeId::new(0), NodeId::new(1), NodeId::new(2)])
            .n_contents(10)
            .alpha(0.8)
            .beta(1.5)
            .n_warmup(0)
            .n_measured(3000)
            .seed(3)
            .build();
        let events: Vec<_> = workload.events()?.collect();
        let first = events
            .iter()
            .filter(|ev| ev.receiver == NodeId::new(0))
            .count();
        let last = events
            .iter()
            .filter(|ev| ev.receiver == NodeId::new(2))
            .count();
        assert!(first > last);
        Ok(())
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let no_receivers = StationaryWorkload::builder()
            .receivers(Vec::new())
            .n_contents(10)
            .alpha(0.8)
            .n_warmup(0)
            .n_measured(1)
            .build();
        assert!(matches!(
            no_receivers.events(),
            Err(WorkloadError::NoReceivers)
        ));

        let bad_alpha = StationaryWorkload::builder()
            .receivers(vec![NodeId::new(0)])
            .n_contents(10)
            .alpha(-1.0)
            .n_warmup(0)
            .n_measured(1)
            .build();
        assert!(matches!(
            bad_alpha.events(),
            Err(WorkloadError::InvalidAlpha(_))
        ));

        let bad_rate = StationaryWorkload::builder()
            .receivers(vec![NodeId::new(0)])
            .n_contents(10)
            .alpha(0.8)
            .rate(0.0)
            .n_warmup(0)
            .n_measured(1)
            .build();
        assert!(matches!(
            bad_rate.events(),
            Err(WorkloadError::InvalidRate(_))
        ));
    }
}
