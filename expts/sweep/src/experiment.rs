//! Drives a batch of mixes end to end and writes one summary per mix.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use log::info;
use rayon::prelude::*;

use icnsim::collectors::StatsCollector;
use icnsim::controller::NetworkController;
use icnsim::topology::Topology;
use scenarios::placement::uniform_content_placement;
use scenarios::topologies::nearest_cache_assignment;
use scenarios::workload::StationaryWorkload;

use crate::mix::Mix;

#[derive(Debug, Parser)]
pub struct Experiment {
    /// Directory summaries are written to.
    #[clap(long, default_value = "./data")]
    root: PathBuf,
    /// JSON file holding the list of mixes to run.
    #[clap(long)]
    mixes: PathBuf,
    /// Run mixes across all cores instead of sequentially.
    #[clap(long)]
    parallel: bool,
    /// Re-run mixes whose summary already exists.
    #[clap(long)]
    overwrite: bool,
}

impl Experiment {
    pub fn run(&self) -> anyhow::Result<()> {
        let raw = fs::read_to_string(&self.mixes)
            .with_context(|| format!("failed to read {}", self.mixes.display()))?;
        let mixes: Vec<Mix> = serde_json::from_str(&raw)?;
        fs::create_dir_all(&self.root)?;
        info!("running {} mixes", mixes.len());
        if self.parallel {
            mixes.par_iter().try_for_each(|mix| self.run_mix(mix))?;
        } else {
            for mix in &mixes {
                self.run_mix(mix)?;
            }
        }
        Ok(())
    }

    fn run_mix(&self, mix: &Mix) -> anyhow::Result<()> {
        let out = self.root.join(format!("mix-{}.json", mix.id));
        if out.exists() && !self.overwrite {
            info!("mix {} already done, skipping", mix.id);
            return Ok(());
        }
        let start = Instant::now();

        let mut topo = mix.build_topology();
        let workload = StationaryWorkload::builder()
            .receivers(topo.receivers().collect())
            .n_contents(mix.n_contents)
            .alpha(mix.alpha)
            .beta(mix.beta)
            .rate(mix.rate)
            .n_warmup(mix.n_warmup)
            .n_measured(mix.n_measured)
            .seed(mix.seed)
            .build();
        topo.apply_placement(uniform_content_placement(
            &topo,
            workload.contents(),
            mix.seed,
        )?)?;
        // PARTITION needs to know which cache serves each receiver.
        topo.set_cache_assignment(nearest_cache_assignment(&topo)?)?;

        let summary = simulate(topo, mix, &workload)?;
        serde_json::to_writer_pretty(fs::File::create(&out)?, &summary)?;
        info!(
            "mix {} done in {:.2}s (hit ratio {:.4}, latency {:.2})",
            mix.id,
            start.elapsed().as_secs_f64(),
            summary.cache_hit_ratio,
            summary.mean_latency,
        );
        Ok(())
    }
}

fn simulate(
    topo: Topology,
    mix: &Mix,
    workload: &StationaryWorkload,
) -> anyhow::Result<icnsim::Summary> {
    let mut ctrl = NetworkController::new(topo, mix.policy, mix.seed);
    let stats = Rc::new(RefCell::new(StatsCollector::new()));
    ctrl.attach_collector(Box::new(Rc::clone(&stats)));
    let mut strategy = mix.strategy.build(&mut ctrl, mix.seed)?;
    let nr = icnsim::run(&mut ctrl, strategy.as_mut(), workload.events()?)?;
    debug_assert_eq!(nr, workload.nr_events());
    let summary = stats.borrow().summary();
    Ok(summary)
}
