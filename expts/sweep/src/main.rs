use clap::Parser;
use sweep::Experiment;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let expt = Experiment::parse();
    expt.run()?;
    Ok(())
}
