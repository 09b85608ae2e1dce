use std::{env, fs, sync::Arc, thread};

use anyhow::{Context, anyhow, bail};
use comms::{Communicator, LocalGroup};
use log::{info, warn};
use machine_learning::driver::{GradCheckConfig, run_participant};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .context("usage: gradcheck <config.json>")?;
    let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config: GradCheckConfig =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;

    info!(participants = config.participants.get(); "starting gradient check");

    let comms = LocalGroup::new(config.participants);
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let config = &config;
                s.spawn(move || {
                    let comm: Arc<dyn Communicator> = Arc::new(comm);
                    run_participant(comm, config)
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join()).collect()
    });

    let mut failures = 0;
    for (rank, result) in results.into_iter().enumerate() {
        let result = result.map_err(|_| anyhow!("participant {rank} panicked"))?;

        match result.with_context(|| format!("participant {rank}"))? {
            Some(report) => {
                info!(
                    rank = rank,
                    checked = report.checked,
                    failures = report.failures.len();
                    "participant done"
                );
                failures += report.failures.len();
            }
            None => warn!(rank = rank; "execution mode not covered, nothing checked"),
        }
    }

    if failures > 0 {
        bail!("{failures} gradient entries exceed the expected error");
    }

    info!("every gradient entry is within the expected error");
    Ok(())
}
