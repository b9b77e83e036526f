//! Demo driver: load a scenario file, wire up a [`routecore::scenario::Harness`],
//! advance it through a few heartbeat ticks, and print each node's forwarding
//! table. Intentionally not a general topology-driven orchestration CLI — the
//! real simulator/CLI wiring remains out of scope per spec.md §1.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use routecore::scenario::{build_harness, load_scenario};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "scenario_runner")]
#[command(about = "Drive a small in-memory DV/LS topology from a scenario file")]
struct Args {
    #[arg(long)]
    scenario: PathBuf,
    #[arg(long, default_value = "INFO")]
    log_level: String,
    #[arg(long, default_value_t = 3)]
    ticks: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let config = load_scenario(&args.scenario)?;
    let mut harness = build_harness(&config)?;

    let mut time_ms = 0_u64;
    for _ in 0..args.ticks {
        time_ms += config.heartbeat_period_ms;
        harness.tick(time_ms);
    }

    for id in harness.node_ids().cloned().collect::<Vec<_>>() {
        let table = harness.forward_table(&id).unwrap_or_default();
        info!(node = %id, ?table, "converged forwarding table");
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let level = level.parse::<Level>()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .init();
    Ok(())
}
