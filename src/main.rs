use quadsim::{bench_gravity, bench_step_curve, build_simulation, ScenarioConfig, Simulation};

use anyhow::{Context, Result};
use clap::Parser;

use std::path::PathBuf;
use std::time::Instant;

/// Headless runner for quadtree particle scenarios
#[derive(Parser, Debug)]
struct Args {
    /// Scenario file; bare names are looked up in the crate's scenarios/ directory
    #[arg(short, default_value = "galaxy.yaml")]
    file_name: String,

    /// Number of steps to run
    #[arg(short = 'n', long, default_value_t = 600)]
    steps: u64,

    /// Log diagnostics every this many steps (0 disables)
    #[arg(long, default_value_t = 60)]
    report_every: u64,

    /// Run the timing sweeps instead of a scenario
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario(file_name: &str) -> Result<ScenarioConfig> {
    let direct = PathBuf::from(file_name);
    let config_path = if direct.is_file() {
        direct
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
    };

    ScenarioConfig::from_path(&config_path)
        .with_context(|| format!("failed to load scenario {}", config_path.display()))
}

fn report(sim: &Simulation) {
    let d = sim.diagnostics();
    log::info!(
        "step {:6} t = {:8.3}  active {:7}  E_kin = {:12.4}  |p| = {:10.4}  nodes {:6} depth {:2}",
        d.step,
        d.time,
        d.active,
        d.kinetic_energy,
        d.momentum.norm(),
        d.tree_nodes,
        d.tree_depth
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.bench {
        bench_gravity();
        bench_step_curve();
        return Ok(());
    }

    let scenario_cfg = load_scenario(&args.file_name)?;
    let mut sim = build_simulation(&scenario_cfg).context("failed to build simulation")?;

    let start = Instant::now();
    for step in 1..=args.steps {
        sim.tick();
        if args.report_every > 0 && step % args.report_every == 0 {
            report(&sim);
        }
    }
    report(&sim);

    let elapsed = start.elapsed().as_secs_f64();
    log::info!(
        "{} steps in {elapsed:.3} s ({:.3} ms/step)",
        args.steps,
        1e3 * elapsed / args.steps.max(1) as f64
    );
    Ok(())
}
