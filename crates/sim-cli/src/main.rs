//! Constellation simulator entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sim_runtime::config::{load_config, SimulationConfig};
use sim_runtime::loader::load_ground_stations;
use sim_runtime::{
    replay, state, ConstellationLoader, NodeFactory, PluginRegistry, Simulation,
    SimulationController, StateRecorder,
};

/// Discrete-time LEO constellation simulator.
#[derive(Parser, Debug)]
#[command(name = "constellation-sim")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Discrete-time LEO constellation simulator", long_about = None)]
struct Args {
    /// Simulation config file (JSON or YAML)
    #[arg(long)]
    config_file: PathBuf,

    /// Capture the per-step topology to this file (binary, plus a .json
    /// sibling)
    #[arg(long)]
    simulation_state_output_file: Option<PathBuf>,

    /// Replay a previously captured run instead of simulating
    #[arg(long)]
    simulation_state_input_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(&args.config_file).context("loading configuration")?;

    let plugins = PluginRegistry::with_builtins()
        .build(&config.simulation.plugins)
        .context("resolving plugins")?;
    let factory = NodeFactory::new(&config);

    let sim = if let Some(input) = &args.simulation_state_input_file {
        let metadata = state::load_metadata(input).context("loading simulation state")?;
        tracing::info!(
            states = metadata.states.len(),
            satellites = metadata.satellites.len(),
            "replaying captured run"
        );
        Arc::new(replay::build_replay(
            config.simulation.clone(),
            &metadata,
            &factory,
            plugins,
        )?)
    } else {
        let recorder = args
            .simulation_state_output_file
            .clone()
            .map(|path| StateRecorder::new(path, Vec::new()));
        let sim = Arc::new(Simulation::new(config.simulation.clone(), plugins, recorder));

        let loader = ConstellationLoader::with_builtin_loaders();
        let satellites = loader
            .load(
                &config.simulation.satellite_data_source,
                &config.simulation.satellite_data_source_type,
                &factory,
            )
            .context("loading satellite constellation")?;
        let satellite_ids = sim.inject_satellites(satellites)?;

        if !config.simulation.ground_station_data_source.is_empty() {
            let grounds = load_ground_stations(
                &config.simulation.ground_station_data_source,
                &factory,
                &satellite_ids,
            )
            .context("loading ground stations")?;
            sim.inject_ground_stations(grounds)?;
        }
        sim
    };

    // Loading happens synchronously above (the TLE source may use the
    // blocking HTTP client); only the run loop needs the async runtime.
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(sim, &config.simulation))
}

async fn run(sim: Arc<Simulation>, config: &SimulationConfig) -> Result<()> {
    if config.step_count > 0 {
        for _ in 0..config.step_count {
            sim.step_by_seconds(config.step_multiplier as f64);
            if config.step_interval > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(config.step_interval as u64))
                    .await;
            }
        }
        sim.save_state()?;
        return Ok(());
    }

    if config.step_interval >= 0 {
        let mut done = sim.start_autorun();
        tokio::select! {
            _ = &mut done => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping auto-run");
                sim.stop_autorun();
                let _ = done.await;
            }
        }
        sim.save_state()?;
        return Ok(());
    }

    bail!("manual stepping selected (negative StepInterval) but StepCount is 0")
}
