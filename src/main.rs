//! Headless runner.
//!
//! ```text
//! nbody-sim [config.json] [--cpu] [--ticks N]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use env_logger::Env;
use nbody_sim::{ComputeBackend, GpuError, SimConfig, Simulation, SimulationError};

const DEFAULT_TICKS: u64 = 600;
const LOG_EVERY: u64 = 60;

struct Args {
    config: Option<PathBuf>,
    cpu: bool,
    ticks: u64,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        config: None,
        cpu: false,
        ticks: DEFAULT_TICKS,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--cpu" => args.cpu = true,
            "--ticks" => {
                let value = iter.next().ok_or("--ticks needs a value")?;
                args.ticks = value
                    .parse()
                    .map_err(|_| format!("invalid tick count '{}'", value))?;
            }
            flag if flag.starts_with("--") => return Err(format!("unknown flag '{}'", flag)),
            path if args.config.is_none() => args.config = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument '{}'", extra)),
        }
    }
    Ok(args)
}

fn drive<B: ComputeBackend>(sim: &mut Simulation<B>, ticks: u64) -> Result<(), GpuError> {
    sim.restart();
    let start = Instant::now();

    for frame in 1..=ticks {
        sim.frame(Instant::now())?;
        if frame % LOG_EVERY == 0 {
            log::info!(
                "frame {}: {} in play, {} alive, {:.2} spawns/s",
                frame,
                sim.active_count(),
                sim.store().alive_count(),
                sim.spawn_rate()
            );
        }
    }

    let elapsed = start.elapsed().as_secs_f32();
    log::info!(
        "{} ticks in {:.2}s ({:.1} ticks/s)",
        ticks,
        elapsed,
        ticks as f32 / elapsed.max(f32::EPSILON)
    );
    Ok(())
}

fn run(args: Args) -> Result<(), SimulationError> {
    let config = match &args.config {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            SimConfig::load(path)?
        }
        None => SimConfig::default(),
    };

    if args.cpu {
        let mut sim = Simulation::cpu(config);
        drive(&mut sim, args.ticks)?;
    } else {
        let mut sim = pollster::block_on(Simulation::gpu(config))?;
        drive(&mut sim, args.ticks)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!("usage: nbody-sim [config.json] [--cpu] [--ticks N]");
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
