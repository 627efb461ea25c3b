//! Run command — steps a scene headlessly and reports particle counts

use anyhow::{Context, Result};
use plume_particles::{Simulation, SimulationConfig, SimulationSnapshot, TrailBuffer};
use tracing::info;

pub struct RunArgs {
    pub scene: Option<String>,
    pub steps: u64,
    pub seed: Option<u64>,
    pub format: String,
}

pub fn run(args: RunArgs) -> Result<()> {
    let report: fn(&SimulationSnapshot, usize) -> Result<()> = match args.format.as_str() {
        "text" => report_text,
        "json" => report_json,
        other => anyhow::bail!("Unknown format: {}", other),
    };

    let mut config = match &args.scene {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("Failed to load scene '{path}'"))?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let mut sim = Simulation::new(config).context("Invalid scene")?;
    let interval = sim.display_interval() as u64;
    let mut trails = TrailBuffer::new();

    sim.start();
    for _ in 0..args.steps {
        sim.tick();
        if sim.step_count() % interval == 0 {
            sim.pack_trails(&mut trails);
            report(&sim.snapshot(), trails.as_bytes().len())?;
        }
    }

    info!(
        steps = sim.step_count(),
        clock_time = sim.clock_time(),
        active = sim.total_active(),
        "run complete"
    );
    Ok(())
}

fn report_text(snapshot: &SimulationSnapshot, trail_bytes: usize) -> Result<()> {
    let emitters: Vec<String> = snapshot
        .emitters
        .iter()
        .enumerate()
        .map(|(i, e)| {
            format!(
                "e{i} {}/{}{}{}",
                e.active,
                e.capacity,
                if e.emitting { " on" } else { "" },
                if e.dropped > 0 {
                    format!(" dropped={}", e.dropped)
                } else {
                    String::new()
                }
            )
        })
        .collect();
    println!(
        "t={:>7.3} step={:>6} active={:>7} trails={}B  [{}]",
        snapshot.clock_time,
        snapshot.step_count,
        snapshot.total_active,
        trail_bytes,
        emitters.join(", ")
    );
    Ok(())
}

fn report_json(snapshot: &SimulationSnapshot, _trail_bytes: usize) -> Result<()> {
    println!("{}", serde_json::to_string(snapshot)?);
    Ok(())
}
