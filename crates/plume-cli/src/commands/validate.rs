//! Validate command — checks a scene file without running it

use anyhow::{Context, Result};
use plume_particles::SimulationConfig;

pub fn run(scene_path: &str) -> Result<()> {
    let config = SimulationConfig::load(scene_path)
        .with_context(|| format!("Failed to load scene '{scene_path}'"))?;
    config.validate().context("Scene is invalid")?;

    println!("Scene: {scene_path}");
    println!(
        "  seed={} timestep={} drag={} gravity=[{}, {}, {}]",
        config.seed,
        config.timestep,
        config.drag,
        config.gravity.x,
        config.gravity.y,
        config.gravity.z
    );
    println!("  {} emitter(s)", config.emitters.len());
    for (i, e) in config.emitters.iter().enumerate() {
        println!(
            "  [{i}] origin=[{}, {}, {}] radius={} window=[{}, {}) rate={} speed={}±{} lifespan={}±{} capacity={}",
            e.origin.x,
            e.origin.y,
            e.origin.z,
            e.radius,
            e.start,
            e.stop,
            e.rate,
            e.speed_mean,
            e.speed_spread,
            e.lifespan_mean,
            e.lifespan_spread,
            e.capacity
        );
    }
    println!("OK");
    Ok(())
}
