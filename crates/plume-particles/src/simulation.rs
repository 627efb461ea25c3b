//! Simulation: owns the emitters, the shared clock, and the random source

use crate::draw::TrailBuffer;
use crate::emitter::{
    toml_count, toml_f32, toml_f64, toml_vec3, Emitter, EmitterConfig, MAX_POOL_CAPACITY,
};
use crate::random::RandomSource;
use glam::Vec3;
use plume_core::{PlumeError, Result};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Downward acceleration applied to every particle
pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.8, 0.0);

/// Top-level configuration: global physics plus an ordered emitter list
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Seed for the simulation's random source
    pub seed: u64,
    /// Fixed step the driver is expected to pass to `step`
    pub timestep: f64,
    pub drag: f32,
    pub gravity: Vec3,
    /// Steps between display refreshes, for drivers that throttle output
    pub display_interval: u32,
    pub emitters: Vec<EmitterConfig>,
}

impl Default for SimulationConfig {
    /// The three-burst fountain scene
    fn default() -> Self {
        let capacity = 50_000;
        Self {
            seed: 1,
            timestep: 0.01,
            drag: 0.2,
            gravity: DEFAULT_GRAVITY,
            display_interval: 10,
            emitters: vec![
                EmitterConfig {
                    origin: Vec3::new(0.0, 10.0, 0.0),
                    radius: 12.0,
                    start: 0.0,
                    stop: 4.5,
                    rate: 5000.0,
                    speed_mean: 5.0,
                    speed_spread: 1.0,
                    lifespan_mean: 1.5,
                    lifespan_spread: 0.5,
                    capacity,
                    ..Default::default()
                },
                EmitterConfig {
                    origin: Vec3::new(10.0, 0.0, 0.0),
                    radius: 6.0,
                    start: 0.0,
                    stop: 3.5,
                    rate: 4000.0,
                    speed_mean: 20.0,
                    speed_spread: 8.0,
                    lifespan_mean: 1.0,
                    lifespan_spread: 0.5,
                    capacity,
                    ..Default::default()
                },
                EmitterConfig {
                    origin: Vec3::new(-18.0, -5.0, 4.0),
                    radius: 3.0,
                    start: 0.0,
                    stop: 2.5,
                    rate: 3000.0,
                    speed_mean: 12.0,
                    speed_spread: 3.0,
                    lifespan_mean: 0.8,
                    lifespan_spread: 0.2,
                    capacity,
                    ..Default::default()
                },
            ],
        }
    }
}

impl SimulationConfig {
    /// Parse a scene: an optional `[simulation]` table and an `[[emitter]]` array.
    ///
    /// A scene without any `[[emitter]]` entries has no emitters.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let root: toml::value::Table = toml::from_str(source)?;
        let defaults = Self::default();
        let mut config = Self {
            emitters: Vec::new(),
            ..defaults
        };

        if let Some(sim) = root.get("simulation") {
            let sim = sim.as_table().ok_or_else(|| PlumeError::InvalidFieldType {
                field: "simulation".into(),
                expected: "table".into(),
            })?;
            if let Some(v) = sim.get("seed") {
                config.seed = toml_count(v, "simulation.seed", 0, i64::MAX)? as u64;
            }
            if let Some(v) = sim.get("timestep") {
                config.timestep = toml_f64(v, "simulation.timestep")?;
            }
            if let Some(v) = sim.get("drag") {
                config.drag = toml_f32(v, "simulation.drag")?;
            }
            if let Some(v) = sim.get("gravity") {
                config.gravity = toml_vec3(v, "simulation.gravity")?;
            }
            if let Some(v) = sim.get("display_interval") {
                let interval = toml_count(v, "simulation.display_interval", 1, u32::MAX as i64)?;
                config.display_interval = interval as u32;
            }
        }

        if let Some(list) = root.get("emitter") {
            let list = list.as_array().ok_or_else(|| PlumeError::InvalidFieldType {
                field: "emitter".into(),
                expected: "array of tables".into(),
            })?;
            for (i, entry) in list.iter().enumerate() {
                let table = entry.as_table().ok_or_else(|| PlumeError::InvalidFieldType {
                    field: format!("emitter[{i}]"),
                    expected: "table".into(),
                })?;
                config
                    .emitters
                    .push(EmitterConfig::from_toml(table, &format!("emitter[{i}]"))?);
            }
        }

        Ok(config)
    }

    /// Read and parse a scene file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(PlumeError::InvalidConfig(format!(
                "simulation.timestep must be positive, got {}",
                self.timestep
            )));
        }
        if !self.drag.is_finite() || self.drag < 0.0 {
            return Err(PlumeError::out_of_range(
                "simulation.drag",
                0.0,
                f32::MAX as f64,
                self.drag,
            ));
        }
        if !self.gravity.is_finite() {
            return Err(PlumeError::InvalidConfig(
                "simulation.gravity must be finite".into(),
            ));
        }
        for (i, emitter) in self.emitters.iter().enumerate() {
            emitter.validate(&format!("emitter[{i}]"))?;
            // One step may not ask for more spawns than a pool can ever hold
            let max_rate = MAX_POOL_CAPACITY as f64 / self.timestep;
            if emitter.rate > max_rate {
                return Err(PlumeError::ValueOutOfRange {
                    field: format!("emitter[{i}].rate"),
                    min: 0.0,
                    max: max_rate,
                    value: emitter.rate,
                });
            }
        }
        Ok(())
    }
}

/// Per-emitter summary for reporting
#[derive(Debug, Clone, Serialize)]
pub struct EmitterSnapshot {
    pub active: usize,
    pub capacity: usize,
    pub dropped: u64,
    pub fraction_carry: f64,
    pub emitting: bool,
}

/// Point-in-time summary of a simulation
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSnapshot {
    pub clock_time: f32,
    pub step_count: u64,
    pub running: bool,
    pub total_active: usize,
    pub emitters: Vec<EmitterSnapshot>,
}

/// Fixed-step particle simulation.
///
/// Starts stopped. `start` sets it running, `reset` reinitializes it to the
/// stopped initial state, and `step` does nothing while stopped.
pub struct Simulation {
    emitters: Vec<Emitter>,
    rng: RandomSource,
    drag: f32,
    gravity: Vec3,
    timestep: f64,
    display_interval: u32,
    clock_time: f32,
    step_count: u64,
    running: bool,
}

impl Simulation {
    /// Validate `config` and build one emitter (and pool) per entry, in order.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let emitters: Vec<Emitter> = config.emitters.into_iter().map(Emitter::new).collect();
        info!(
            emitters = emitters.len(),
            seed = config.seed,
            timestep = config.timestep,
            "simulation initialized"
        );
        Ok(Self {
            emitters,
            rng: RandomSource::seeded(config.seed),
            drag: config.drag,
            gravity: config.gravity,
            timestep: config.timestep,
            display_interval: config.display_interval.max(1),
            clock_time: 0.0,
            step_count: 0,
            running: false,
        })
    }

    pub fn start(&mut self) {
        if !self.running {
            info!(clock_time = self.clock_time, "simulation started");
        }
        self.running = true;
    }

    /// Reinitialize: stop, clear every pool and carry, and rewind the clock.
    /// The random source keeps its stream; it is seeded once per simulation.
    pub fn reset(&mut self) {
        for emitter in &mut self.emitters {
            emitter.reset();
        }
        self.clock_time = 0.0;
        self.step_count = 0;
        self.running = false;
        info!("simulation reset");
    }

    /// Advance one fixed step of `dt`.
    ///
    /// Each emitter in registration order emits, culls, accumulates forces,
    /// and integrates, all at the same pre-advance clock time. The shared
    /// clock then advances once. Emission is counted in `f64`; particle
    /// state is integrated in `f32`.
    pub fn step(&mut self, dt: f64) {
        if !self.running {
            return;
        }
        let t = self.clock_time;
        for emitter in &mut self.emitters {
            emitter.emit(&mut self.rng, t, dt);
            emitter.cull_dead(t);
            emitter.accumulate_forces(self.gravity, self.drag);
            emitter.integrate(dt as f32);
        }
        self.step_count += 1;
        self.clock_time = (self.step_count as f64 * dt) as f32;
    }

    /// Step with the configured timestep
    pub fn tick(&mut self) {
        self.step(self.timestep);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn clock_time(&self) -> f32 {
        self.clock_time
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn display_interval(&self) -> u32 {
        self.display_interval
    }

    pub fn drag(&self) -> f32 {
        self.drag
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn emitters(&self) -> &[Emitter] {
        &self.emitters
    }

    pub fn emitter(&self, index: usize) -> Option<&Emitter> {
        self.emitters.get(index)
    }

    /// Active particles across all emitters
    pub fn total_active(&self) -> usize {
        self.emitters.iter().map(Emitter::active_count).sum()
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            clock_time: self.clock_time,
            step_count: self.step_count,
            running: self.running,
            total_active: self.total_active(),
            emitters: self
                .emitters
                .iter()
                .map(|e| EmitterSnapshot {
                    active: e.active_count(),
                    capacity: e.pool().capacity(),
                    dropped: e.dropped(),
                    fraction_carry: e.fraction_carry(),
                    emitting: e.should_emit(self.clock_time),
                })
                .collect(),
        }
    }

    /// Pack one trail segment per active particle into `buffer`.
    pub fn pack_trails(&self, buffer: &mut TrailBuffer) {
        buffer.pack(&self.emitters, self.clock_time);
    }
}
