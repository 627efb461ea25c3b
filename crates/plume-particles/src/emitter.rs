//! Emitter configuration (parsed from TOML) and runtime state

use crate::particle::{ParticlePool, DEFAULT_MASS};
use crate::random::RandomSource;
use glam::Vec3;
use plume_core::{PlumeError, Result};
use rand::Rng;
use tracing::{debug, trace};

/// Upper bound on slots per emitter; every pass scans the whole pool.
pub const MAX_POOL_CAPACITY: usize = 1_000_000;

/// Pause inserted at the start of every repeated emission cycle after the first
pub const DEFAULT_REPEAT_DELAY: f32 = 2.0;

/// A configured spread covers about three standard deviations.
const SPREAD_STD_DEVS: f32 = 3.0;

/// Configuration for one spherical emitter, parsed from an `[[emitter]]` TOML table
#[derive(Debug, Clone, PartialEq)]
pub struct EmitterConfig {
    /// Center of the emission sphere
    pub origin: Vec3,
    /// Particles spawn on the sphere of this radius around `origin`
    pub radius: f32,
    /// Emission window `[start, stop)`
    pub start: f32,
    pub stop: f32,
    /// Particles per unit simulation time while the window is open
    pub rate: f64,
    pub speed_mean: f32,
    pub speed_spread: f32,
    pub lifespan_mean: f32,
    pub lifespan_spread: f32,
    /// Pool slots owned by this emitter
    pub capacity: usize,
    pub mass: f32,
    pub repeat_delay: f32,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            radius: 1.0,
            start: 0.0,
            stop: 1.0,
            rate: 100.0,
            speed_mean: 0.5,
            speed_spread: 0.2,
            lifespan_mean: 1.0,
            lifespan_spread: 0.3,
            capacity: 10_000,
            mass: DEFAULT_MASS,
            repeat_delay: DEFAULT_REPEAT_DELAY,
        }
    }
}

impl EmitterConfig {
    /// Parse an EmitterConfig from a TOML table. Missing keys keep their defaults;
    /// present keys of the wrong type are rejected. `label` names the emitter in errors.
    pub fn from_toml(table: &toml::value::Table, label: &str) -> Result<Self> {
        let mut config = Self::default();
        let field = |key: &str| format!("{label}.{key}");

        if let Some(v) = table.get("origin") {
            config.origin = toml_vec3(v, &field("origin"))?;
        }
        if let Some(v) = table.get("radius") {
            config.radius = toml_f32(v, &field("radius"))?;
        }
        if let Some(v) = table.get("start") {
            config.start = toml_f32(v, &field("start"))?;
        }
        if let Some(v) = table.get("stop") {
            config.stop = toml_f32(v, &field("stop"))?;
        }
        if let Some(v) = table.get("rate") {
            config.rate = toml_f64(v, &field("rate"))?;
        }
        if let Some(v) = table.get("speed_mean") {
            config.speed_mean = toml_f32(v, &field("speed_mean"))?;
        }
        if let Some(v) = table.get("speed_spread") {
            config.speed_spread = toml_f32(v, &field("speed_spread"))?;
        }
        if let Some(v) = table.get("lifespan_mean") {
            config.lifespan_mean = toml_f32(v, &field("lifespan_mean"))?;
        }
        if let Some(v) = table.get("lifespan_spread") {
            config.lifespan_spread = toml_f32(v, &field("lifespan_spread"))?;
        }
        if let Some(v) = table.get("capacity") {
            // Upper bound is checked by `validate`
            config.capacity = toml_count(v, &field("capacity"), 0, i64::MAX)? as usize;
        }
        if let Some(v) = table.get("mass") {
            config.mass = toml_f32(v, &field("mass"))?;
        }
        if let Some(v) = table.get("repeat_delay") {
            config.repeat_delay = toml_f32(v, &field("repeat_delay"))?;
        }

        Ok(config)
    }

    pub fn duration(&self) -> f32 {
        self.stop - self.start
    }

    /// Reject values the emitter cannot run with. `label` names the emitter in errors.
    pub fn validate(&self, label: &str) -> Result<()> {
        let scalars = [
            ("radius", self.radius),
            ("start", self.start),
            ("stop", self.stop),
            ("speed_mean", self.speed_mean),
            ("speed_spread", self.speed_spread),
            ("lifespan_mean", self.lifespan_mean),
            ("lifespan_spread", self.lifespan_spread),
            ("mass", self.mass),
            ("repeat_delay", self.repeat_delay),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(PlumeError::InvalidConfig(format!(
                    "{label}.{name} must be finite, got {value}"
                )));
            }
        }
        if !self.rate.is_finite() {
            return Err(PlumeError::InvalidConfig(format!(
                "{label}.rate must be finite, got {}",
                self.rate
            )));
        }
        if !self.origin.is_finite() {
            return Err(PlumeError::InvalidConfig(format!(
                "{label}.origin must be finite"
            )));
        }

        let non_negative = [
            ("radius", self.radius),
            ("speed_spread", self.speed_spread),
            ("lifespan_spread", self.lifespan_spread),
            ("repeat_delay", self.repeat_delay),
        ];
        for (name, value) in non_negative {
            if value < 0.0 {
                return Err(PlumeError::out_of_range(
                    format!("{label}.{name}"),
                    0.0,
                    f32::MAX as f64,
                    value,
                ));
            }
        }

        if self.rate < 0.0 {
            return Err(PlumeError::ValueOutOfRange {
                field: format!("{label}.rate"),
                min: 0.0,
                max: f64::MAX,
                value: self.rate,
            });
        }

        if self.mass == 0.0 {
            return Err(PlumeError::InvalidConfig(format!(
                "{label}.mass must be non-zero"
            )));
        }
        if self.capacity > MAX_POOL_CAPACITY {
            return Err(PlumeError::ValueOutOfRange {
                field: format!("{label}.capacity"),
                min: 0.0,
                max: MAX_POOL_CAPACITY as f64,
                value: self.capacity as f64,
            });
        }
        Ok(())
    }
}

/// Runtime state for one emitter: its configuration, its exclusively owned
/// pool, and the fractional emission carried between steps.
pub struct Emitter {
    config: EmitterConfig,
    pool: ParticlePool,
    /// Fractional particle count not yet emitted, always in [0, 1) between steps
    fraction_carry: f64,
    /// Spawn requests shed because the pool was full
    dropped: u64,
}

impl Emitter {
    pub fn new(config: EmitterConfig) -> Self {
        debug_assert!(config.speed_spread >= 0.0, "negative speed spread");
        debug_assert!(config.lifespan_spread >= 0.0, "negative lifespan spread");
        debug_assert!(config.rate >= 0.0, "negative emission rate");
        debug!(
            origin = ?config.origin,
            radius = config.radius,
            rate = config.rate,
            capacity = config.capacity,
            "creating emitter"
        );
        let pool = ParticlePool::with_mass(config.capacity, config.mass);
        Self {
            config,
            pool,
            fraction_carry: 0.0,
            dropped: 0,
        }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Read-only view of the slots, for renderers
    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    pub fn fraction_carry(&self) -> f64 {
        self.fraction_carry
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Whether the emission window is open at time `t`.
    ///
    /// The first cycle (`t <= duration`) is open on `[start, stop)`. Later
    /// cycles repeat with period `duration` and open on
    /// `[start + repeat_delay, stop)` within the period.
    pub fn should_emit(&self, t: f32) -> bool {
        let duration = self.config.duration();
        if duration <= 0.0 {
            return false;
        }
        if t <= duration {
            t >= self.config.start && t < self.config.stop
        } else {
            let phase = t % duration;
            phase >= self.config.start + self.config.repeat_delay && phase < self.config.stop
        }
    }

    /// Whole particles owed for a step of `dt`, carrying the remainder.
    ///
    /// Accounting is in `f64` so the carry does not drift over long runs.
    /// A negative or NaN product owes nothing.
    fn emission_count(&mut self, dt: f64) -> usize {
        let ideal = (self.config.rate * dt).max(0.0);
        let whole = ideal.trunc();
        let mut n = whole as usize;
        self.fraction_carry += ideal - whole;
        if self.fraction_carry >= 1.0 {
            n += 1;
            self.fraction_carry -= 1.0;
        }
        n
    }

    /// Spawn this step's particles at time `t`. Returns how many were
    /// activated; requests beyond the free slots are dropped unsampled, so
    /// the work per step is bounded by pool capacity.
    pub fn emit<R: Rng>(&mut self, rng: &mut RandomSource<R>, t: f32, dt: f64) -> usize {
        if !self.should_emit(t) {
            return 0;
        }

        let requested = self.emission_count(dt);
        let budget = requested.min(self.pool.free_count());
        let mut spawned = 0;
        for _ in 0..budget {
            let speed = rng.gaussian(
                self.config.speed_mean,
                self.config.speed_spread / SPREAD_STD_DEVS,
            );
            let direction = rng.unit_sphere_direction();
            let velocity = speed.abs() * direction;
            let position = self.config.origin + self.config.radius * direction;
            let lifespan = rng.gaussian(
                self.config.lifespan_mean,
                self.config.lifespan_spread / SPREAD_STD_DEVS,
            );
            if self.pool.activate(position, velocity, lifespan, t) {
                spawned += 1;
            }
        }

        let shed = requested - spawned;
        if shed > 0 {
            self.dropped += shed as u64;
            trace!(
                t = t,
                shed = shed,
                capacity = self.pool.capacity(),
                "emitter pool exhausted"
            );
        }
        spawned
    }

    /// Retire every particle whose lifespan has elapsed at time `t`.
    pub fn cull_dead(&mut self, t: f32) -> usize {
        self.pool.cull_expired(t)
    }

    pub fn accumulate_forces(&mut self, gravity: Vec3, drag: f32) {
        self.pool.accumulate_forces(gravity, drag);
    }

    pub fn integrate(&mut self, dt: f32) {
        self.pool.integrate(dt);
    }

    /// Back to the freshly constructed state: empty pool, no carry.
    pub fn reset(&mut self) {
        self.pool.clear();
        self.fraction_carry = 0.0;
        self.dropped = 0;
    }
}

// ── TOML helpers (handle integer/float coercion, reject other types) ──

pub(crate) fn toml_f64(v: &toml::Value, field: &str) -> Result<f64> {
    v.as_float()
        .or_else(|| v.as_integer().map(|i| i as f64))
        .ok_or_else(|| PlumeError::InvalidFieldType {
            field: field.into(),
            expected: "number".into(),
        })
}

pub(crate) fn toml_f32(v: &toml::Value, field: &str) -> Result<f32> {
    toml_f64(v, field).map(|f| f as f32)
}

pub(crate) fn toml_vec3(v: &toml::Value, field: &str) -> Result<Vec3> {
    match v.as_array() {
        Some(arr) if arr.len() == 3 => Ok(Vec3::new(
            toml_f32(&arr[0], field)?,
            toml_f32(&arr[1], field)?,
            toml_f32(&arr[2], field)?,
        )),
        _ => Err(PlumeError::InvalidFieldType {
            field: field.into(),
            expected: "array of 3 numbers".into(),
        }),
    }
}

/// An integer within `[min, max]`
pub(crate) fn toml_count(v: &toml::Value, field: &str, min: i64, max: i64) -> Result<i64> {
    let n = v.as_integer().ok_or_else(|| PlumeError::InvalidFieldType {
        field: field.into(),
        expected: "integer".into(),
    })?;
    if n < min || n > max {
        return Err(PlumeError::ValueOutOfRange {
            field: field.into(),
            min: min as f64,
            max: max as f64,
            value: n as f64,
        });
    }
    Ok(n)
}
