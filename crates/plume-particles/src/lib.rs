//! Plume Particles - CPU particle simulation core
//!
//! Provides fixed-capacity particle pools driven by spherical emitters:
//! - Slot pool with an index free-stack for O(1) activation and retirement
//! - Seeded random source with table-based Gaussian and equal-area sphere sampling
//! - Time-windowed emission with fractional carry between steps
//! - Gravity plus linear drag, forward Euler integration, lifespan-based death
//! - Trail segment packing for renderers

pub mod draw;
pub mod emitter;
pub mod particle;
pub mod random;
pub mod simulation;

pub use draw::{TrailBuffer, TrailDrawData, TrailSegment};
pub use emitter::{Emitter, EmitterConfig, DEFAULT_REPEAT_DELAY, MAX_POOL_CAPACITY};
pub use particle::{ParticlePool, ParticleRecord, DEFAULT_MASS};
pub use random::RandomSource;
pub use simulation::{
    EmitterSnapshot, Simulation, SimulationConfig, SimulationSnapshot, DEFAULT_GRAVITY,
};
