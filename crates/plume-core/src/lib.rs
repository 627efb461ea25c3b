//! Plume Core - Foundational types for the Plume particle simulator
//!
//! Provides the error type and `Result` alias shared by the other Plume crates.

mod error;

pub use error::{PlumeError, Result};
