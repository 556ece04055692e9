//! # nbody-sim
//!
//! GPU-resident all-pairs N-body gravity in two dimensions.
//!
//! Up to a fixed number of point masses live in slots backed by RGBA32F
//! textures. Every tick runs a velocity pass and a position pass over a
//! ping-pong pair of buffers, then a lifecycle step on the CPU mirror that
//! handles bodies leaving the domain and, in evolve mode, collisions.
//!
//! ## Quick Start
//!
//! ```ignore
//! use nbody_sim::prelude::*;
//!
//! let config = SimConfig::default()
//!     .with_pattern(Pattern::Galaxy)
//!     .with_requested_count(500)
//!     .with_evolve_mode(true);
//!
//! let mut sim = pollster::block_on(Simulation::gpu(config))?;
//! sim.restart();
//! loop {
//!     sim.frame(std::time::Instant::now())?;
//!     draw(sim.store().positions(), sim.active_count());
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Slots
//!
//! A slot is either [`Slot::Active`] or [`Slot::Dormant`]. Slots below
//! `active_count` are in play and may be either; slots at or above it are
//! always dormant. `active_count` grows on restart and manual spawn and only
//! drops on [`Simulation::clear`] or [`Simulation::restart`].
//!
//! ### Backends
//!
//! [`ComputeBackend`] is the seam between the tick loop and the hardware.
//! [`GpuBackend`] runs WGSL kernels through wgpu; [`CpuBackend`] evaluates the
//! same kernels on the CPU and is what the tests drive.
//!
//! ### Lifecycle
//!
//! | Event | Evolve off | Evolve on |
//! |-------|------------|-----------|
//! | Leaves `[-1, 1]²` | stays dormant | respawned in place |
//! | Loses a collision | not checked | respawned in place |
//!
//! Respawned bodies land in `[-0.9, 0.9]²` with a speed of 0.02 to 0.04.

pub mod backend;
pub mod config;
pub mod error;
mod gpu;
pub mod lifecycle;
pub mod patterns;
pub mod physics;
pub mod pingpong;
pub mod simulation;
pub mod spawn;
pub mod store;
pub mod telemetry;

pub use backend::{CollisionReport, ComputeBackend, CpuBackend, StepParams};
pub use config::SimConfig;
pub use error::{ConfigError, GpuError, SimulationError};
pub use glam::{Vec2, Vec4};
pub use gpu::GpuBackend;
pub use patterns::Pattern;
pub use simulation::{Simulation, TickReport};
pub use spawn::SpawnContext;
pub use store::{Body, ParticleStore, Slot};
pub use telemetry::SpawnRate;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use nbody_sim::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backend::{ComputeBackend, CpuBackend};
    pub use crate::config::SimConfig;
    pub use crate::gpu::GpuBackend;
    pub use crate::patterns::Pattern;
    pub use crate::simulation::Simulation;
    pub use crate::store::{Body, Slot};
    pub use glam::{Vec2, Vec4};
}
