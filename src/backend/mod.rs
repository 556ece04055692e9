//! Compute backend abstraction.
//!
//! The simulation state lives on a backend between ticks. A backend holds
//! two ping-pong pairs of RGBA32F texel grids (position and velocity) and
//! runs the three full-population passes over them. The CPU-side
//! [`ParticleStore`](crate::ParticleStore) is only a mirror that is refreshed
//! with [`ComputeBackend::read_back`] and pushed back with
//! [`ComputeBackend::upload`].

mod cpu;

pub use cpu::CpuBackend;

use glam::Vec4;

use crate::error::GpuError;
pub use crate::physics::{CollisionReport, StepParams};

/// A per-slot parallel map engine over texel grids.
///
/// Implementations must honor the double-buffer contract: every pass of
/// [`integrate`](ComputeBackend::integrate) reads only the current role and
/// writes only the next role, and the roles swap once after the position
/// pass.
pub trait ComputeBackend {
    /// Side of the texel grid (`side * side` texels per buffer).
    fn side(&self) -> usize;

    /// Write the CPU texel arrays into *both* roles of both pairs.
    ///
    /// Writing only one role would expose stale data after the next swap.
    fn upload(&mut self, positions: &[Vec4], velocities: &[Vec4]);

    /// Copy the current role of both pairs into the CPU arrays. Blocks until
    /// the backend has finished all outstanding work.
    fn read_back(&mut self, positions: &mut [Vec4], velocities: &mut [Vec4]) -> Result<(), GpuError>;

    /// Velocity pass, position pass, then swap.
    fn integrate(&mut self, params: StepParams);

    /// Run the collision pass over the current role and read its output.
    ///
    /// `reports` receives one entry per texel.
    fn detect_collisions(
        &mut self,
        active_count: usize,
        radius: f32,
        reports: &mut [CollisionReport],
    ) -> Result<(), GpuError>;
}
