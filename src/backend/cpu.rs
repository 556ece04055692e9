//! Reference backend evaluating the kernels on the CPU.

use glam::Vec4;

use super::{CollisionReport, ComputeBackend, StepParams};
use crate::error::GpuError;
use crate::physics;
use crate::pingpong::PingPong;
use crate::store::grid_side;

/// Single-threaded backend with the same buffer layout as the GPU one.
///
/// Useful for tests, benchmarks and machines without a usable adapter.
#[derive(Clone, Debug)]
pub struct CpuBackend {
    side: usize,
    positions: PingPong<Vec<Vec4>>,
    velocities: PingPong<Vec<Vec4>>,
}

impl CpuBackend {
    /// Create a backend sized for `capacity` slots, all dormant.
    pub fn new(capacity: usize) -> Self {
        let side = grid_side(capacity);
        let texels = side * side;
        Self {
            side,
            positions: PingPong::new(vec![Vec4::ZERO; texels], vec![Vec4::ZERO; texels]),
            velocities: PingPong::new(vec![Vec4::ZERO; texels], vec![Vec4::ZERO; texels]),
        }
    }

    /// Current position texels.
    pub fn positions(&self) -> &[Vec4] {
        self.positions.current()
    }

    /// Current velocity texels.
    pub fn velocities(&self) -> &[Vec4] {
        self.velocities.current()
    }
}

impl ComputeBackend for CpuBackend {
    fn side(&self) -> usize {
        self.side
    }

    fn upload(&mut self, positions: &[Vec4], velocities: &[Vec4]) {
        let (current, next) = self.positions.both_mut();
        current.copy_from_slice(positions);
        next.copy_from_slice(positions);

        let (current, next) = self.velocities.both_mut();
        current.copy_from_slice(velocities);
        next.copy_from_slice(velocities);
    }

    fn read_back(&mut self, positions: &mut [Vec4], velocities: &mut [Vec4]) -> Result<(), GpuError> {
        positions.copy_from_slice(self.positions.current());
        velocities.copy_from_slice(self.velocities.current());
        Ok(())
    }

    fn integrate(&mut self, params: StepParams) {
        // Velocity pass: current positions + current velocities -> next velocities
        {
            let positions = self.positions.current();
            let (velocities, next_velocities) = self.velocities.split();
            for (i, out) in next_velocities.iter_mut().enumerate() {
                *out = physics::velocity_texel(i, positions, velocities, params);
            }
        }

        // Position pass: current positions + next velocities -> next positions
        {
            let next_velocities = self.velocities.next();
            let (positions, next_positions) = self.positions.split();
            for ((out, position), velocity) in next_positions
                .iter_mut()
                .zip(positions.iter())
                .zip(next_velocities.iter())
            {
                *out = physics::position_texel(*position, *velocity, params.dt);
            }
        }

        self.velocities.swap();
        self.positions.swap();
    }

    fn detect_collisions(
        &mut self,
        active_count: usize,
        radius: f32,
        reports: &mut [CollisionReport],
    ) -> Result<(), GpuError> {
        let positions = self.positions.current();
        let velocities = self.velocities.current();
        for (i, report) in reports.iter_mut().enumerate() {
            *report = physics::collision_report(i, positions, velocities, active_count, radius);
        }
        Ok(())
    }
}
