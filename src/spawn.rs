//! Spawn context for body initialization.
//!
//! Wraps the simulation RNG with the sampling helpers shared by the pattern
//! generators, the lifecycle respawn path and the interactive spawner.

use glam::Vec2;
use rand::Rng;
use std::f32::consts::TAU;

use crate::physics::MIN_ORBIT_RADIUS;
use crate::store::Body;

/// Lower bound of a freshly drawn mass.
pub const MIN_SPAWN_MASS: f32 = 0.5;
/// Width of the mass range, so masses fall in `[0.5, 2.5)`.
pub const SPAWN_MASS_RANGE: f32 = 2.0;
/// Half-size of the square a respawned body lands in.
pub const RESPAWN_EXTENT: f32 = 0.9;
/// Minimum speed of a respawned body.
pub const RESPAWN_MIN_SPEED: f32 = 0.02;
/// Width of the respawn speed range, so speeds fall in `[0.02, 0.04]`.
pub const RESPAWN_SPEED_RANGE: f32 = 0.02;
/// Full width of the per-axis velocity jitter given to a manual spawn.
pub const MANUAL_JITTER: f32 = 0.005;

/// Context handed to spawn code, with helpers for common draws.
///
/// Every draw goes through the borrowed RNG, so a seeded simulation replays
/// the same bodies.
///
/// ```ignore
/// let mut ctx = SpawnContext::new(&mut rng, 0, 1);
/// let body = ctx.respawn_body();
/// ```
pub struct SpawnContext<'a, R: Rng + ?Sized> {
    /// Index of the body being spawned (0 to count-1).
    pub index: usize,
    /// Total number of bodies being spawned.
    pub count: usize,
    rng: &'a mut R,
}

impl<'a, R: Rng + ?Sized> SpawnContext<'a, R> {
    pub fn new(rng: &'a mut R, index: usize, count: usize) -> Self {
        Self { index, count, rng }
    }

    // ========== Random primitives ==========

    /// Random f32 between 0.0 and 1.0.
    #[inline]
    pub fn random(&mut self) -> f32 {
        self.rng.gen()
    }

    /// Random f32 in the given half-open range.
    #[inline]
    pub fn random_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.random() * (max - min)
    }

    /// Mass uniform in `[0.5, 2.5)`.
    #[inline]
    pub fn random_mass(&mut self) -> f32 {
        self.random_range(MIN_SPAWN_MASS, MIN_SPAWN_MASS + SPAWN_MASS_RANGE)
    }

    // ========== Position helpers ==========

    /// Random point inside the axis-aligned square of the given half-size.
    pub fn random_in_square(&mut self, half_size: f32) -> Vec2 {
        Vec2::new(
            (self.random() * 2.0 - 1.0) * half_size,
            (self.random() * 2.0 - 1.0) * half_size,
        )
    }

    /// Random point inside a disc, uniform by area.
    pub fn random_in_disc(&mut self, radius: f32) -> Vec2 {
        let r = self.random().sqrt() * radius;
        let theta = self.random() * TAU;
        Vec2::new(theta.cos() * r, theta.sin() * r)
    }

    // ========== Direction/velocity helpers ==========

    /// Unit vector at a uniformly random angle.
    pub fn random_direction(&mut self) -> Vec2 {
        let theta = self.random() * TAU;
        Vec2::new(theta.cos(), theta.sin())
    }

    /// Per-axis offset uniform in `[-width/2, width/2)`.
    pub fn jitter(&mut self, width: f32) -> Vec2 {
        Vec2::new(
            (self.random() - 0.5) * width,
            (self.random() - 0.5) * width,
        )
    }

    // ========== Whole bodies ==========

    /// Replacement for a destroyed body: anywhere in `[-0.9, 0.9]²`, moving
    /// at 0.02 to 0.04 in a random direction.
    pub fn respawn_body(&mut self) -> Body {
        let position = self.random_in_square(RESPAWN_EXTENT);
        let speed = RESPAWN_MIN_SPEED + self.random() * RESPAWN_SPEED_RANGE;
        let velocity = self.random_direction() * speed;
        let mass = self.random_mass();
        Body::new(position, velocity, mass)
    }

    /// Body dropped at `position` by the user, nearly at rest.
    pub fn manual_body(&mut self, position: Vec2) -> Body {
        let mass = self.random_mass();
        let velocity = self.jitter(MANUAL_JITTER);
        Body::new(position, velocity, mass)
    }
}

/// Counter-clockwise velocity perpendicular to `position`.
///
/// Magnitude is `k / (r + 0.1)` with `k = 0.02 * sqrt(count / 50)`, so larger
/// populations start with more spin. Zero at the origin.
pub fn tangent_velocity(position: Vec2, count: usize) -> Vec2 {
    let r = position.length();
    if r <= MIN_ORBIT_RADIUS {
        return Vec2::ZERO;
    }
    let k = 0.02 * (count as f32 / 50.0).sqrt();
    let v = k / (r + 0.1);
    Vec2::new(-position.y / r, position.x / r) * v
}
