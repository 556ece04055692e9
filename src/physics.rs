//! Simulation constants and per-slot reference kernels.
//!
//! Every kernel here is a pure function of one slot index and the *current*
//! texel arrays, so a backend can evaluate all slots in any order (or in
//! parallel) without observing its own writes. The WGSL kernels in
//! `src/gpu/*.wgsl` are line-for-line ports of these functions.

use glam::{Vec2, Vec4};

/// Additive softening term in the squared pair distance.
pub const SOFTEN: f32 = 0.02;
/// Per-unit-time multiplicative velocity decay, applied as `DAMP^dt`.
pub const DAMP: f32 = 0.997;
/// Speed clamp applied before damping.
pub const MAX_SPEED: f32 = 0.03;
/// Half-size of the square simulation domain.
pub const BOUNDS: f32 = 1.0;
/// Pairs closer than this collide.
pub const COLLISION_RADIUS: f32 = 0.01;
/// Pairs closer than this are treated as degenerate and ignored.
pub const MIN_COLLISION_DISTANCE: f32 = 0.001;
/// Speeds closer than this count as equal for the collision tie-break.
pub const EQUAL_SPEED_THRESHOLD: f32 = 0.0001;
/// Below this radius the initial tangential velocity is zero.
pub const MIN_ORBIT_RADIUS: f32 = 0.0001;
/// Time step at a speed multiplier of 1.
pub const BASE_DT: f32 = 1.0;
/// Upper bound of the user speed multiplier.
pub const MAX_SPEED_MULTIPLIER: f32 = 4.0;
/// Gravitational constant per gravity slider step.
pub const GRAVITY_PER_SLIDER_STEP: f32 = 1.0e-7;
/// Largest gravity slider value.
pub const MAX_GRAVITY_SLIDER: u32 = 100;
/// Default gravity slider value (`G = 3e-6`).
pub const DEFAULT_GRAVITY_SLIDER: u32 = 30;

/// Per-tick inputs to the integration pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepParams {
    pub dt: f32,
    pub gravity: f32,
}

/// Result of the collision pass for one slot.
///
/// Mirrors the 4-channel kernel output
/// `(should_destroy, my_speed, max_collider_speed, collider_index)`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CollisionReport {
    /// Some neighbor beat this slot under the tie-break rule.
    pub destroy: bool,
    /// Speed of this slot.
    pub speed: f32,
    /// Speed of the fastest neighbor that beat it.
    pub collider_speed: f32,
    /// Index of that neighbor. Informational only.
    pub collider: Option<u32>,
}

impl CollisionReport {
    /// Decode a collision output texel.
    pub fn from_texel(texel: Vec4) -> Self {
        let destroy = texel.x > 0.5;
        Self {
            destroy,
            speed: texel.y,
            collider_speed: texel.z,
            collider: (destroy && texel.w >= 0.0).then_some(texel.w as u32),
        }
    }
}

#[inline]
fn xy(texel: Vec4) -> Vec2 {
    Vec2::new(texel.x, texel.y)
}

/// Rescale `velocity` so its magnitude does not exceed [`MAX_SPEED`].
#[inline]
pub fn clamp_speed(velocity: Vec2) -> Vec2 {
    let speed = velocity.length();
    if speed > MAX_SPEED {
        velocity / speed * MAX_SPEED
    } else {
        velocity
    }
}

/// Whether a freshly integrated position has left the domain.
#[inline]
pub fn exits_domain(position: Vec2) -> bool {
    position.x < -BOUNDS || position.x > BOUNDS || position.y < -BOUNDS || position.y > BOUNDS
}

/// Gravitational pull on slot `index` from every texel.
///
/// Dormant texels have mass 0 and contribute nothing; the slot itself has
/// zero separation and contributes nothing either.
pub fn accumulate_force(index: usize, positions: &[Vec4], gravity: f32) -> Vec2 {
    let me = xy(positions[index]);
    positions.iter().fold(Vec2::ZERO, |force, other| {
        let d = xy(*other) - me;
        let dist_sqr = d.length_squared() + SOFTEN;
        let inv_dist = 1.0 / dist_sqr.sqrt();
        let f = gravity * other.w * inv_dist * inv_dist;
        force + d * f
    })
}

/// Velocity pass for slot `index`: gravity, speed clamp, then damping.
pub fn velocity_texel(
    index: usize,
    positions: &[Vec4],
    velocities: &[Vec4],
    params: StepParams,
) -> Vec4 {
    if positions[index].w <= 0.0 {
        return Vec4::ZERO;
    }
    let force = accumulate_force(index, positions, params.gravity);
    let velocity = clamp_speed(xy(velocities[index]) + force * params.dt);
    let damped = velocity * DAMP.powf(params.dt);
    Vec4::new(damped.x, damped.y, 0.0, 0.0)
}

/// Position pass for one slot, reading the velocity just produced by the
/// velocity pass. Leaving the domain zeroes the mass.
pub fn position_texel(position: Vec4, velocity: Vec4, dt: f32) -> Vec4 {
    if position.w <= 0.0 {
        return position;
    }
    let next = xy(position) + xy(velocity) * dt;
    let mass = if exits_domain(next) { 0.0 } else { position.w };
    Vec4::new(next.x, next.y, 0.0, mass)
}

/// Tie-break rule for an ordered pair: does "me" lose against "other"?
///
/// Near-equal speeds destroy the lighter body (equal masses destroy
/// neither); otherwise the slower body is destroyed.
#[inline]
pub fn loses_to(my_speed: f32, my_mass: f32, other_speed: f32, other_mass: f32) -> bool {
    if (other_speed - my_speed).abs() < EQUAL_SPEED_THRESHOLD {
        other_mass > my_mass
    } else {
        other_speed > my_speed
    }
}

/// Collision pass for slot `index`, restricted to the `[0, active_count)` prefix.
pub fn collision_report(
    index: usize,
    positions: &[Vec4],
    velocities: &[Vec4],
    active_count: usize,
    radius: f32,
) -> CollisionReport {
    if index >= active_count || positions[index].w <= 0.0 {
        return CollisionReport::default();
    }

    let me = positions[index];
    let my_speed = xy(velocities[index]).length();
    let mut report = CollisionReport {
        speed: my_speed,
        ..Default::default()
    };

    for other_index in 0..active_count.min(positions.len()) {
        if other_index == index {
            continue;
        }
        let other = positions[other_index];
        if other.w <= 0.0 {
            continue;
        }
        let dist = xy(other).distance(xy(me));
        if dist >= radius || dist <= MIN_COLLISION_DISTANCE {
            continue;
        }
        let other_speed = xy(velocities[other_index]).length();
        if loses_to(my_speed, me.w, other_speed, other.w) {
            report.destroy = true;
            if other_speed > report.collider_speed {
                report.collider_speed = other_speed;
                report.collider = Some(other_index as u32);
            }
        }
    }

    report
}
