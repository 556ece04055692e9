//! Initial body distributions.
//!
//! Each generator fills slots `[0, count)` of a freshly reset store and
//! leaves the rest dormant. All patterns draw mass uniformly in `[0.5, 2.5)`
//! and start bodies spinning counter-clockwise around the origin.

use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::spawn::{tangent_velocity, SpawnContext};
use crate::store::{Body, ParticleStore, Slot};

const GALAXY_ARMS: usize = 3;
const GALAXY_RADIUS: f32 = 0.8;
const GALAXY_WINDING: f32 = 5.0;
const GALAXY_NOISE: f32 = 0.1;
const DISC_RADIUS: f32 = 0.8;
const GRID_EXTENT: f32 = 1.6;

/// Spatial layout used on restart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    /// Uniform in `[-1, 1]²`.
    #[default]
    Random,
    /// Three noisy spiral arms with orbital speeds.
    Galaxy,
    /// Area-uniform filled disc of radius 0.8.
    Sphere,
    /// Row-major square lattice starting at `(-0.8, -0.8)`.
    Grid,
}

impl Pattern {
    pub fn variants() -> &'static [Pattern] {
        &[Pattern::Random, Pattern::Galaxy, Pattern::Sphere, Pattern::Grid]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Random => "random",
            Pattern::Galaxy => "galaxy",
            Pattern::Sphere => "sphere",
            Pattern::Grid => "grid",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown pattern name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPattern(pub String);

impl fmt::Display for UnknownPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown pattern '{}'", self.0)
    }
}

impl std::error::Error for UnknownPattern {}

impl FromStr for Pattern {
    type Err = UnknownPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::variants()
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPattern(s.to_string()))
    }
}

/// Reset `store` and fill its first `count` slots with `pattern`.
///
/// `count` is clamped to the store capacity. Returns the new active count.
pub fn generate<R: Rng + ?Sized>(
    pattern: Pattern,
    count: usize,
    store: &mut ParticleStore,
    rng: &mut R,
) -> usize {
    store.reset();
    let count = count.min(store.capacity());
    if count == 0 {
        return 0;
    }

    let mut ctx = SpawnContext::new(rng, 0, count);
    for i in 0..count {
        ctx.index = i;
        let body = match pattern {
            Pattern::Random => random_body(&mut ctx),
            Pattern::Galaxy => galaxy_body(&mut ctx),
            Pattern::Sphere => sphere_body(&mut ctx),
            Pattern::Grid => grid_body(&mut ctx),
        };
        store.set_slot(i, Slot::Active(body));
    }

    store.set_active_count(count);
    count
}

fn random_body<R: Rng + ?Sized>(ctx: &mut SpawnContext<'_, R>) -> Body {
    let position = ctx.random_in_square(1.0);
    let mass = ctx.random_mass();
    Body::new(position, tangent_velocity(position, ctx.count), mass)
}

fn galaxy_body<R: Rng + ?Sized>(ctx: &mut SpawnContext<'_, R>) -> Body {
    let arm_separation = TAU / GALAXY_ARMS as f32;
    let dist = ctx.random();
    let angle = dist * GALAXY_WINDING + (ctx.index % GALAXY_ARMS) as f32 * arm_separation;
    let on_arm = Vec2::new(angle.cos(), angle.sin()) * dist * GALAXY_RADIUS;
    let position = on_arm + ctx.jitter(GALAXY_NOISE);
    let mass = ctx.random_mass();

    // Orbital speed from the unperturbed arm position
    let v = 0.015 / (dist.sqrt() + 0.1);
    let velocity = Vec2::new(-angle.sin(), angle.cos()) * v;
    Body::new(position, velocity, mass)
}

fn sphere_body<R: Rng + ?Sized>(ctx: &mut SpawnContext<'_, R>) -> Body {
    let position = ctx.random_in_disc(DISC_RADIUS);
    let mass = ctx.random_mass();
    Body::new(position, tangent_velocity(position, ctx.count), mass)
}

fn grid_body<R: Rng + ?Sized>(ctx: &mut SpawnContext<'_, R>) -> Body {
    let position = grid_position(ctx.index, ctx.count);
    let mass = ctx.random_mass();
    Body::new(position, tangent_velocity(position, ctx.count), mass)
}

/// Lattice position of body `index` out of `count`. Independent of the RNG.
pub fn grid_position(index: usize, count: usize) -> Vec2 {
    let cols = (count as f32).sqrt().ceil().max(1.0) as usize;
    let spacing = GRID_EXTENT / cols as f32;
    let col = index % cols;
    let row = index / cols;
    Vec2::new(
        -GRID_EXTENT / 2.0 + col as f32 * spacing,
        -GRID_EXTENT / 2.0 + row as f32 * spacing,
    )
}
