//! Body lifecycle management.
//!
//! Runs on the CPU mirror after every integration step, restricted to the
//! in-play prefix `[0, active_count)`.
//!
//! # Border destruction
//!
//! The position pass zeroes the mass of any body that leaves `[-1, 1]²`. Such a
//! slot keeps its last position, which is how it is told apart from a slot
//! emptied by a collision. With evolve mode off it stays dormant; with evolve
//! mode on it is respawned in place.
//!
//! # Collisions
//!
//! In evolve mode the collision pass flags bodies that lost an encounter.
//! Every flagged slot is destroyed first, then each one is respawned, so the
//! whole tick is resolved from a single pre-destruction snapshot.

use glam::{Vec2, Vec4};
use rand::Rng;

use crate::backend::CollisionReport;
use crate::physics::BOUNDS;
use crate::spawn::SpawnContext;
use crate::store::{ParticleStore, Slot};

/// What border handling did to the store in one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BorderOutcome {
    /// Slots whose leftover velocity was cleared (evolve mode off).
    pub destroyed: usize,
    /// Slots refilled with a fresh body (evolve mode on).
    pub respawned: usize,
}

impl BorderOutcome {
    /// Whether the store was modified and must be pushed to the backend.
    pub fn changed(&self) -> bool {
        self.destroyed > 0 || self.respawned > 0
    }
}

/// Whether `position` lies on or beyond the domain boundary.
///
/// Inclusive, unlike the strict exit test of the position pass, so a body
/// parked exactly on the edge still counts.
#[inline]
pub fn is_outside_domain(position: Vec2) -> bool {
    position.x <= -BOUNDS || position.x >= BOUNDS || position.y <= -BOUNDS || position.y >= BOUNDS
}

/// In-play slots that died by leaving the domain.
pub fn border_destroyed(store: &ParticleStore) -> Vec<usize> {
    (0..store.active_count())
        .filter(|&i| store.mass(i) <= 0.0 && is_outside_domain(store.last_position(i)))
        .collect()
}

/// Finish off or respawn every border-destroyed slot.
pub fn handle_border<R: Rng + ?Sized>(
    store: &mut ParticleStore,
    rng: &mut R,
    evolve: bool,
) -> BorderOutcome {
    let dead = border_destroyed(store);
    let mut outcome = BorderOutcome::default();
    if dead.is_empty() {
        return outcome;
    }

    if evolve {
        let mut ctx = SpawnContext::new(rng, 0, dead.len());
        for index in dead {
            store.set_slot(index, Slot::Active(ctx.respawn_body()));
            outcome.respawned += 1;
        }
    } else {
        for index in dead {
            // Already dormant slots are left alone so a quiet tick uploads nothing
            if store.velocities()[index] != Vec4::ZERO {
                store.destroy(index);
                outcome.destroyed += 1;
            }
        }
    }

    outcome
}

/// Destroy every flagged slot, then respawn each of them.
///
/// Reports for slots outside the in-play prefix are ignored. Returns the
/// number of respawned slots.
pub fn resolve_collisions<R: Rng + ?Sized>(
    store: &mut ParticleStore,
    reports: &[CollisionReport],
    rng: &mut R,
) -> usize {
    let losers: Vec<usize> = reports
        .iter()
        .take(store.active_count())
        .enumerate()
        .filter(|(_, report)| report.destroy)
        .map(|(i, _)| i)
        .collect();

    for &index in &losers {
        store.destroy(index);
    }

    let mut ctx = SpawnContext::new(rng, 0, losers.len());
    for &index in &losers {
        store.set_slot(index, Slot::Active(ctx.respawn_body()));
    }

    if !losers.is_empty() {
        log::trace!("resolved {} collisions", losers.len());
    }
    losers.len()
}
