//! Fixed-capacity particle store.
//!
//! The store is the CPU mirror of the backend-resident simulation state. Each
//! slot is backed by two RGBA32F texels laid out on a `side × side` grid:
//!
//! | Texel | x | y | z | w |
//! |-------|---|---|---|---|
//! | position | `x` | `y` | unused | `mass` |
//! | velocity | `vx` | `vy` | unused | unused |
//!
//! A texel with `mass <= 0` is dormant. Callers never see that encoding: slots
//! are read and written through the tagged [`Slot`] type.

use glam::{Vec2, Vec4};

/// Default number of slots.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A live point mass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Always strictly positive for a body that lives in a slot.
    pub mass: f32,
}

impl Body {
    pub fn new(position: Vec2, velocity: Vec2, mass: f32) -> Self {
        debug_assert!(mass > 0.0, "a live body needs positive mass");
        Self {
            position,
            velocity,
            mass,
        }
    }

    /// Magnitude of the velocity vector.
    #[inline]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    fn position_texel(&self) -> Vec4 {
        Vec4::new(self.position.x, self.position.y, 0.0, self.mass)
    }

    fn velocity_texel(&self) -> Vec4 {
        Vec4::new(self.velocity.x, self.velocity.y, 0.0, 0.0)
    }
}

/// State of one storage slot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Slot {
    Active(Body),
    #[default]
    Dormant,
}

impl Slot {
    /// Decode a slot from its position and velocity texels.
    pub fn from_texels(position: Vec4, velocity: Vec4) -> Self {
        if position.w > 0.0 {
            Slot::Active(Body {
                position: position.truncate().truncate(),
                velocity: velocity.truncate().truncate(),
                mass: position.w,
            })
        } else {
            Slot::Dormant
        }
    }

    /// Encode this slot as `(position, velocity)` texels.
    pub fn to_texels(&self) -> (Vec4, Vec4) {
        match self {
            Slot::Active(body) => (body.position_texel(), body.velocity_texel()),
            Slot::Dormant => (Vec4::ZERO, Vec4::ZERO),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, Slot::Active(_))
    }

    pub fn body(&self) -> Option<&Body> {
        match self {
            Slot::Active(body) => Some(body),
            Slot::Dormant => None,
        }
    }
}

/// Side length of the square texel grid that packs `capacity` slots.
pub fn grid_side(capacity: usize) -> usize {
    let mut side = (capacity as f64).sqrt().ceil() as usize;
    while side * side < capacity {
        side += 1;
    }
    while side > 0 && (side - 1) * (side - 1) >= capacity {
        side -= 1;
    }
    side
}

/// Fixed-size slot array plus the `active_count` prefix marker.
///
/// Invariants:
/// - slots `>= active_count` are fully zeroed;
/// - `active_count` only grows, except through [`ParticleStore::reset`].
#[derive(Clone, Debug)]
pub struct ParticleStore {
    capacity: usize,
    side: usize,
    positions: Vec<Vec4>,
    velocities: Vec<Vec4>,
    active_count: usize,
}

impl ParticleStore {
    /// Create a store with every slot dormant.
    pub fn new(capacity: usize) -> Self {
        let side = grid_side(capacity);
        let texels = side * side;
        Self {
            capacity,
            side,
            positions: vec![Vec4::ZERO; texels],
            velocities: vec![Vec4::ZERO; texels],
            active_count: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Side of the texel grid. Storage packing only.
    #[inline]
    pub fn side(&self) -> usize {
        self.side
    }

    /// Number of texels backing the store (`side * side`, may exceed capacity).
    #[inline]
    pub fn texel_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Zero all slots and set `active_count` to 0.
    pub fn reset(&mut self) {
        self.positions.fill(Vec4::ZERO);
        self.velocities.fill(Vec4::ZERO);
        self.active_count = 0;
    }

    /// Typed view of slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity`.
    pub fn slot(&self, index: usize) -> Slot {
        assert!(index < self.capacity, "slot {} out of range", index);
        Slot::from_texels(self.positions[index], self.velocities[index])
    }

    /// Overwrite slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= capacity`.
    pub fn set_slot(&mut self, index: usize, slot: Slot) {
        assert!(index < self.capacity, "slot {} out of range", index);
        let (position, velocity) = slot.to_texels();
        self.positions[index] = position;
        self.velocities[index] = velocity;
    }

    /// End the occupancy of slot `index`: mass and velocity are zeroed, the
    /// last known position is kept for boundary classification.
    pub fn destroy(&mut self, index: usize) {
        self.positions[index].w = 0.0;
        self.velocities[index] = Vec4::ZERO;
    }

    /// Last position written to slot `index`, whether or not it is active.
    pub fn last_position(&self, index: usize) -> Vec2 {
        self.positions[index].truncate().truncate()
    }

    /// Raw mass channel of slot `index`.
    #[inline]
    pub fn mass(&self, index: usize) -> f32 {
        self.positions[index].w
    }

    /// Place `body` in the first unused slot, growing the active prefix.
    ///
    /// Returns `None` once the store is full.
    pub fn push(&mut self, body: Body) -> Option<usize> {
        if self.active_count >= self.capacity {
            return None;
        }
        let index = self.active_count;
        self.set_slot(index, Slot::Active(body));
        self.active_count += 1;
        Some(index)
    }

    /// Mark `[0, count)` as in play. Slots beyond it are forced dormant.
    pub(crate) fn set_active_count(&mut self, count: usize) {
        let count = count.min(self.capacity);
        self.positions[count..].fill(Vec4::ZERO);
        self.velocities[count..].fill(Vec4::ZERO);
        self.active_count = count;
    }

    /// Active bodies within the in-play prefix.
    pub fn bodies(&self) -> impl Iterator<Item = (usize, Body)> + '_ {
        (0..self.active_count).filter_map(move |i| match self.slot(i) {
            Slot::Active(body) => Some((i, body)),
            Slot::Dormant => None,
        })
    }

    /// Number of active slots within the in-play prefix.
    pub fn alive_count(&self) -> usize {
        self.bodies().count()
    }

    /// Position texels, for renderers and backend upload.
    #[inline]
    pub fn positions(&self) -> &[Vec4] {
        &self.positions
    }

    /// Velocity texels, for renderers and backend upload.
    #[inline]
    pub fn velocities(&self) -> &[Vec4] {
        &self.velocities
    }

    /// Both texel arrays, mutably, for backend read-back.
    pub(crate) fn texels_mut(&mut self) -> (&mut [Vec4], &mut [Vec4]) {
        (&mut self.positions, &mut self.velocities)
    }

    /// Whether every slot at or past `active_count` is all-zero.
    pub fn dormant_tail_is_zero(&self) -> bool {
        self.positions[self.active_count..]
            .iter()
            .chain(&self.velocities[self.active_count..])
            .all(|t| *t == Vec4::ZERO)
    }
}
