//! Simulation context and tick loop.
//!
//! [`Simulation`] owns every piece of mutable state: the CPU mirror, the
//! backend-resident buffers, the RNG, the configuration and the telemetry.
//! All commands take `&mut self`, so at most one mutator runs at a time. The
//! type is meant to be driven from a single thread (a display callback or a
//! plain loop).
//!
//! # Tick order
//!
//! 1. Velocity pass, position pass, swap (backend).
//! 2. Read back, then border handling on the mirror.
//! 3. In evolve mode, collision pass over the post-border state, then
//!    resolution on the mirror.
//!
//! Every CPU-side change is pushed to both buffer roles before the next tick.

use std::time::Instant;

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::backend::{CollisionReport, ComputeBackend, CpuBackend, StepParams};
use crate::config::{clamp_speed_multiplier, gravity_from_slider, SimConfig};
use crate::error::GpuError;
use crate::gpu::GpuBackend;
use crate::lifecycle;
use crate::patterns::{self, Pattern};
use crate::spawn::SpawnContext;
use crate::store::ParticleStore;
use crate::telemetry::SpawnRate;

/// What one tick did beyond integration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Border exits left dormant (evolve mode off).
    pub border_destroyed: usize,
    /// Border exits refilled in place (evolve mode on).
    pub border_respawned: usize,
    /// Collision losers refilled in place (evolve mode on).
    pub collisions: usize,
}

impl TickReport {
    /// Slots refilled this tick.
    pub fn spawned(&self) -> usize {
        self.border_respawned + self.collisions
    }
}

/// An N-body simulation over a compute backend.
pub struct Simulation<B: ComputeBackend> {
    config: SimConfig,
    store: ParticleStore,
    backend: B,
    rng: SmallRng,
    paused: bool,
    step_pending: bool,
    spawn_rate: SpawnRate,
    reports: Vec<CollisionReport>,
    ticks: u64,
}

impl Simulation<CpuBackend> {
    /// Simulation on the reference CPU backend.
    pub fn cpu(config: SimConfig) -> Self {
        let backend = CpuBackend::new(config.capacity.max(1));
        Self::new(config, backend)
    }
}

impl Simulation<GpuBackend> {
    /// Simulation on a freshly created wgpu device.
    ///
    /// Fails if no adapter can run the compute passes.
    pub async fn gpu(config: SimConfig) -> Result<Self, GpuError> {
        let backend = GpuBackend::new(config.capacity.max(1)).await?;
        Ok(Self::new(config, backend))
    }
}

impl<B: ComputeBackend> Simulation<B> {
    /// Wrap `backend` with an empty store. Call [`restart`](Self::restart)
    /// to populate it.
    ///
    /// # Panics
    ///
    /// Panics if the backend was created for a different capacity than
    /// `config.capacity`.
    pub fn new(config: SimConfig, mut backend: B) -> Self {
        let config = config.sanitized();
        let store = ParticleStore::new(config.capacity);
        assert_eq!(
            backend.side(),
            store.side(),
            "backend sized for a different capacity"
        );

        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        backend.upload(store.positions(), store.velocities());
        let reports = vec![CollisionReport::default(); store.texel_count()];

        Self {
            config,
            store,
            backend,
            rng,
            paused: false,
            step_pending: false,
            spawn_rate: SpawnRate::new(Instant::now()),
            reports,
            ticks: 0,
        }
    }

    // ========== Commands ==========

    /// Regenerate the configured pattern with the configured count.
    pub fn restart(&mut self) -> usize {
        self.restart_with(self.config.pattern, self.config.requested_count)
    }

    /// Regenerate with `pattern` and `count` bodies, remembering both.
    ///
    /// Returns the new active count (`count` clamped to the capacity).
    pub fn restart_with(&mut self, pattern: Pattern, count: usize) -> usize {
        self.config.pattern = pattern;
        self.config.requested_count = count.min(self.store.capacity());

        let active = patterns::generate(pattern, self.config.requested_count, &mut self.store, &mut self.rng);
        self.spawn_rate.reset(Instant::now());
        self.sync_to_backend();

        log::info!("Restarted with {} bodies ({})", active, pattern);
        active
    }

    /// Make every slot dormant and reset telemetry.
    pub fn clear(&mut self) {
        self.store.reset();
        self.spawn_rate.reset(Instant::now());
        self.sync_to_backend();
        log::info!("Cleared all bodies");
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Advance exactly one tick on the next [`frame`](Self::frame), even
    /// while paused.
    pub fn step(&mut self) {
        self.step_pending = true;
    }

    /// Display-callback driver.
    ///
    /// Ticks once unless paused with no step pending, then refreshes the
    /// spawn rate at `now`. Returns the tick report if a tick ran.
    pub fn frame(&mut self, now: Instant) -> Result<Option<TickReport>, GpuError> {
        let report = if !self.paused || self.step_pending {
            let report = self.tick()?;
            self.step_pending = false;
            Some(report)
        } else {
            None
        };

        if let Some(rate) = self.spawn_rate.update(now) {
            log::trace!("spawn rate {:.2}/s", rate);
        }
        Ok(report)
    }

    /// One full tick: integrate, handle border exits, then collisions.
    pub fn tick(&mut self) -> Result<TickReport, GpuError> {
        let params = StepParams {
            dt: self.config.dt(),
            gravity: self.config.gravity,
        };
        self.backend.integrate(params);
        self.sync_from_backend()?;

        let evolve = self.config.evolve_mode;
        let border = lifecycle::handle_border(&mut self.store, &mut self.rng, evolve);
        if border.changed() {
            self.sync_to_backend();
        }

        let mut collisions = 0;
        if evolve {
            self.backend.detect_collisions(
                self.store.active_count(),
                self.config.collision_radius,
                &mut self.reports,
            )?;
            collisions = lifecycle::resolve_collisions(&mut self.store, &self.reports, &mut self.rng);
            if collisions > 0 {
                self.sync_to_backend();
            }
        }

        let report = TickReport {
            border_destroyed: border.destroyed,
            border_respawned: border.respawned,
            collisions,
        };
        self.spawn_rate.record(report.spawned());
        self.ticks += 1;
        Ok(report)
    }

    /// Turn evolve mode on or off. Any actual change resets the spawn rate.
    pub fn set_evolve_mode(&mut self, evolve: bool) {
        if self.config.evolve_mode != evolve {
            self.config.evolve_mode = evolve;
            self.spawn_rate.reset(Instant::now());
            log::debug!("Evolve mode {}", if evolve { "on" } else { "off" });
        }
    }

    pub fn toggle_evolve_mode(&mut self) {
        self.set_evolve_mode(!self.config.evolve_mode);
    }

    pub fn set_gravity(&mut self, gravity: f32) {
        self.config.gravity = gravity;
    }

    /// Set gravity from a slider position (`G = slider * 1e-7`, max 100).
    pub fn set_gravity_slider(&mut self, slider: u32) {
        self.config.gravity = gravity_from_slider(slider);
    }

    /// Set the time step multiplier, clamped to `[0, 4]`.
    pub fn set_speed(&mut self, speed: f32) {
        self.config.speed = clamp_speed_multiplier(speed);
    }

    /// Pattern used by the next [`restart`](Self::restart).
    pub fn set_pattern(&mut self, pattern: Pattern) {
        self.config.pattern = pattern;
    }

    /// Count used by the next [`restart`](Self::restart), clamped to the capacity.
    pub fn set_requested_count(&mut self, count: usize) {
        self.config.requested_count = count.min(self.store.capacity());
    }

    /// Drop a body at `(x, y)` into the first unused slot.
    ///
    /// Returns the slot index, or `None` when the store is full. A full store
    /// is not an error: the request is ignored.
    pub fn add_body(&mut self, x: f32, y: f32) -> Result<Option<usize>, GpuError> {
        if self.store.active_count() >= self.store.capacity() {
            log::debug!("Capacity of {} bodies reached, ignoring spawn", self.store.capacity());
            return Ok(None);
        }

        let index = self.with_mutable_snapshot(|store, rng| {
            let body = SpawnContext::new(rng, 0, 1).manual_body(Vec2::new(x, y));
            store.push(body)
        })?;

        log::info!("Added body: {} / {}", self.store.active_count(), self.store.capacity());
        Ok(index)
    }

    /// Run `f` on an up-to-date mirror of the backend state, then push the
    /// result to both buffer roles.
    ///
    /// This is the only way CPU code mutates live simulation state.
    pub fn with_mutable_snapshot<T, F>(&mut self, f: F) -> Result<T, GpuError>
    where
        F: FnOnce(&mut ParticleStore, &mut SmallRng) -> T,
    {
        self.sync_from_backend()?;
        let out = f(&mut self.store, &mut self.rng);
        self.sync_to_backend();
        Ok(out)
    }

    // ========== Accessors ==========

    /// CPU mirror, as of the last read-back.
    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    pub fn active_count(&self) -> usize {
        self.store.active_count()
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Respawns per second, refreshed about once a second by [`frame`](Self::frame).
    pub fn spawn_rate(&self) -> f32 {
        self.spawn_rate.rate()
    }

    /// Respawns since the last restart, clear or evolve mode change.
    pub fn spawn_total(&self) -> u64 {
        self.spawn_rate.total()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn evolve_mode(&self) -> bool {
        self.config.evolve_mode
    }

    /// Ticks run since creation.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // ========== Synchronization ==========

    fn sync_from_backend(&mut self) -> Result<(), GpuError> {
        let (positions, velocities) = self.store.texels_mut();
        self.backend.read_back(positions, velocities)
    }

    fn sync_to_backend(&mut self) {
        self.backend.upload(self.store.positions(), self.store.velocities());
    }
}
