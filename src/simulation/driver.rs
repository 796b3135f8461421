//! The simulation driver.
//!
//! [`Simulation`] owns the particle store, the quadtree, the interaction grid
//! and the configuration, and advances them one step at a time:
//!
//! 1. kick + drift every active particle, reset accelerations, apply the boundary
//! 2. rebuild the quadtree and aggregate masses
//! 3. evaluate forces: Barnes–Hut gravity (writes accelerations) or the
//!    bounded interaction on the grid (kicks velocities directly)
//! 4. gravity only: second kick with the fresh accelerations
//! 5. friction
//!
//! Every phase is data-parallel over disjoint particles and finishes before the
//! next one starts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::configuration::config::ForceMode;
use crate::simulation::barnes_hut::{Aabb, SpatialTree};
use crate::simulation::forces::{tree_accelerations, BoundedLaw, GravityLaw};
use crate::simulation::grid::InteractionGrid;
use crate::simulation::interaction::InteractionMatrix;
use crate::simulation::params::{Boundary, SimulationConfig};
use crate::simulation::states::{NVec2, ParticleStore};

/// Upper bound on the step `tick` takes, whatever the speed multiplier
pub const MAX_TICK_DT: f32 = 0.05;

/// Half-width of the square `emit` scatters particles over
pub const EMIT_JITTER: f32 = 10.0;

/// Summary values for logging and tests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    pub step: u64,
    pub time: f64,
    pub particles: usize,
    pub active: usize,
    pub kinetic_energy: f64,
    pub momentum: NVec2,
    pub center_of_mass: Option<NVec2>,
    pub tree_nodes: usize,
    pub tree_depth: u32,
}

pub struct Simulation {
    config: SimulationConfig,
    store: ParticleStore,
    tree: SpatialTree,
    grid: InteractionGrid,
    rng: StdRng,
    steps: u64,
    time: f64,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        let store = ParticleStore::new(config.parameters.max_particles);
        let tree = SpatialTree::new(config.engine.tree);
        let rng = StdRng::seed_from_u64(config.parameters.seed.wrapping_add(1));
        log::debug!(
            "new simulation: mode {:?}, theta {}, {} particle types",
            config.engine.mode,
            config.engine.theta,
            config.interactions.size()
        );
        Self {
            config,
            store,
            tree,
            grid: InteractionGrid::new(),
            rng,
            steps: 0,
            time: 0.0,
        }
    }

    // particles ==============================================================================

    /// Add an active particle at rest with type 0; `None` when rejected
    pub fn add_particle(&mut self, position: NVec2, mass: f32) -> Option<usize> {
        self.store.add_particle(position, mass)
    }

    /// Add `count` particles jittered around `center`. `particle_type` of
    /// `None` draws a random type per particle. Returns how many were added.
    pub fn emit(&mut self, center: NVec2, count: usize, particle_type: Option<u32>, mass: f32) -> usize {
        let num_types = self.config.interactions.size().max(1) as u32;
        let mut added = 0;
        for _ in 0..count {
            let offset = NVec2::new(
                self.rng.random_range(-EMIT_JITTER..EMIT_JITTER),
                self.rng.random_range(-EMIT_JITTER..EMIT_JITTER),
            );
            let t = particle_type.unwrap_or_else(|| self.rng.random_range(0..num_types));
            let Some(idx) = self.store.add_particle(center + offset, mass) else {
                break;
            };
            self.store.set_type(idx, t);
            added += 1;
        }
        log::debug!("emitted {added}/{count} particles at ({}, {})", center.x, center.y);
        added
    }

    pub fn set_position(&mut self, i: usize, position: NVec2) -> bool {
        self.store.set_position(i, position)
    }

    pub fn set_velocity(&mut self, i: usize, velocity: NVec2) -> bool {
        self.store.set_velocity(i, velocity)
    }

    pub fn set_type(&mut self, i: usize, particle_type: u32) -> bool {
        self.store.set_type(i, particle_type)
    }

    pub fn set_active(&mut self, i: usize, active: bool) -> bool {
        self.store.set_active(i, active)
    }

    pub fn set_mass(&mut self, i: usize, mass: f32) -> bool {
        self.store.set_mass(i, mass)
    }

    pub fn particle_count(&self) -> usize {
        self.store.len()
    }

    pub fn active_particle_count(&self) -> usize {
        self.store.active_count()
    }

    /// Drop every particle and the tree; configuration and matrix are kept
    pub fn clear(&mut self) {
        self.store.clear();
        self.tree.clear();
        self.grid.clear();
        log::debug!("simulation cleared");
    }

    // stepping ===============================================================================

    /// Advance by `dt`. Non-positive or non-finite steps do nothing.
    pub fn step(&mut self, dt: f32) {
        if !(dt > 0.0 && dt.is_finite()) {
            log::debug!("ignoring step with dt = {dt}");
            return;
        }

        self.store.integrate_half_step(dt);
        if let Some(boundary) = &self.config.boundary {
            self.store.apply_boundary(boundary);
        }

        self.tree.build(&self.store.view());
        if let Err(err) = self.tree.compute_mass_aggregates() {
            log::error!("skipping force pass: {err}");
            return;
        }

        match self.config.engine.mode {
            ForceMode::Gravity => {
                let law = GravityLaw::from_config(&self.config);
                let (view, accelerations) = self.store.split_accelerations();
                tree_accelerations(&self.tree, view, accelerations, &law);
                self.store.integrate_complete_step(dt);
            }
            ForceMode::Bounded => {
                let law = BoundedLaw::from_config(&self.config);
                self.grid.build(&self.store.view(), law.r_max);
                let (view, velocities) = self.store.split_velocities();
                self.grid
                    .apply_interactions(view, velocities, &self.config.interactions, &law, dt);
            }
        }

        self.store.apply_friction(self.config.parameters.friction, dt);

        self.steps += 1;
        self.time += dt as f64;
        log::trace!(
            "step {} dt {dt}: {} in tree, {} nodes, depth {}",
            self.steps,
            self.tree.root().map_or(0, |r| r.particle_count),
            self.tree.node_count(),
            self.tree.max_depth()
        );
    }

    /// One step of `time_step * simulation_speed`, capped at [`MAX_TICK_DT`]
    pub fn tick(&mut self) {
        let p = &self.config.parameters;
        let dt = (p.time_step * p.simulation_speed).min(MAX_TICK_DT);
        self.step(dt);
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    // configuration ==========================================================================

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn set_gravitational_constant(&mut self, g: f32) {
        self.config.parameters.g = g;
    }

    pub fn set_time_step(&mut self, time_step: f32) {
        if time_step > 0.0 && time_step.is_finite() {
            self.config.parameters.time_step = time_step;
        } else {
            log::warn!("ignoring time step {time_step}");
        }
    }

    pub fn set_simulation_speed(&mut self, speed: f32) {
        if speed >= 0.0 && speed.is_finite() {
            self.config.parameters.simulation_speed = speed;
        } else {
            log::warn!("ignoring simulation speed {speed}");
        }
    }

    pub fn set_interaction_radius(&mut self, radius: f32) {
        if radius > 0.0 && radius.is_finite() {
            self.config.parameters.interaction_radius = radius;
        } else {
            log::warn!("ignoring interaction radius {radius}");
        }
    }

    pub fn set_beta(&mut self, beta: f32) {
        if beta > 0.0 && beta < 1.0 {
            self.config.parameters.beta = beta;
        } else {
            log::warn!("ignoring beta {beta}, must lie in (0, 1)");
        }
    }

    pub fn set_opening_angle(&mut self, theta: f32) {
        if theta >= 0.0 && theta.is_finite() {
            self.config.engine.theta = theta;
        } else {
            log::warn!("ignoring opening angle {theta}");
        }
    }

    pub fn set_softening(&mut self, softening: f32) {
        self.config.parameters.softening = softening.abs();
    }

    pub fn set_max_force(&mut self, max_force: f32) {
        self.config.parameters.max_force = max_force;
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.config.parameters.friction = friction.clamp(0.0, 1.0);
    }

    pub fn set_force_mode(&mut self, mode: ForceMode) {
        self.config.engine.mode = mode;
    }

    pub fn set_boundary(&mut self, boundary: Option<Boundary>) {
        self.config.boundary = boundary;
    }

    /// Resize the matrix to `k` types with fresh random strengths; particles
    /// whose type no longer exists become type 0
    pub fn set_num_particle_types(&mut self, k: usize) {
        self.config.interactions.resize(k, &mut self.rng);
        self.config.parameters.num_types = k;
        let retyped = self.store.retype_out_of_range(k as u32);
        log::debug!("interaction matrix reset to {k} types, {retyped} particles retyped");
    }

    pub fn randomize_interaction_matrix(&mut self) {
        self.config.interactions.randomize(&mut self.rng);
        log::debug!("interaction matrix randomized");
    }

    pub fn interaction_matrix(&self) -> &InteractionMatrix {
        &self.config.interactions
    }

    pub fn interaction_strength(&self, i: usize, j: usize) -> f32 {
        self.config.interactions.get(i, j)
    }

    pub fn set_interaction_strength(&mut self, i: usize, j: usize, value: f32) -> bool {
        self.config.interactions.set(i, j, value)
    }

    // inspection =============================================================================

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    pub fn tree(&self) -> &SpatialTree {
        &self.tree
    }

    pub fn node_bounds(&self) -> Vec<Aabb> {
        self.tree.node_bounds().collect()
    }

    pub fn mass_centers(&self) -> Vec<(NVec2, f32)> {
        self.tree.mass_centers().collect()
    }

    pub fn node_count(&self) -> usize {
        self.tree.node_count()
    }

    pub fn max_depth(&self) -> u32 {
        self.tree.max_depth()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            step: self.steps,
            time: self.time,
            particles: self.store.len(),
            active: self.store.active_count(),
            kinetic_energy: self.store.kinetic_energy(),
            momentum: self.store.total_momentum(),
            center_of_mass: self.store.center_of_mass(),
            tree_nodes: self.tree.node_count(),
            tree_depth: self.tree.max_depth(),
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}
