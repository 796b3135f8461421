//! Build fully-initialized simulations from configuration
//!
//! Takes a [`ScenarioConfig`] (YAML-facing) and produces a runtime
//! [`Simulation`] containing:
//! - engine settings (`Engine`)
//! - physical parameters (`Parameters`) and optional boundary
//! - the interaction matrix, explicit or drawn from the seed
//! - the initial particles: explicit entries first, then each generator in order

use std::f32::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::configuration::config::{GeneratorConfig, ParticleConfig, ScenarioConfig};
use crate::error::ConfigError;
use crate::simulation::barnes_hut::TreeSettings;
use crate::simulation::driver::Simulation;
use crate::simulation::engine::Engine;
use crate::simulation::interaction::InteractionMatrix;
use crate::simulation::params::{Boundary, Parameters, SimulationConfig};
use crate::simulation::states::NVec2;

/// Runtime configuration from the YAML-facing one, missing values defaulted
pub fn simulation_config(cfg: &ScenarioConfig) -> Result<SimulationConfig, ConfigError> {
    // Engine (runtime) from EngineConfig
    let e_cfg = &cfg.engine;
    let tree_default = TreeSettings::default();
    let engine = Engine {
        mode: e_cfg.mode,
        theta: e_cfg.theta.unwrap_or(Engine::DEFAULT_THETA),
        tree: TreeSettings {
            leaf_capacity: e_cfg.tree.leaf_capacity.unwrap_or(tree_default.leaf_capacity),
            max_depth: e_cfg.tree.max_depth.unwrap_or(tree_default.max_depth),
            min_node_size: e_cfg.tree.min_node_size.unwrap_or(tree_default.min_node_size),
            growth_factor: e_cfg.tree.growth_factor.unwrap_or(tree_default.growth_factor),
        },
    };

    // Parameters (runtime) from ParametersConfig
    let p_cfg = &cfg.parameters;
    let d = Parameters::default();
    let matrix_rows = cfg.interactions.as_ref().and_then(|i| i.matrix.as_ref());
    let num_types = cfg
        .interactions
        .as_ref()
        .and_then(|i| i.num_types)
        .or(matrix_rows.map(|rows| rows.len()))
        .unwrap_or(d.num_types);
    let parameters = Parameters {
        g: p_cfg.g.unwrap_or(d.g),
        time_step: p_cfg.time_step.unwrap_or(d.time_step),
        simulation_speed: p_cfg.simulation_speed.unwrap_or(d.simulation_speed),
        softening: p_cfg.softening.unwrap_or(d.softening),
        max_force: p_cfg.max_force.unwrap_or(d.max_force),
        interaction_radius: p_cfg.interaction_radius.unwrap_or(d.interaction_radius),
        beta: p_cfg.beta.unwrap_or(d.beta),
        min_distance: p_cfg.min_distance.unwrap_or(d.min_distance),
        friction: p_cfg.friction.unwrap_or(d.friction),
        max_particles: p_cfg.max_particles.unwrap_or(d.max_particles),
        num_types,
        seed: p_cfg.seed.unwrap_or(d.seed),
    };

    let boundary = cfg.boundary.as_ref().map(|b| Boundary {
        min: NVec2::new(b.min[0], b.min[1]),
        max: NVec2::new(b.max[0], b.max[1]),
        restitution: b.restitution.unwrap_or(Boundary::DEFAULT_RESTITUTION),
    });

    let config = SimulationConfig::new(engine, parameters, boundary);
    match matrix_rows {
        Some(rows) => config.with_interactions(InteractionMatrix::from_rows(rows)?),
        None => Ok(config),
    }
}

/// Build the simulation and spawn every configured particle
pub fn build_simulation(cfg: &ScenarioConfig) -> Result<Simulation, ConfigError> {
    cfg.validate()?;
    let config = simulation_config(cfg)?;
    let num_types = config.parameters.num_types.max(1) as u32;
    let g = config.parameters.g;
    // generators draw from their own stream so emission stays independent of layout
    let mut rng = StdRng::seed_from_u64(config.parameters.seed.wrapping_add(2));
    let mut sim = Simulation::new(config);

    for pc in &cfg.particles {
        spawn(&mut sim, pc);
    }
    for generator in &cfg.generators {
        let added = match generator {
            GeneratorConfig::Disc { count, center, radius, mass, orbital, central_mass } => {
                let center = NVec2::new(center[0], center[1]);
                let disc = Disc { count: *count, center, radius: *radius, mass: *mass };
                disc.spawn(&mut sim, &mut rng, num_types, orbital.then_some(g), *central_mass)
            }
            GeneratorConfig::UniformBox { count, min, max, mass, speed } => {
                let (min, max) = (NVec2::new(min[0], min[1]), NVec2::new(max[0], max[1]));
                uniform_box(&mut sim, &mut rng, *count, min, max, *mass, *speed, num_types)
            }
        };
        log::debug!("generator added {added} particles");
    }

    log::info!(
        "scenario ready: {} particles, mode {:?}",
        sim.particle_count(),
        sim.config().engine.mode
    );
    Ok(sim)
}

fn spawn(sim: &mut Simulation, pc: &ParticleConfig) -> Option<usize> {
    let idx = sim.add_particle(NVec2::new(pc.x[0], pc.x[1]), pc.m)?;
    sim.set_velocity(idx, NVec2::new(pc.v[0], pc.v[1]));
    sim.set_type(idx, pc.particle_type);
    Some(idx)
}

struct Disc {
    count: usize,
    center: NVec2,
    radius: f32,
    mass: f32,
}

impl Disc {
    /// Area-uniform disc. With `orbital_g` every particle gets the circular
    /// speed for the mass enclosed by its radius, counter-clockwise.
    fn spawn(&self, sim: &mut Simulation, rng: &mut StdRng, num_types: u32, orbital_g: Option<f32>, central_mass: f32) -> usize {
        let mut added = 0;
        if central_mass > 0.0 && sim.add_particle(self.center, central_mass).is_some() {
            added += 1;
        }

        let disc_mass = self.mass * self.count as f32;
        for _ in 0..self.count {
            let r = self.radius * rng.random::<f32>().sqrt();
            let phi = rng.random_range(0.0..TAU);
            let (s, c) = phi.sin_cos();
            let Some(idx) = sim.add_particle(self.center + NVec2::new(c, s) * r, self.mass) else {
                break;
            };
            sim.set_type(idx, rng.random_range(0..num_types));

            if let Some(g) = orbital_g {
                if r > 0.0 {
                    let enclosed = central_mass + disc_mass * (r / self.radius).powi(2);
                    let speed = (g * enclosed / r).sqrt();
                    sim.set_velocity(idx, NVec2::new(-s, c) * speed);
                }
            }
            added += 1;
        }
        added
    }
}

#[allow(clippy::too_many_arguments)]
fn uniform_box(
    sim: &mut Simulation,
    rng: &mut StdRng,
    count: usize,
    min: NVec2,
    max: NVec2,
    mass: f32,
    speed: f32,
    num_types: u32,
) -> usize {
    let mut added = 0;
    for _ in 0..count {
        let p = NVec2::new(uniform(rng, min.x, max.x), uniform(rng, min.y, max.y));
        let Some(idx) = sim.add_particle(p, mass) else {
            break;
        };
        sim.set_type(idx, rng.random_range(0..num_types));
        if speed > 0.0 {
            sim.set_velocity(idx, NVec2::new(rng.random_range(-speed..speed), rng.random_range(-speed..speed)));
        }
        added += 1;
    }
    added
}

// degenerate ranges collapse to their lower end
fn uniform(rng: &mut StdRng, lo: f32, hi: f32) -> f32 {
    if hi > lo {
        rng.random_range(lo..hi)
    } else {
        lo
    }
}
