//! Physical and numerical parameters for the simulation
//!
//! `Parameters` holds runtime settings:
//! - gravitational constant, softening and force clamp,
//! - interaction radius and repulsion zone for bounded mode,
//! - time step, speed multiplier and friction,
//! - store limit, type count and random seed
//!
//! `SimulationConfig` bundles them with the engine settings, the optional
//! boundary and the interaction matrix; it is what a [`Simulation`](crate::Simulation)
//! is built from.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::ConfigError;
use crate::simulation::engine::Engine;
use crate::simulation::interaction::InteractionMatrix;
use crate::simulation::states::NVec2;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub g: f32,                  // gravitational constant
    pub time_step: f32,          // base step of `tick`
    pub simulation_speed: f32,   // multiplier on time_step
    pub softening: f32,          // epsilon
    pub max_force: f32,          // soft clamp threshold
    pub interaction_radius: f32, // R_max
    pub beta: f32,               // repulsion zone fraction
    pub min_distance: f32,       // closer pairs are ignored
    pub friction: f32,           // velocity fraction lost per 1/60 s
    pub max_particles: usize,
    pub num_types: usize,
    pub seed: u64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            g: 6.6743e-2,
            time_step: 0.016,
            simulation_speed: 1.0,
            softening: 0.025,
            max_force: 1000.0,
            interaction_radius: 60.0,
            beta: 0.3,
            min_distance: 0.01,
            friction: 0.0,
            max_particles: 1_000_000,
            num_types: 5,
            seed: 42,
        }
    }
}

/// Reflecting box; particles leaving it are clamped back and bounce
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub min: NVec2,
    pub max: NVec2,
    pub restitution: f32,
}

impl Boundary {
    pub const DEFAULT_RESTITUTION: f32 = 0.9;

    pub fn new(min: NVec2, max: NVec2) -> Self {
        Self {
            min,
            max,
            restitution: Self::DEFAULT_RESTITUTION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub engine: Engine,
    pub parameters: Parameters,
    pub boundary: Option<Boundary>,
    pub interactions: InteractionMatrix,
}

impl SimulationConfig {
    /// Random interaction matrix of `parameters.num_types`, drawn from `parameters.seed`
    pub fn new(engine: Engine, parameters: Parameters, boundary: Option<Boundary>) -> Self {
        let mut rng = StdRng::seed_from_u64(parameters.seed);
        let interactions = InteractionMatrix::random(parameters.num_types, &mut rng);
        Self {
            engine,
            parameters,
            boundary,
            interactions,
        }
    }

    /// Replace the interaction matrix; its size must equal `num_types`
    pub fn with_interactions(mut self, interactions: InteractionMatrix) -> Result<Self, ConfigError> {
        if interactions.size() != self.parameters.num_types {
            return Err(ConfigError::Invalid(format!(
                "interaction matrix is {0}x{0} but num_types is {1}",
                interactions.size(),
                self.parameters.num_types
            )));
        }
        self.interactions = interactions;
        Ok(self)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(Engine::default(), Parameters::default(), None)
    }
}
