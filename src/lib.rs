pub mod error;
pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use error::{ConfigError, TreeError};

pub use simulation::states::{NVec2, ParticleStore, ParticleView};
pub use simulation::params::{Boundary, Parameters, SimulationConfig};
pub use simulation::engine::Engine;
pub use simulation::interaction::InteractionMatrix;
pub use simulation::barnes_hut::{Aabb, QuadNode, SpatialTree, TreeSettings};
pub use simulation::forces::{soft_clamp, Acceleration, BarnesHutGravity, BoundedLaw, DirectGravity, GravityLaw};
pub use simulation::grid::InteractionGrid;
pub use simulation::driver::{Diagnostics, Simulation};
pub use simulation::scenario::{build_simulation, simulation_config};

pub use configuration::config::{
    BoundaryConfig, EngineConfig, ForceMode, GeneratorConfig, InteractionConfig, ParametersConfig, ParticleConfig,
    ScenarioConfig, TreeConfig,
};

pub use benchmark::benchmark::{bench_gravity, bench_step_curve};
