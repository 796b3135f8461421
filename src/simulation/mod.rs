pub mod states;
pub mod params;
pub mod engine;
pub mod interaction;
pub mod forces;
pub mod integrator;
pub mod barnes_hut;
pub mod grid;
pub mod driver;
pub mod scenario;
