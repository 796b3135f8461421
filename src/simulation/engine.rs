//! High-level runtime engine settings
//!
//! Selects the force model and the Barnes–Hut options used when building
//! and stepping a [`Simulation`](crate::Simulation)

use crate::configuration::config::ForceMode;
use crate::simulation::barnes_hut::TreeSettings;

#[derive(Debug, Clone, PartialEq)]
pub struct Engine {
    pub mode: ForceMode,    // gravity or bounded
    pub theta: f32,         // opening angle; 0 forces exact summation
    pub tree: TreeSettings, // subdivision limits of the quadtree
}

impl Engine {
    pub const DEFAULT_THETA: f32 = 0.5;
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            mode: ForceMode::Gravity,
            theta: Self::DEFAULT_THETA,
            tree: TreeSettings::default(),
        }
    }
}
