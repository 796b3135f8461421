//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! scenario. A scenario consists of:
//!
//! - [`EngineConfig`]      – force mode, opening angle and tree limits
//! - [`ParametersConfig`]  – physical constants and step settings, every field optional
//! - [`BoundaryConfig`]    – optional reflecting box
//! - [`InteractionConfig`] – type count and optional explicit matrix
//! - [`ParticleConfig`] / [`GeneratorConfig`] – initial particles
//!
//! # YAML format
//!
//! ```yaml
//! engine:
//!   mode: gravity           # or "bounded"
//!   theta: 0.5
//!   tree:
//!     leaf_capacity: 8
//!     max_depth: 20
//!
//! parameters:
//!   g: 0.066743
//!   time_step: 0.016
//!   softening: 0.025
//!   seed: 42
//!
//! boundary:
//!   min: [ -640.0, -360.0 ]
//!   max: [  640.0,  360.0 ]
//!
//! interactions:
//!   num_types: 2
//!   matrix:
//!     - [  1.0, -0.5 ]
//!     - [  0.3,  0.2 ]
//!
//! particles:
//!   - x: [ 0.0, 0.0 ]
//!     m: 100.0
//!
//! generators:
//!   - kind: disc
//!     count: 2000
//!     center: [ 0.0, 0.0 ]
//!     radius: 300.0
//!     mass: 1.0
//!     orbital: true
//! ```
//!
//! [`ScenarioConfig::validate`] checks the values serde cannot; the runtime
//! side lives in [`crate::simulation::scenario`].

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Which force model a step evaluates
/// `mode: gravity` or `mode: bounded`
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForceMode {
    #[default]
    Gravity, // Barnes–Hut gravity, full leapfrog step
    Bounded, // short-range typed interaction on a uniform grid, velocity kick only
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TreeConfig {
    pub leaf_capacity: Option<usize>, // split nodes holding more particles than this
    pub max_depth: Option<u32>,       // hard depth limit
    pub min_node_size: Option<f32>,   // never split nodes with a smaller half-dimension
    pub growth_factor: Option<f32>,   // root box margin around the particle extent
}

/// High-level engine configuration
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub mode: ForceMode,
    pub theta: Option<f32>, // opening angle; a node is used whole when size / distance < theta
    #[serde(default)]
    pub tree: TreeConfig,
}

/// Physical constants and step settings, missing fields take the runtime defaults
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ParametersConfig {
    pub g: Option<f32>,                  // gravitational constant
    pub time_step: Option<f32>,          // base step used by `tick`
    pub simulation_speed: Option<f32>,   // multiplier on time_step
    pub softening: Option<f32>,          // epsilon in d^2 + epsilon^2
    pub max_force: Option<f32>,          // soft clamp threshold
    pub interaction_radius: Option<f32>, // R_max for bounded mode
    pub beta: Option<f32>,               // repulsion zone as a fraction of R_max
    pub min_distance: Option<f32>,       // pairs closer than this are ignored
    pub friction: Option<f32>,           // velocity fraction lost per 1/60 s
    pub max_particles: Option<usize>,    // slot limit of the store
    pub seed: Option<u64>,               // deterministic seed for matrices and emission
}

/// Reflecting axis-aligned box
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct BoundaryConfig {
    pub min: [f32; 2],
    pub max: [f32; 2],
    pub restitution: Option<f32>, // fraction of the normal velocity kept on bounce
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct InteractionConfig {
    pub num_types: Option<usize>,     // K, defaults to the matrix size or 5
    pub matrix: Option<Vec<Vec<f32>>>, // K rows of K strengths; random when absent
}

/// Initial state of one explicit particle
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct ParticleConfig {
    pub x: [f32; 2],
    #[serde(default)]
    pub v: [f32; 2],
    pub m: f32,
    #[serde(default, rename = "type")]
    pub particle_type: u32,
}

/// Procedural particle sources
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratorConfig {
    /// Uniform disc, optionally on circular orbits around its center
    Disc {
        count: usize,
        center: [f32; 2],
        radius: f32,
        mass: f32,
        #[serde(default)]
        orbital: bool,
        #[serde(default)]
        central_mass: f32, // extra body placed at the center, 0 for none
    },
    /// Uniform rectangle with random types
    UniformBox {
        count: usize,
        min: [f32; 2],
        max: [f32; 2],
        mass: f32,
        #[serde(default)]
        speed: f32, // maximum initial speed per axis
    },
}

/// Top-level scenario configuration loaded from YAML
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub parameters: ParametersConfig,
    pub boundary: Option<BoundaryConfig>,
    pub interactions: Option<InteractionConfig>,
    #[serde(default)]
    pub particles: Vec<ParticleConfig>,
    #[serde(default)]
    pub generators: Vec<GeneratorConfig>,
}

impl ScenarioConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: ScenarioConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Reject values that would make the run meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if let Some(theta) = self.engine.theta {
            if !(theta >= 0.0 && theta.is_finite()) {
                return invalid(format!("theta must be a non-negative number, got {theta}"));
            }
        }
        if self.engine.tree.leaf_capacity == Some(0) {
            return invalid("tree.leaf_capacity must be at least 1".into());
        }
        if let Some(growth) = self.engine.tree.growth_factor {
            if !(growth >= 1.0 && growth.is_finite()) {
                return invalid(format!("tree.growth_factor must be at least 1, got {growth}"));
            }
        }
        if let Some(size) = self.engine.tree.min_node_size {
            if !(size >= 0.0 && size.is_finite()) {
                return invalid(format!("tree.min_node_size must be non-negative, got {size}"));
            }
        }

        let p = &self.parameters;
        for (name, value) in [
            ("time_step", p.time_step),
            ("interaction_radius", p.interaction_radius),
            ("simulation_speed", p.simulation_speed),
        ] {
            if let Some(v) = value {
                if !(v > 0.0 && v.is_finite()) {
                    return invalid(format!("{name} must be positive, got {v}"));
                }
            }
        }
        for (name, value) in [("softening", p.softening), ("min_distance", p.min_distance)] {
            if let Some(v) = value {
                if !(v >= 0.0 && v.is_finite()) {
                    return invalid(format!("{name} must be non-negative, got {v}"));
                }
            }
        }
        if let Some(beta) = p.beta {
            if !(beta > 0.0 && beta < 1.0) {
                return invalid(format!("beta must lie in (0, 1), got {beta}"));
            }
        }
        if let Some(friction) = p.friction {
            if !(0.0..=1.0).contains(&friction) {
                return invalid(format!("friction must lie in [0, 1], got {friction}"));
            }
        }

        if let Some(b) = &self.boundary {
            if b.min[0] >= b.max[0] || b.min[1] >= b.max[1] {
                return invalid(format!("boundary min {:?} must be below max {:?}", b.min, b.max));
            }
        }

        if let Some(inter) = &self.interactions {
            if inter.num_types == Some(0) {
                return invalid("interactions.num_types must be at least 1".into());
            }
            if let (Some(k), Some(rows)) = (inter.num_types, &inter.matrix) {
                if rows.len() != k {
                    return invalid(format!("num_types is {k} but the matrix has {} rows", rows.len()));
                }
            }
        }

        for (i, particle) in self.particles.iter().enumerate() {
            if !(particle.m > 0.0 && particle.m.is_finite()) {
                return invalid(format!("particle {i} has non-positive mass {}", particle.m));
            }
        }
        for (i, generator) in self.generators.iter().enumerate() {
            let mass = match generator {
                GeneratorConfig::Disc { mass, radius, .. } => {
                    if !(*radius > 0.0) {
                        return invalid(format!("generator {i}: disc radius must be positive"));
                    }
                    *mass
                }
                GeneratorConfig::UniformBox { mass, min, max, .. } => {
                    if min[0] > max[0] || min[1] > max[1] {
                        return invalid(format!("generator {i}: box min must not exceed max"));
                    }
                    *mass
                }
            };
            if !(mass > 0.0 && mass.is_finite()) {
                return invalid(format!("generator {i}: mass must be positive, got {mass}"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = ScenarioConfig::from_yaml_str("{}").unwrap();
        assert_eq!(cfg.engine.mode, ForceMode::Gravity);
        assert!(cfg.particles.is_empty());
        assert!(cfg.boundary.is_none());
    }

    #[test]
    fn generators_are_tagged_by_kind() {
        let yaml = r#"
engine:
  mode: bounded
generators:
  - kind: uniform_box
    count: 10
    min: [0.0, 0.0]
    max: [5.0, 5.0]
    mass: 1.0
"#;
        let cfg = ScenarioConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.engine.mode, ForceMode::Bounded);
        assert!(matches!(cfg.generators[0], GeneratorConfig::UniformBox { count: 10, .. }));
    }

    #[test]
    fn invalid_beta_is_rejected() {
        let yaml = "parameters:\n  beta: 1.5\n";
        assert!(matches!(
            ScenarioConfig::from_yaml_str(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            ScenarioConfig::from_yaml_str("parameters:\n  gravity: 1.0\n"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn degenerate_tree_and_softening_are_rejected() {
        for yaml in [
            "engine:\n  tree:\n    growth_factor: 0.0\n",
            "engine:\n  tree:\n    growth_factor: 0.5\n",
            "engine:\n  tree:\n    min_node_size: -1.0\n",
            "parameters:\n  softening: -0.1\n",
            "parameters:\n  min_distance: -0.01\n",
        ] {
            assert!(
                matches!(ScenarioConfig::from_yaml_str(yaml), Err(ConfigError::Invalid(_))),
                "accepted {yaml:?}"
            );
        }
        let yaml = "engine:\n  tree:\n    growth_factor: 1.0\n    min_node_size: 0.0\nparameters:\n  softening: 0.0\n";
        assert!(ScenarioConfig::from_yaml_str(yaml).is_ok());
    }
}
