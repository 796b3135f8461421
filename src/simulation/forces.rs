//! Force laws for the particle engine
//!
//! - [`GravityLaw`]: softened, soft-clamped Newtonian pair force shared by the
//!   direct sum and the Barnes–Hut traversal
//! - [`BoundedLaw`]: piecewise-linear short-range kernel of bounded mode
//! - [`Acceleration`]: whole-system acceleration sources, implemented by
//!   [`DirectGravity`] (exact, `O(N^2)`) and [`BarnesHutGravity`]

use rayon::prelude::*;

use crate::simulation::barnes_hut::{SpatialTree, TreeSettings};
use crate::simulation::params::SimulationConfig;
use crate::simulation::states::{NVec2, ParticleView};

/// Continuous compression of force magnitudes above `max_force`:
/// `max_force + ln(magnitude / max_force)`. Disabled for non-positive `max_force`.
#[inline]
pub fn soft_clamp(magnitude: f32, max_force: f32) -> f32 {
    if max_force > 0.0 && magnitude > max_force {
        max_force + (magnitude / max_force).ln()
    } else {
        magnitude
    }
}

/// Softened Newtonian gravity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityLaw {
    pub g: f32,
    pub softening: f32,
    pub max_force: f32,
    /// Sources closer than this contribute nothing
    pub min_distance: f32,
    /// Barnes–Hut opening angle
    pub theta: f32,
}

impl GravityLaw {
    pub fn from_config(config: &SimulationConfig) -> Self {
        let p = &config.parameters;
        Self {
            g: p.g,
            softening: p.softening,
            max_force: p.max_force,
            min_distance: p.min_distance,
            theta: config.engine.theta,
        }
    }

    #[inline]
    pub fn min_distance_sqr(&self) -> f32 {
        self.min_distance * self.min_distance
    }

    /// Force on a body of mass `m_self` from a source of mass `m_other` at
    /// separation `sep` (pointing towards the source), `d2 = |sep|^2 > 0`.
    ///
    /// Magnitude is `G m_self m_other / (d^2 + eps^2)`, soft-clamped; the
    /// direction uses the unsoftened separation.
    #[inline]
    pub fn pair_force(&self, sep: NVec2, d2: f32, m_other: f32, m_self: f32) -> NVec2 {
        let magnitude = self.g * m_self * m_other / (d2 + self.softening * self.softening);
        sep * (soft_clamp(magnitude, self.max_force) / d2.sqrt())
    }
}

/// Short-range typed interaction with radius `r_max` and repulsion zone `beta`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedLaw {
    pub r_max: f32,
    pub beta: f32,
    pub min_distance: f32,
}

impl BoundedLaw {
    pub fn from_config(config: &SimulationConfig) -> Self {
        let p = &config.parameters;
        Self {
            r_max: p.interaction_radius,
            beta: p.beta,
            min_distance: p.min_distance,
        }
    }

    /// Kernel value at normalized distance `x = d / r_max` for strength `a`
    ///
    /// ```text
    /// x < beta        : x / beta - 1                     (universal repulsion)
    /// beta <= x < 1   : a (1 - |2x - 1 - beta| / (1 - beta))
    /// x >= 1          : 0
    /// ```
    #[inline]
    pub fn kernel(&self, x: f32, a: f32) -> f32 {
        if x < self.beta {
            x / self.beta - 1.0
        } else if x < 1.0 {
            a * (1.0 - (2.0 * x - 1.0 - self.beta).abs() / (1.0 - self.beta))
        } else {
            0.0
        }
    }
}

/// Trait for acceleration sources operating on a [`ParticleView`]
/// Implementations overwrite `out[i]` for every slot; non-live slots get zero
pub trait Acceleration {
    fn acceleration(&self, view: ParticleView<'_>, out: &mut [NVec2]);
}

/// Exact pairwise gravity, the reference for the tree approximation
pub struct DirectGravity {
    pub law: GravityLaw,
}

impl Acceleration for DirectGravity {
    fn acceleration(&self, view: ParticleView<'_>, out: &mut [NVec2]) {
        let law = &self.law;
        let min_d2 = law.min_distance_sqr();

        out.par_iter_mut().enumerate().for_each(|(i, a)| {
            *a = NVec2::zeros();
            if !view.is_live(i) {
                return;
            }
            let xi = view.positions[i];
            let mi = view.masses[i];
            let mut force = NVec2::zeros();
            for j in 0..view.len() {
                if j == i || !view.is_live(j) {
                    continue;
                }
                let sep = view.positions[j] - xi;
                let d2 = sep.norm_squared();
                if d2 >= min_d2 {
                    force += law.pair_force(sep, d2, view.masses[j], mi);
                }
            }
            *a = force / mi;
        });
    }
}

/// Gravity through a Barnes–Hut quadtree built for each call
pub struct BarnesHutGravity {
    pub law: GravityLaw,
    pub settings: TreeSettings,
}

impl Acceleration for BarnesHutGravity {
    fn acceleration(&self, view: ParticleView<'_>, out: &mut [NVec2]) {
        let mut tree = SpatialTree::new(self.settings);
        tree.build(&view);
        aggregate_and_apply(&mut tree, view, out, &self.law);
    }
}

// every slot of `out` is written, zero when the tree cannot be aggregated
fn aggregate_and_apply(tree: &mut SpatialTree, view: ParticleView<'_>, out: &mut [NVec2], law: &GravityLaw) {
    if let Err(err) = tree.compute_mass_aggregates() {
        log::error!("tree aggregation failed: {err}");
        out.fill(NVec2::zeros());
        return;
    }
    tree_accelerations(tree, view, out, law);
}

/// Write `F / m` from an aggregated tree into `out`, in parallel over particles
pub fn tree_accelerations(tree: &SpatialTree, view: ParticleView<'_>, out: &mut [NVec2], law: &GravityLaw) {
    out.par_iter_mut().enumerate().for_each(|(i, a)| {
        *a = if view.is_live(i) {
            tree.query_force(view.positions[i], view.masses[i], law) / view.masses[i]
        } else {
            NVec2::zeros()
        };
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_clamp_is_continuous_at_threshold() {
        assert_eq!(soft_clamp(999.0, 1000.0), 999.0);
        assert!((soft_clamp(1000.0, 1000.0) - 1000.0).abs() < 1e-6);
        assert!((soft_clamp(1000.0 * std::f32::consts::E, 1000.0) - 1001.0).abs() < 1e-3);
    }

    #[test]
    fn kernel_is_continuous_at_beta() {
        let law = BoundedLaw { r_max: 60.0, beta: 0.3, min_distance: 0.01 };
        // d = 18 -> x = beta: left limit 0, right value a * (1 - |2 beta - 1 - beta| / (1 - beta)) = 0
        let below = law.kernel(0.3 - 1e-6, 1.0);
        let at = law.kernel(0.3, 1.0);
        assert!(below.abs() < 1e-4);
        assert!(at.abs() < 1e-4);
        assert_eq!(law.kernel(0.0, 0.7), -1.0);
        assert!((law.kernel(0.65, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(law.kernel(1.0, 1.0), 0.0);
    }

    #[test]
    fn unbuilt_tree_zeroes_stale_accelerations() {
        let positions = [NVec2::new(0.0, 0.0), NVec2::new(5.0, 0.0)];
        let masses = [1.0; 2];
        let types = [0; 2];
        let active = [true; 2];
        let view = ParticleView { positions: &positions, masses: &masses, types: &types, active: &active };
        let law = GravityLaw { g: 1.0, softening: 0.0, max_force: 1.0e6, min_distance: 0.01, theta: 0.5 };

        let mut out = [NVec2::new(7.0, -7.0); 2];
        aggregate_and_apply(&mut SpatialTree::default(), view, &mut out, &law);
        assert!(out.iter().all(|a| *a == NVec2::zeros()), "stale values left: {:?}", out);
    }
}
