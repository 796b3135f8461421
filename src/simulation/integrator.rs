//! Leapfrog (kick-drift-kick) time stepping on the particle store
//!
//! One step is split around the force evaluation:
//! - [`ParticleStore::integrate_half_step`]: v += a dt/2, x += v dt, a = 0
//! - forces at the new positions are written into the acceleration array
//! - [`ParticleStore::integrate_complete_step`]: v += a dt/2
//!
//! Inactive slots are skipped by every pass. All loops run on rayon over
//! disjoint slots, so each slot is written by exactly one task.

use rayon::prelude::*;

use super::params::Boundary;
use super::states::{NVec2, ParticleStore};

impl ParticleStore {
    /// First kick, full drift and accumulator reset, fused into one pass
    pub fn integrate_half_step(&mut self, dt: f32) {
        let n = self.len();
        let half_dt = 0.5 * dt;

        self.positions[..n]
            .par_iter_mut()
            .zip(self.velocities[..n].par_iter_mut())
            .zip(self.accelerations[..n].par_iter_mut())
            .zip(self.active[..n].par_iter())
            .for_each(|(((x, v), a), &live)| {
                if !live {
                    return;
                }
                // v_n+1/2 = v_n + dt/2 a_n
                *v += *a * half_dt;
                // x_n+1 = x_n + dt v_n+1/2
                *x += *v * dt;
                *a = NVec2::zeros();
            });
    }

    /// Second kick with the accelerations computed at the new positions
    pub fn integrate_complete_step(&mut self, dt: f32) {
        let n = self.len();
        let half_dt = 0.5 * dt;

        self.velocities[..n]
            .par_iter_mut()
            .zip(self.accelerations[..n].par_iter())
            .zip(self.active[..n].par_iter())
            .for_each(|((v, a), &live)| {
                if live {
                    *v += *a * half_dt;
                }
            });
    }

    /// Clamp particles into `boundary`, reflecting and damping the velocity
    /// component of every axis that was crossed
    pub fn apply_boundary(&mut self, boundary: &Boundary) {
        let n = self.len();
        let restitution = boundary.restitution;

        self.positions[..n]
            .par_iter_mut()
            .zip(self.velocities[..n].par_iter_mut())
            .zip(self.active[..n].par_iter())
            .for_each(|((x, v), &live)| {
                if !live {
                    return;
                }
                for axis in 0..2 {
                    if x[axis] > boundary.max[axis] {
                        x[axis] = boundary.max[axis];
                        v[axis] *= -restitution;
                    } else if x[axis] < boundary.min[axis] {
                        x[axis] = boundary.min[axis];
                        v[axis] *= -restitution;
                    }
                }
            });
    }

    /// Velocity decay `v *= (1 - friction)^(dt * 60)`, i.e. `friction` is the
    /// fraction lost per 1/60 s
    pub fn apply_friction(&mut self, friction: f32, dt: f32) {
        if friction <= 0.0 {
            return;
        }
        let n = self.len();
        let retain = (1.0 - friction.min(1.0)).powf(dt * 60.0);

        self.velocities[..n]
            .par_iter_mut()
            .zip(self.active[..n].par_iter())
            .for_each(|(v, &live)| {
                if live {
                    *v *= retain;
                }
            });
    }
}
