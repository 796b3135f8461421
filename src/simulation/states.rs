//! Particle state for the simulation.
//!
//! [`ParticleStore`] keeps every particle attribute in its own contiguous
//! array (structure-of-arrays): positions, velocities, accelerations, masses,
//! types and the active flag. A particle is addressed by its slot index, which
//! stays valid until the store is cleared.
//!
//! Storage grows by doubling and never shrinks during a run; `clear` only
//! resets the live count so the backing arrays are reused.

use nalgebra::Vector2;

pub type NVec2 = Vector2<f32>;

/// Minimum number of slots allocated on first growth
const INITIAL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ParticleStore {
    pub(crate) positions: Vec<NVec2>,
    pub(crate) velocities: Vec<NVec2>,
    pub(crate) accelerations: Vec<NVec2>,
    pub(crate) masses: Vec<f32>,
    pub(crate) types: Vec<u32>,
    pub(crate) active: Vec<bool>,
    count: usize,
    max_particles: usize,
    recycle_cursor: usize,
    exhausted: bool,
}

/// Read-only borrow of the attributes force passes need
///
/// Slices are truncated to the live count of the store.
#[derive(Clone, Copy)]
pub struct ParticleView<'a> {
    pub positions: &'a [NVec2],
    pub masses: &'a [f32],
    pub types: &'a [u32],
    pub active: &'a [bool],
}

impl<'a> ParticleView<'a> {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// True for slots that take part in force calculations
    #[inline]
    pub fn is_live(&self, i: usize) -> bool {
        self.active[i] && self.masses[i] > 0.0
    }
}

impl ParticleStore {
    pub fn new(max_particles: usize) -> Self {
        Self {
            positions: Vec::new(),
            velocities: Vec::new(),
            accelerations: Vec::new(),
            masses: Vec::new(),
            types: Vec::new(),
            active: Vec::new(),
            count: 0,
            max_particles,
            recycle_cursor: 0,
            exhausted: false,
        }
    }

    /// Append an active particle at rest and return its slot.
    ///
    /// Once `max_particles` slots are in use the first free slot (inactive or
    /// massless) is reused. Returns `None` when the particle is rejected:
    /// non-positive mass or no slot left.
    pub fn add_particle(&mut self, position: NVec2, mass: f32) -> Option<usize> {
        if !(mass > 0.0 && mass.is_finite()) {
            log::warn!("rejecting particle with mass {mass}");
            return None;
        }

        let idx = if self.count < self.max_particles {
            self.grow_for_push();
            let idx = self.count;
            self.count += 1;
            idx
        } else {
            match self.find_free_slot() {
                Some(idx) => idx,
                None => {
                    if !self.exhausted {
                        log::warn!("particle store full ({} slots), dropping adds", self.max_particles);
                        self.exhausted = true;
                    } else {
                        log::debug!("particle store full, add rejected");
                    }
                    return None;
                }
            }
        };
        self.exhausted = false;

        self.positions[idx] = position;
        self.velocities[idx] = NVec2::zeros();
        self.accelerations[idx] = NVec2::zeros();
        self.masses[idx] = mass;
        self.types[idx] = 0;
        self.active[idx] = true;
        Some(idx)
    }

    // doubling growth, capped by max_particles
    fn grow_for_push(&mut self) {
        if self.count < self.positions.len() {
            return;
        }
        let new_capacity = (self.count * 2)
            .max(INITIAL_CAPACITY)
            .min(self.max_particles)
            .max(self.count + 1);

        self.positions.resize(new_capacity, NVec2::zeros());
        self.velocities.resize(new_capacity, NVec2::zeros());
        self.accelerations.resize(new_capacity, NVec2::zeros());
        self.masses.resize(new_capacity, 0.0);
        self.types.resize(new_capacity, 0);
        self.active.resize(new_capacity, false);
    }

    fn find_free_slot(&mut self) -> Option<usize> {
        let n = self.count;
        if n == 0 {
            return None;
        }
        for k in 0..n {
            let i = (self.recycle_cursor + k) % n;
            if !self.active[i] || self.masses[i] <= 0.0 {
                self.recycle_cursor = (i + 1) % n;
                return Some(i);
            }
        }
        None
    }

    /// Reserve backing storage for `n` particles in total
    pub fn reserve(&mut self, n: usize) {
        let extra = n.saturating_sub(self.positions.len());
        self.positions.reserve(extra);
        self.velocities.reserve(extra);
        self.accelerations.reserve(extra);
        self.masses.reserve(extra);
        self.types.reserve(extra);
        self.active.reserve(extra);
    }

    /// Forget every particle but keep the allocated arrays
    pub fn clear(&mut self) {
        self.count = 0;
        self.recycle_cursor = 0;
        self.exhausted = false;
    }

    /// Number of used slots, active or not
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn active_count(&self) -> usize {
        self.active[..self.count].iter().filter(|&&a| a).count()
    }

    /// Allocated slots
    pub fn capacity(&self) -> usize {
        self.positions.len()
    }

    pub fn max_particles(&self) -> usize {
        self.max_particles
    }

    // accessors ==============================================================================

    pub fn position(&self, i: usize) -> Option<NVec2> {
        (i < self.count).then(|| self.positions[i])
    }

    pub fn velocity(&self, i: usize) -> Option<NVec2> {
        (i < self.count).then(|| self.velocities[i])
    }

    pub fn acceleration(&self, i: usize) -> Option<NVec2> {
        (i < self.count).then(|| self.accelerations[i])
    }

    pub fn mass(&self, i: usize) -> Option<f32> {
        (i < self.count).then(|| self.masses[i])
    }

    pub fn particle_type(&self, i: usize) -> Option<u32> {
        (i < self.count).then(|| self.types[i])
    }

    pub fn is_active(&self, i: usize) -> bool {
        i < self.count && self.active[i]
    }

    pub fn set_position(&mut self, i: usize, position: NVec2) -> bool {
        self.write(i, |s| s.positions[i] = position)
    }

    pub fn set_velocity(&mut self, i: usize, velocity: NVec2) -> bool {
        self.write(i, |s| s.velocities[i] = velocity)
    }

    pub fn set_mass(&mut self, i: usize, mass: f32) -> bool {
        self.write(i, |s| s.masses[i] = mass)
    }

    pub fn set_type(&mut self, i: usize, particle_type: u32) -> bool {
        self.write(i, |s| s.types[i] = particle_type)
    }

    pub fn set_active(&mut self, i: usize, active: bool) -> bool {
        self.write(i, |s| s.active[i] = active)
    }

    fn write(&mut self, i: usize, f: impl FnOnce(&mut Self)) -> bool {
        if i >= self.count {
            return false;
        }
        f(self);
        true
    }

    /// Move every particle whose type is `>= num_types` back to type 0
    pub fn retype_out_of_range(&mut self, num_types: u32) -> usize {
        let mut changed = 0;
        for t in &mut self.types[..self.count] {
            if *t >= num_types {
                *t = 0;
                changed += 1;
            }
        }
        changed
    }

    // views ==================================================================================

    pub fn positions(&self) -> &[NVec2] {
        &self.positions[..self.count]
    }

    pub fn velocities(&self) -> &[NVec2] {
        &self.velocities[..self.count]
    }

    pub fn masses(&self) -> &[f32] {
        &self.masses[..self.count]
    }

    pub fn types(&self) -> &[u32] {
        &self.types[..self.count]
    }

    pub fn view(&self) -> ParticleView<'_> {
        let n = self.count;
        ParticleView {
            positions: &self.positions[..n],
            masses: &self.masses[..n],
            types: &self.types[..n],
            active: &self.active[..n],
        }
    }

    /// Read-only view plus exclusive access to the velocity array
    pub fn split_velocities(&mut self) -> (ParticleView<'_>, &mut [NVec2]) {
        let n = self.count;
        let view = ParticleView {
            positions: &self.positions[..n],
            masses: &self.masses[..n],
            types: &self.types[..n],
            active: &self.active[..n],
        };
        (view, &mut self.velocities[..n])
    }

    /// Read-only view plus exclusive access to the acceleration array
    pub fn split_accelerations(&mut self) -> (ParticleView<'_>, &mut [NVec2]) {
        let n = self.count;
        let view = ParticleView {
            positions: &self.positions[..n],
            masses: &self.masses[..n],
            types: &self.types[..n],
            active: &self.active[..n],
        };
        (view, &mut self.accelerations[..n])
    }

    // diagnostics ============================================================================

    fn live(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.count).filter(|&i| self.active[i] && self.masses[i] > 0.0)
    }

    /// Sum of 1/2 m v^2 over active particles
    pub fn kinetic_energy(&self) -> f64 {
        self.live()
            .map(|i| 0.5 * self.masses[i] as f64 * self.velocities[i].norm_squared() as f64)
            .sum()
    }

    pub fn total_momentum(&self) -> NVec2 {
        self.live().fold(NVec2::zeros(), |p, i| p + self.velocities[i] * self.masses[i])
    }

    /// Mass-weighted mean position of active particles, `None` when there are none
    pub fn center_of_mass(&self) -> Option<NVec2> {
        let (m, weighted) = self.live().fold((0.0f32, NVec2::zeros()), |(m, c), i| {
            (m + self.masses[i], c + self.positions[i] * self.masses[i])
        });
        (m > 0.0).then(|| weighted / m)
    }
}

impl Default for ParticleStore {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}
