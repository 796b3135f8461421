//! Uniform spatial hash for the bounded interaction.
//!
//! Cells are squares of side `R_max` laid over the extent of the live
//! particles, so every partner within `R_max` sits in the 3x3 block around a
//! particle's own cell. Cell contents use a compressed layout: particle
//! indices sorted by cell in one buffer, with `cell_start[c]..cell_start[c + 1]`
//! selecting cell `c`.
//!
//! Each axis is capped at [`MAX_CELLS_PER_AXIS`]; coordinates past the cap
//! clamp into the border cell. Clamping is monotone, so near neighbours stay
//! in adjacent cells and the result is unchanged, only slower for very sparse
//! outliers.

use rayon::prelude::*;

use crate::simulation::forces::BoundedLaw;
use crate::simulation::interaction::InteractionMatrix;
use crate::simulation::states::{NVec2, ParticleView};

pub const MAX_CELLS_PER_AXIS: usize = 1024;

#[derive(Debug, Clone, Default)]
pub struct InteractionGrid {
    cell_size: f32,
    origin: NVec2,
    width: usize,
    height: usize,
    cell_start: Vec<usize>,
    entries: Vec<usize>,
    // fill position per cell while sorting, kept between builds
    cursor: Vec<usize>,
    // cell of each particle, None for particles left out of the grid
    cell_of: Vec<Option<usize>>,
}

impl InteractionGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.width = 0;
        self.height = 0;
        self.cell_start.clear();
        self.entries.clear();
        self.cursor.clear();
        self.cell_of.clear();
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Bin every live particle of `view` into cells of side `cell_size`
    pub fn build(&mut self, view: &ParticleView<'_>, cell_size: f32) {
        self.clear();
        self.cell_size = cell_size;
        self.cell_of.resize(view.len(), None);
        if !(cell_size > 0.0 && cell_size.is_finite()) {
            return;
        }

        let usable = |i: usize| {
            let p = view.positions[i];
            view.is_live(i) && p.x.is_finite() && p.y.is_finite()
        };

        let mut extent: Option<(NVec2, NVec2)> = None;
        for i in (0..view.len()).filter(|&i| usable(i)) {
            let p = view.positions[i];
            extent = Some(match extent {
                Some((lo, hi)) => (lo.inf(&p), hi.sup(&p)),
                None => (p, p),
            });
        }
        let Some((min, max)) = extent else {
            return;
        };

        self.origin = min;
        let cells = |span: f32| ((span / cell_size) as usize + 1).min(MAX_CELLS_PER_AXIS);
        self.width = cells(max.x - min.x);
        self.height = cells(max.y - min.y);

        // counting sort by cell
        let n_cells = self.width * self.height;
        self.cell_start.resize(n_cells + 1, 0);
        for i in 0..view.len() {
            if usable(i) {
                let c = self.cell_index(view.positions[i]);
                self.cell_of[i] = Some(c);
                self.cell_start[c + 1] += 1;
            }
        }
        for c in 0..n_cells {
            self.cell_start[c + 1] += self.cell_start[c];
        }

        self.entries.resize(self.cell_start[n_cells], 0);
        self.cursor.extend_from_slice(&self.cell_start[..n_cells]);
        for (i, cell) in self.cell_of.iter().enumerate() {
            if let Some(c) = *cell {
                self.entries[self.cursor[c]] = i;
                self.cursor[c] += 1;
            }
        }
    }

    /// Column and row of the cell holding `p`, clamped into the grid
    pub fn cell_coords(&self, p: NVec2) -> (usize, usize) {
        let axis = |v: f32, o: f32, len: usize| {
            let k = ((v - o) / self.cell_size).floor();
            if k <= 0.0 {
                0
            } else {
                (k as usize).min(len.saturating_sub(1))
            }
        };
        (axis(p.x, self.origin.x, self.width), axis(p.y, self.origin.y, self.height))
    }

    fn cell_index(&self, p: NVec2) -> usize {
        let (cx, cy) = self.cell_coords(p);
        cy * self.width + cx
    }

    /// Particle indices stored in cell `(cx, cy)`
    pub fn cell(&self, cx: usize, cy: usize) -> &[usize] {
        if cx >= self.width || cy >= self.height {
            return &[];
        }
        let c = cy * self.width + cx;
        &self.entries[self.cell_start[c]..self.cell_start[c + 1]]
    }

    /// Candidates from the 3x3 block of cells around `(cx, cy)`
    pub fn neighbours(&self, cx: usize, cy: usize) -> impl Iterator<Item = usize> + '_ {
        let xs = cx.saturating_sub(1)..(cx + 2).min(self.width);
        let ys = cy.saturating_sub(1)..(cy + 2).min(self.height);
        ys.flat_map(move |y| xs.clone().map(move |x| (x, y)))
            .flat_map(move |(x, y)| self.cell(x, y).iter().copied())
    }

    /// Add the bounded-interaction kick to `velocities`.
    ///
    /// For each live particle `i`: `v_i += dt * R_max * sum_j dir_ij * K(d_ij / R_max, a)`
    /// with `a = matrix[type_i][type_j]`. Positions are only read, so every
    /// particle sees the same snapshot regardless of evaluation order.
    pub fn apply_interactions(
        &self,
        view: ParticleView<'_>,
        velocities: &mut [NVec2],
        matrix: &InteractionMatrix,
        law: &BoundedLaw,
        dt: f32,
    ) {
        if self.width == 0 || self.cell_of.len() != view.len() {
            return;
        }
        let r2 = law.r_max * law.r_max;
        let min_d2 = law.min_distance * law.min_distance;

        velocities.par_iter_mut().enumerate().for_each(|(i, v)| {
            let Some(c) = self.cell_of[i] else {
                return;
            };
            let xi = view.positions[i];
            let ti = view.types[i] as usize;

            let mut total = NVec2::zeros();
            for j in self.neighbours(c % self.width, c / self.width) {
                if j == i {
                    continue;
                }
                let sep = view.positions[j] - xi;
                let d2 = sep.norm_squared();
                if d2 < min_d2 || d2 >= r2 {
                    continue;
                }
                let d = d2.sqrt();
                let a = matrix.get(ti, view.types[j] as usize);
                total += sep * (law.kernel(d / law.r_max, a) / d);
            }

            *v += total * (law.r_max * dt);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view<'a>(positions: &'a [NVec2], masses: &'a [f32], types: &'a [u32], active: &'a [bool]) -> ParticleView<'a> {
        ParticleView { positions, masses, types, active }
    }

    #[test]
    fn particles_land_in_their_cells() {
        let positions = [NVec2::new(0.0, 0.0), NVec2::new(25.0, 5.0), NVec2::new(5.0, 31.0)];
        let masses = [1.0; 3];
        let types = [0; 3];
        let active = [true; 3];

        let mut grid = InteractionGrid::new();
        grid.build(&view(&positions, &masses, &types, &active), 10.0);

        assert_eq!(grid.dimensions(), (3, 4));
        assert_eq!(grid.cell(0, 0), &[0]);
        assert_eq!(grid.cell(2, 0), &[1]);
        assert_eq!(grid.cell(0, 3), &[2]);
        assert_eq!(grid.neighbours(1, 1).count(), 2);
    }

    #[test]
    fn axis_cap_clamps_outliers() {
        let positions = [NVec2::new(0.0, 0.0), NVec2::new(1.0e7, 0.0)];
        let masses = [1.0; 2];
        let types = [0; 2];
        let active = [true; 2];

        let mut grid = InteractionGrid::new();
        grid.build(&view(&positions, &masses, &types, &active), 1.0);

        assert_eq!(grid.dimensions(), (MAX_CELLS_PER_AXIS, 1));
        assert_eq!(grid.cell_coords(positions[1]), (MAX_CELLS_PER_AXIS - 1, 0));
    }

    #[test]
    fn inactive_particles_are_not_binned() {
        let positions = [NVec2::new(0.0, 0.0), NVec2::new(1.0, 1.0)];
        let masses = [1.0; 2];
        let types = [0; 2];
        let active = [true, false];

        let mut grid = InteractionGrid::new();
        grid.build(&view(&positions, &masses, &types, &active), 10.0);
        assert_eq!(grid.cell(0, 0), &[0]);
    }

    #[test]
    fn rebuild_reuses_sort_buffers() {
        let masses = [1.0; 3];
        let types = [0; 3];
        let active = [true; 3];
        let spread = [NVec2::new(0.0, 0.0), NVec2::new(25.0, 5.0), NVec2::new(5.0, 31.0)];
        let packed = [NVec2::new(0.0, 0.0), NVec2::new(12.0, 1.0), NVec2::new(3.0, 2.0)];

        let mut grid = InteractionGrid::new();
        grid.build(&view(&spread, &masses, &types, &active), 10.0);
        let capacity = grid.cursor.capacity();
        assert!(capacity >= 12);

        grid.build(&view(&packed, &masses, &types, &active), 10.0);
        assert_eq!(grid.cursor.capacity(), capacity);
        assert_eq!(grid.dimensions(), (2, 1));
        assert_eq!(grid.cell(0, 0), &[0, 2]);
        assert_eq!(grid.cell(1, 0), &[1]);
    }
}
