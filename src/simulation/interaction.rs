//! Pairwise interaction coefficients between particle types.

use rand::Rng;

use crate::error::ConfigError;

/// K x K matrix where `get(i, j)` is how strongly type `i` is pulled towards
/// type `j` (negative values repel). Not required to be symmetric.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionMatrix {
    size: usize,
    strengths: Vec<f32>,
}

impl InteractionMatrix {
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            strengths: vec![0.0; size * size],
        }
    }

    /// Matrix with every entry drawn uniformly from [-1, 1]
    pub fn random<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Self {
        let mut matrix = Self::zeros(size);
        matrix.randomize(rng);
        matrix
    }

    /// Build from explicit rows; every row must have one entry per row
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, ConfigError> {
        let size = rows.len();
        let mut matrix = Self::zeros(size);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(ConfigError::Invalid(format!(
                    "interaction row {i} has {} entries, expected {size}",
                    row.len()
                )));
            }
            matrix.strengths[i * size..(i + 1) * size].copy_from_slice(row);
        }
        Ok(matrix)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Strength of type `i` towards type `j`; 0.0 when either index is out of range
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        if i < self.size && j < self.size {
            self.strengths[i * self.size + j]
        } else {
            0.0
        }
    }

    /// Returns false (and changes nothing) for out-of-range indices
    pub fn set(&mut self, i: usize, j: usize, value: f32) -> bool {
        if i >= self.size || j >= self.size {
            log::debug!("ignoring interaction ({i}, {j}) outside {0}x{0} matrix", self.size);
            return false;
        }
        self.strengths[i * self.size + j] = value;
        true
    }

    pub fn row(&self, i: usize) -> &[f32] {
        if i < self.size {
            &self.strengths[i * self.size..(i + 1) * self.size]
        } else {
            &[]
        }
    }

    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for s in &mut self.strengths {
            *s = rng.random_range(-1.0f32..=1.0);
        }
    }

    /// Re-create as a random `size` x `size` matrix
    pub fn resize<R: Rng + ?Sized>(&mut self, size: usize, rng: &mut R) {
        *self = Self::random(size, rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_entries_stay_in_unit_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = InteractionMatrix::random(6, &mut rng);
        assert_eq!(m.size(), 6);
        for i in 0..6 {
            assert!(m.row(i).iter().all(|v| (-1.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn out_of_range_access_is_neutral() {
        let mut m = InteractionMatrix::zeros(2);
        assert!(!m.set(2, 0, 1.0));
        assert_eq!(m.get(5, 1), 0.0);
        assert!(m.row(3).is_empty());
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let rows = vec![vec![1.0, 0.5], vec![0.0]];
        assert!(InteractionMatrix::from_rows(&rows).is_err());
    }
}
