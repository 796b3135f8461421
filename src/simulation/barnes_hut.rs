//! # Barnes–Hut Quadtree (2D)
//!
//! Region quadtree over the live particles of a [`ParticleView`], rebuilt
//! from scratch every step and used to approximate gravity in `O(N log N)`.
//!
//! ## Layout
//!
//! - Nodes live in one flat `Vec<QuadNode>`; the four children of an internal
//!   node are pushed together, so they are addressed as `children_start + q`
//!   with `q` in `0..4` (SW, SE, NW, NE).
//! - Particle indices live in one flat buffer. Every node owns a contiguous
//!   range of it; building partitions the range of a node in place into its
//!   four quadrants and recurses (top-down bulk build, no point inserts).
//! - Positions and masses are copied next to the index buffer in tree order,
//!   so queries only touch tree-owned memory and never alias the store.
//! - `clear`/`build` keep all allocations; a steady-state step allocates nothing.
//!
//! ## Protocol
//!
//! `build` -> `compute_mass_aggregates` -> any number of `query_force` calls,
//! which may run concurrently. Aggregation is a single reverse sweep over the
//! node array: children always sit at higher indices than their parent.

use std::ops::Range;

use crate::error::TreeError;
use crate::simulation::forces::GravityLaw;
use crate::simulation::states::{NVec2, ParticleView};

pub const SW: usize = 0;
pub const SE: usize = 1;
pub const NW: usize = 2;
pub const NE: usize = 3;

/// Axis-aligned square region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: NVec2,
    pub half_dimension: f32,
}

impl Aabb {
    pub fn new(center: NVec2, half_dimension: f32) -> Self {
        Self { center, half_dimension }
    }

    /// Edge length
    pub fn size(&self) -> f32 {
        2.0 * self.half_dimension
    }

    /// Inclusive on every edge
    pub fn contains(&self, p: &NVec2) -> bool {
        (p.x - self.center.x).abs() <= self.half_dimension
            && (p.y - self.center.y).abs() <= self.half_dimension
    }

    /// Quadrant of `p` relative to the center.
    ///
    /// Bit 0 is set for east (`x >= center.x`), bit 1 for north (`y >= center.y`),
    /// giving SW = 0, SE = 1, NW = 2, NE = 3.
    #[inline]
    pub fn quadrant(&self, p: &NVec2) -> usize {
        let mut q = 0;
        if p.x >= self.center.x {
            q |= 1;
        }
        if p.y >= self.center.y {
            q |= 2;
        }
        q
    }

    /// The four equal quadrants in SW, SE, NW, NE order
    pub fn subdivide(&self) -> [Aabb; 4] {
        let h = self.half_dimension * 0.5;
        let c = self.center;
        [
            Aabb::new(NVec2::new(c.x - h, c.y - h), h),
            Aabb::new(NVec2::new(c.x + h, c.y - h), h),
            Aabb::new(NVec2::new(c.x - h, c.y + h), h),
            Aabb::new(NVec2::new(c.x + h, c.y + h), h),
        ]
    }
}

/// Subdivision limits and root sizing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeSettings {
    /// A node holding more particles than this is split (if the other limits allow)
    pub leaf_capacity: usize,
    pub max_depth: u32,
    /// Nodes with a half-dimension at or below this are never split
    pub min_node_size: f32,
    /// Root half-dimension is the particle extent times this factor
    pub growth_factor: f32,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            leaf_capacity: 8,
            max_depth: 20,
            min_node_size: 1.0,
            growth_factor: 1.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuadNode {
    pub bounds: Aabb,
    pub total_mass: f32,
    pub center_of_mass: NVec2,
    pub particle_count: usize,
    pub depth: u32,
    children_start: Option<usize>,
    start: usize,
    end: usize,
}

impl QuadNode {
    fn new(bounds: Aabb, depth: u32, range: Range<usize>) -> Self {
        Self {
            bounds,
            total_mass: 0.0,
            center_of_mass: bounds.center,
            particle_count: range.len(),
            depth,
            children_start: None,
            start: range.start,
            end: range.end,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children_start.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.particle_count == 0
    }

    /// Node indices of the four children, `None` for leaves
    pub fn children(&self) -> Option<Range<usize>> {
        self.children_start.map(|c| c..c + 4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TreeState {
    Uninitialized,
    Built,
    Aggregated,
}

#[derive(Debug, Clone)]
pub struct SpatialTree {
    settings: TreeSettings,
    nodes: Vec<QuadNode>,
    indices: Vec<usize>,
    tree_positions: Vec<NVec2>,
    tree_masses: Vec<f32>,
    state: TreeState,
    max_depth: u32,
    // leaf capacity of the last build; fuller leaves are dense
    leaf_limit: usize,
}

impl SpatialTree {
    pub fn new(settings: TreeSettings) -> Self {
        Self {
            settings,
            nodes: Vec::new(),
            indices: Vec::new(),
            tree_positions: Vec::new(),
            tree_masses: Vec::new(),
            state: TreeState::Uninitialized,
            max_depth: 0,
            leaf_limit: settings.leaf_capacity,
        }
    }

    pub fn settings(&self) -> &TreeSettings {
        &self.settings
    }

    /// Takes effect on the next build
    pub fn set_settings(&mut self, settings: TreeSettings) {
        self.settings = settings;
    }

    /// Drop all nodes and return to the uninitialized state, keeping allocations
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.indices.clear();
        self.tree_positions.clear();
        self.tree_masses.clear();
        self.state = TreeState::Uninitialized;
        self.max_depth = 0;
    }

    /// Rebuild the tree over every live particle of `view`.
    ///
    /// With no live particles, or when they all sit on one point, the tree is
    /// left empty and every query returns zero.
    pub fn build(&mut self, view: &ParticleView<'_>) {
        self.clear();
        self.state = TreeState::Built;
        self.leaf_limit = self.settings.leaf_capacity;

        let positions = view.positions;
        self.indices.extend((0..view.len()).filter(|&i| {
            view.is_live(i) && positions[i].x.is_finite() && positions[i].y.is_finite()
        }));
        if self.indices.is_empty() {
            return;
        }

        let Some(root) = self.root_bounds(positions) else {
            self.indices.clear();
            return;
        };

        self.nodes.push(QuadNode::new(root, 0, 0..self.indices.len()));
        self.build_node(0, positions);

        self.tree_positions.extend(self.indices.iter().map(|&i| positions[i]));
        self.tree_masses.extend(self.indices.iter().map(|&i| view.masses[i]));
    }

    // Square covering all indexed particles, grown by `growth_factor`
    fn root_bounds(&self, positions: &[NVec2]) -> Option<Aabb> {
        let first = positions[self.indices[0]];
        let (min, max) = self.indices.iter().fold((first, first), |(lo, hi), &i| {
            let p = positions[i];
            (lo.inf(&p), hi.sup(&p))
        });

        let center = (min + max) * 0.5;
        let half = (max.x - center.x).max(max.y - center.y) * self.settings.growth_factor;
        if !half.is_finite() {
            log::warn!("particle extent is not finite, skipping tree build");
            None
        } else if half > 0.0 {
            Some(Aabb::new(center, half))
        } else {
            log::debug!("all particles coincide, skipping tree build");
            None
        }
    }

    fn build_node(&mut self, node_idx: usize, positions: &[NVec2]) {
        let (bounds, depth, start, end) = {
            let n = &self.nodes[node_idx];
            (n.bounds, n.depth, n.start, n.end)
        };
        self.max_depth = self.max_depth.max(depth);

        let s = &self.settings;
        if end - start <= s.leaf_capacity
            || depth >= s.max_depth
            || bounds.half_dimension <= s.min_node_size
        {
            return;
        }

        // Split the range south | north, then each half west | east
        let c = bounds.center;
        let range = &mut self.indices[start..end];
        let south = partition(range, |i| positions[i].y < c.y);
        let (south_part, north_part) = range.split_at_mut(south);
        let sw = partition(south_part, |i| positions[i].x < c.x);
        let nw = partition(north_part, |i| positions[i].x < c.x);

        let cuts = [start, start + sw, start + south, start + south + nw, end];
        let quads = bounds.subdivide();

        let first_child = self.nodes.len();
        for q in 0..4 {
            self.nodes.push(QuadNode::new(quads[q], depth + 1, cuts[q]..cuts[q + 1]));
        }
        self.nodes[node_idx].children_start = Some(first_child);

        for child in first_child..first_child + 4 {
            if !self.nodes[child].is_empty() {
                self.build_node(child, positions);
            }
        }
    }

    /// Fill total mass, center of mass and particle count of every node,
    /// leaves from their particles and internal nodes from their four children.
    pub fn compute_mass_aggregates(&mut self) -> Result<(), TreeError> {
        if self.state == TreeState::Uninitialized {
            return Err(TreeError::NotBuilt);
        }

        for idx in (0..self.nodes.len()).rev() {
            let (mass, weighted, count) = match self.nodes[idx].children_start {
                None => {
                    let (start, end) = (self.nodes[idx].start, self.nodes[idx].end);
                    let mut mass = 0.0f32;
                    let mut weighted = NVec2::zeros();
                    for k in start..end {
                        mass += self.tree_masses[k];
                        weighted += self.tree_positions[k] * self.tree_masses[k];
                    }
                    (mass, weighted, end - start)
                }
                Some(first) => self.nodes[first..first + 4].iter().fold(
                    (0.0f32, NVec2::zeros(), 0usize),
                    |(m, w, n), child| {
                        (
                            m + child.total_mass,
                            w + child.center_of_mass * child.total_mass,
                            n + child.particle_count,
                        )
                    },
                ),
            };

            let node = &mut self.nodes[idx];
            node.total_mass = mass;
            node.particle_count = count;
            node.center_of_mass = if mass > 0.0 { weighted / mass } else { node.bounds.center };
        }

        self.state = TreeState::Aggregated;
        Ok(())
    }

    /// Approximate gravitational force on a body of `mass` at `position`.
    ///
    /// Any node, leaf or not, is replaced by its center of mass when
    /// `size / d < theta`. Opened leaves within `leaf_capacity` are summed
    /// particle by particle; denser leaves count as one point mass without the
    /// querying body. Any source closer than `law.min_distance` is skipped,
    /// which is what keeps a particle from pulling on itself. Returns zero
    /// before aggregation or for an empty tree.
    pub fn query_force(&self, position: NVec2, mass: f32, law: &GravityLaw) -> NVec2 {
        let mut force = NVec2::zeros();
        if self.state != TreeState::Aggregated || self.nodes.is_empty() {
            return force;
        }
        self.traverse_node(0, position, mass, law, &mut force);
        force
    }

    fn traverse_node(&self, node_idx: usize, pos: NVec2, mass: f32, law: &GravityLaw, force: &mut NVec2) {
        let node = &self.nodes[node_idx];
        if node.particle_count == 0 {
            return;
        }

        let sep = node.center_of_mass - pos;
        let d2 = sep.norm_squared();
        let size = node.bounds.size();

        // size / d < theta, compared squared to avoid the sqrt
        if d2 >= law.min_distance_sqr() && size * size < law.theta * law.theta * d2 {
            *force += law.pair_force(sep, d2, node.total_mass, mass);
            return;
        }

        match node.children_start {
            Some(first_child) => {
                for child in first_child..first_child + 4 {
                    self.traverse_node(child, pos, mass, law, force);
                }
            }
            None if node.particle_count <= self.leaf_limit => {
                for k in node.start..node.end {
                    let sep = self.tree_positions[k] - pos;
                    let d2 = sep.norm_squared();
                    if d2 >= law.min_distance_sqr() {
                        *force += law.pair_force(sep, d2, self.tree_masses[k], mass);
                    }
                }
            }
            None => self.dense_leaf_force(node, pos, mass, law, force),
        }
    }

    // Leaves stopped by `max_depth` or `min_node_size` can hold any number of
    // particles. They act as one point mass; a query from inside the leaf is
    // taken to be one of its particles and is removed from the aggregate.
    fn dense_leaf_force(&self, node: &QuadNode, pos: NVec2, mass: f32, law: &GravityLaw, force: &mut NVec2) {
        let (mut source_mass, mut center) = (node.total_mass, node.center_of_mass);
        if node.bounds.contains(&pos) {
            let rest = source_mass - mass;
            if rest <= 0.0 {
                return;
            }
            center = (center * source_mass - pos * mass) / rest;
            source_mass = rest;
        }

        let sep = center - pos;
        let d2 = sep.norm_squared();
        if d2 >= law.min_distance_sqr() {
            *force += law.pair_force(sep, d2, source_mass, mass);
        }
    }

    // debug / visualization ================================================================

    pub fn is_built(&self) -> bool {
        self.state != TreeState::Uninitialized
    }

    pub fn nodes(&self) -> &[QuadNode] {
        &self.nodes
    }

    pub fn root(&self) -> Option<&QuadNode> {
        self.nodes.first()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Deepest node level reached by the last build (root = 0)
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn node_bounds(&self) -> impl Iterator<Item = Aabb> + '_ {
        self.nodes.iter().map(|n| n.bounds)
    }

    /// `(center_of_mass, total_mass)` of every non-empty internal node
    pub fn mass_centers(&self) -> impl Iterator<Item = (NVec2, f32)> + '_ {
        self.nodes
            .iter()
            .filter(|n| !n.is_leaf() && n.particle_count > 0)
            .map(|n| (n.center_of_mass, n.total_mass))
    }

    /// Particle indices stored directly in node `node_idx` (empty for internal nodes)
    pub fn leaf_particles(&self, node_idx: usize) -> &[usize] {
        match self.nodes.get(node_idx) {
            Some(n) if n.is_leaf() => &self.indices[n.start..n.end],
            _ => &[],
        }
    }
}

impl Default for SpatialTree {
    fn default() -> Self {
        Self::new(TreeSettings::default())
    }
}

/// Reorder `items` so every element satisfying `pred` comes first; returns their count
fn partition(items: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut split = 0;
    for k in 0..items.len() {
        if pred(items[k]) {
            items.swap(split, k);
            split += 1;
        }
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_moves_matches_to_front() {
        let mut items = vec![5, 2, 8, 1, 9, 4];
        let n = partition(&mut items, |i| i < 5);
        assert_eq!(n, 3);
        assert!(items[..n].iter().all(|&i| i < 5));
        assert!(items[n..].iter().all(|&i| i >= 5));
    }

    #[test]
    fn quadrant_matches_subdivide_order() {
        let b = Aabb::new(NVec2::new(1.0, -1.0), 4.0);
        let quads = b.subdivide();
        for (q, child) in quads.iter().enumerate() {
            assert_eq!(b.quadrant(&child.center), q);
            assert_eq!(child.half_dimension, 2.0);
        }
        assert_eq!(b.quadrant(&NVec2::new(0.0, -2.0)), SW);
        assert_eq!(b.quadrant(&NVec2::new(1.0, -1.0)), NE);
    }
}
