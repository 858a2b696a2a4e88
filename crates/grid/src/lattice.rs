//! Regular 3D search lattices.

use poseidon_event::{Point3, SearchRegion};

use crate::error::GridError;

/// A regular 3D lattice of candidate locations.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    origin: Point3,
    spacing: [f64; 3],
    counts: [usize; 3],
}

impl Lattice {
    /// Creates a lattice from its first node, per-axis spacing (km), and
    /// per-axis node counts.
    ///
    /// # Errors
    ///
    /// Returns an error for zero counts or non-positive spacing.
    pub fn new(origin: Point3, spacing: [f64; 3], counts: [usize; 3]) -> Result<Self, GridError> {
        for (axis, &c) in counts.iter().enumerate() {
            if c == 0 {
                return Err(GridError::ZeroNodes { axis });
            }
        }
        for (axis, &s) in spacing.iter().enumerate() {
            if !s.is_finite() || s <= 0.0 {
                return Err(GridError::InvalidSpacing { axis, spacing: s });
            }
        }
        Ok(Self {
            origin,
            spacing,
            counts,
        })
    }

    /// Creates a lattice covering a search region with approximately the
    /// given spacing, node-centered within the region.
    pub fn covering(region: &SearchRegion, spacing: f64) -> Result<Self, GridError> {
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(GridError::InvalidSpacing { axis: 0, spacing });
        }
        let extent = region.extent();
        let mut counts = [0usize; 3];
        let mut spacings = [spacing; 3];
        let mut origin = [region.origin().x, region.origin().y, region.origin().z];
        for axis in 0..3 {
            let n = (extent[axis] / spacing).floor().max(1.0) as usize;
            counts[axis] = n;
            spacings[axis] = spacing;
            // Center the lattice in the region.
            origin[axis] += (extent[axis] - (n - 1) as f64 * spacing) / 2.0;
        }
        Self::new(Point3::new(origin[0], origin[1], origin[2]), spacings, counts)
    }

    /// Returns the first node.
    pub fn origin(&self) -> Point3 {
        self.origin
    }

    /// Returns the per-axis spacing (km).
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// Returns the per-axis node counts.
    pub fn counts(&self) -> [usize; 3] {
        self.counts
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.counts[0] * self.counts[1] * self.counts[2]
    }

    /// True if the lattice has no nodes (construction forbids this).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Volume represented by one node (km³).
    pub fn node_volume(&self) -> f64 {
        self.spacing[0] * self.spacing[1] * self.spacing[2]
    }

    /// The node at per-axis indices (i, j, k).
    pub fn node(&self, i: usize, j: usize, k: usize) -> Point3 {
        Point3::new(
            self.origin.x + i as f64 * self.spacing[0],
            self.origin.y + j as f64 * self.spacing[1],
            self.origin.z + k as f64 * self.spacing[2],
        )
    }

    /// The node for a flat index in x-major / z-fastest order.
    pub fn node_at(&self, flat: usize) -> Point3 {
        let nz = self.counts[2];
        let ny = self.counts[1];
        let k = flat % nz;
        let j = (flat / nz) % ny;
        let i = flat / (nz * ny);
        self.node(i, j, k)
    }

    /// Iterates all nodes with their flat index, z varying fastest.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (usize, Point3)> + '_ {
        (0..self.len()).map(move |flat| (flat, self.node_at(flat)))
    }
}
