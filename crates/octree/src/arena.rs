//! Cell storage.
//!
//! Cells live in a flat `Vec` and refer to each other through [`CellId`]
//! handles; the tree has no owning references, so subdivision never fights
//! the borrow checker and the whole structure drops in one free.

use poseidon_event::Point3;

/// Handle to a cell in a [`CellArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(usize);

impl CellId {
    /// Index into the arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One axis-aligned cell of the octree.
#[derive(Debug, Clone)]
pub struct OctCell {
    /// Cell center.
    pub center: Point3,
    /// Half widths per axis (km).
    pub half_widths: [f64; 3],
    /// Log likelihood evaluated at the center; NaN until evaluated.
    pub log_value: f64,
    /// Parent cell, `None` for root-lattice cells.
    pub parent: Option<CellId>,
    /// Child octants once subdivided.
    pub children: Option<[CellId; 8]>,
}

impl OctCell {
    /// Cell volume (km³).
    pub fn volume(&self) -> f64 {
        8.0 * self.half_widths[0] * self.half_widths[1] * self.half_widths[2]
    }

    /// Log of the cell volume.
    pub fn log_volume(&self) -> f64 {
        self.volume().ln()
    }

    /// Full-space diagonal of the cell (km).
    pub fn diagonal(&self) -> f64 {
        let [hx, hy, hz] = self.half_widths;
        2.0 * (hx * hx + hy * hy + hz * hz).sqrt()
    }

    /// Largest full width over the three axes (km).
    pub fn max_width(&self) -> f64 {
        2.0 * self.half_widths.iter().cloned().fold(0.0, f64::max)
    }

    /// True while the cell has not been subdivided.
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// True if `point` lies inside the cell (half-open on the high side).
    pub fn contains(&self, point: &Point3) -> bool {
        (point.x - self.center.x).abs() < self.half_widths[0]
            && (point.y - self.center.y).abs() < self.half_widths[1]
            && (point.z - self.center.z).abs() < self.half_widths[2]
    }
}

/// Flat arena owning every cell of one search.
#[derive(Debug, Default)]
pub struct CellArena {
    cells: Vec<OctCell>,
}

impl CellArena {
    /// Creates an empty arena with room for `capacity` cells.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    /// Number of cells allocated.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when no cells have been allocated.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Allocates a fresh, unevaluated cell.
    pub fn alloc(
        &mut self,
        center: Point3,
        half_widths: [f64; 3],
        parent: Option<CellId>,
    ) -> CellId {
        let id = CellId(self.cells.len());
        self.cells.push(OctCell {
            center,
            half_widths,
            log_value: f64::NAN,
            parent,
            children: None,
        });
        id
    }

    /// Borrows a cell.
    pub fn get(&self, id: CellId) -> &OctCell {
        &self.cells[id.0]
    }

    /// Mutably borrows a cell.
    pub fn get_mut(&mut self, id: CellId) -> &mut OctCell {
        &mut self.cells[id.0]
    }

    /// Splits `id` into eight exactly-tiling octants and returns their
    /// handles. The parent keeps its evaluation but stops being a leaf.
    pub fn subdivide(&mut self, id: CellId) -> [CellId; 8] {
        let (center, half) = {
            let cell = self.get(id);
            debug_assert!(cell.is_leaf());
            (cell.center, cell.half_widths)
        };
        let child_half = [half[0] / 2.0, half[1] / 2.0, half[2] / 2.0];
        let mut children = [CellId(0); 8];
        for (octant, child) in children.iter_mut().enumerate() {
            let sx = if octant & 1 == 0 { -1.0 } else { 1.0 };
            let sy = if octant & 2 == 0 { -1.0 } else { 1.0 };
            let sz = if octant & 4 == 0 { -1.0 } else { 1.0 };
            let child_center = Point3::new(
                center.x + sx * child_half[0],
                center.y + sy * child_half[1],
                center.z + sz * child_half[2],
            );
            *child = self.alloc(child_center, child_half, Some(id));
        }
        self.get_mut(id).children = Some(children);
        children
    }

    /// Iterates over all (id, cell) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (CellId, &OctCell)> {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, cell)| (CellId(i), cell))
    }

    /// Iterates over the leaf cells.
    pub fn leaves(&self) -> impl Iterator<Item = (CellId, &OctCell)> {
        self.iter().filter(|(_, cell)| cell.is_leaf())
    }
}
