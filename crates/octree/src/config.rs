//! Configuration for the octree search.

use crate::error::OctreeError;

/// When the refinement loop stops subdividing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Stop the whole search once the best frontier cell has reached the
    /// minimum node size.
    StopOnMinSize,
    /// Keep refining elsewhere until the evaluation budget runs out;
    /// minimum-size cells simply stay leaves.
    RefineUntilBudget,
}

/// Configuration for an octree search.
///
/// # Example
///
/// ```
/// use poseidon_octree::OctreeConfig;
///
/// let config = OctreeConfig::new()
///     .with_init_cells([8, 8, 4])
///     .with_min_node_size(0.1)
///     .with_max_evaluations(20_000);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct OctreeConfig {
    init_cells: [usize; 3],
    min_node_size: f64,
    max_evaluations: usize,
    termination: TerminationPolicy,
    use_station_density: bool,
    frontier_capacity: usize,
    mean_cell_velocity: f64,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OctreeConfig {
    /// Creates a configuration with defaults: a 10×10×10 root lattice,
    /// 0.1 km minimum node size, 50 000 evaluations, refine until the
    /// budget, no station-density weighting, frontier capacity equal to
    /// the budget, 5 km/s mean cell velocity.
    pub fn new() -> Self {
        Self {
            init_cells: [10, 10, 10],
            min_node_size: 0.1,
            max_evaluations: 50_000,
            termination: TerminationPolicy::RefineUntilBudget,
            use_station_density: false,
            frontier_capacity: 50_000,
            mean_cell_velocity: 5.0,
        }
    }

    /// Sets the number of root cells per axis.
    pub fn with_init_cells(mut self, init_cells: [usize; 3]) -> Self {
        self.init_cells = init_cells;
        self
    }

    /// Sets the minimum node size (km, full width).
    pub fn with_min_node_size(mut self, min_node_size: f64) -> Self {
        self.min_node_size = min_node_size;
        self
    }

    /// Sets the cell-evaluation budget.
    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = max_evaluations;
        self
    }

    /// Sets the termination policy.
    pub fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }

    /// Enables or disables station-density weighting of cell priorities.
    pub fn with_station_density(mut self, use_station_density: bool) -> Self {
        self.use_station_density = use_station_density;
        self
    }

    /// Sets the frontier capacity (lowest-priority cells are evicted).
    pub fn with_frontier_capacity(mut self, frontier_capacity: usize) -> Self {
        self.frontier_capacity = frontier_capacity;
        self
    }

    /// Sets the mean cell velocity (km/s) used to convert a cell diagonal
    /// into a travel-time spread.
    pub fn with_mean_cell_velocity(mut self, mean_cell_velocity: f64) -> Self {
        self.mean_cell_velocity = mean_cell_velocity;
        self
    }

    /// Returns the root cells per axis.
    pub fn init_cells(&self) -> [usize; 3] {
        self.init_cells
    }

    /// Returns the minimum node size (km).
    pub fn min_node_size(&self) -> f64 {
        self.min_node_size
    }

    /// Returns the evaluation budget.
    pub fn max_evaluations(&self) -> usize {
        self.max_evaluations
    }

    /// Returns the termination policy.
    pub fn termination(&self) -> TerminationPolicy {
        self.termination
    }

    /// Returns whether station-density weighting is on.
    pub fn use_station_density(&self) -> bool {
        self.use_station_density
    }

    /// Returns the frontier capacity.
    pub fn frontier_capacity(&self) -> usize {
        self.frontier_capacity
    }

    /// Returns the mean cell velocity (km/s).
    pub fn mean_cell_velocity(&self) -> f64 {
        self.mean_cell_velocity
    }

    /// Validates this configuration.
    pub fn validate(&self) -> Result<(), OctreeError> {
        for (axis, &n) in self.init_cells.iter().enumerate() {
            if n == 0 {
                return Err(OctreeError::InvalidParameter {
                    name: ["init_cells_x", "init_cells_y", "init_cells_z"][axis],
                    value: 0.0,
                });
            }
        }
        if !self.min_node_size.is_finite() || self.min_node_size <= 0.0 {
            return Err(OctreeError::InvalidParameter {
                name: "min_node_size",
                value: self.min_node_size,
            });
        }
        if self.max_evaluations == 0 {
            return Err(OctreeError::InvalidParameter {
                name: "max_evaluations",
                value: 0.0,
            });
        }
        if self.frontier_capacity == 0 {
            return Err(OctreeError::InvalidParameter {
                name: "frontier_capacity",
                value: 0.0,
            });
        }
        if !self.mean_cell_velocity.is_finite() || self.mean_cell_velocity <= 0.0 {
            return Err(OctreeError::InvalidParameter {
                name: "mean_cell_velocity",
                value: self.mean_cell_velocity,
            });
        }
        Ok(())
    }
}
