use serde::Deserialize;

/// Top-level Poseidon run configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Global RNG seed.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Statistical method name ("gau_analytic", "edt", ...).
    #[serde(default = "default_method")]
    pub method: String,

    /// Velocity model settings.
    pub model: ModelToml,

    /// Search region.
    pub region: RegionToml,

    /// Gaussian error-model settings.
    #[serde(default)]
    pub gaussian: GaussianToml,

    /// Search strategy settings.
    #[serde(default)]
    pub search: SearchToml,

    /// Recording stations.
    #[serde(default)]
    pub stations: Vec<StationToml>,

    /// Phase arrivals.
    #[serde(default)]
    pub arrivals: Vec<ArrivalToml>,
}

fn default_method() -> String {
    "gau_analytic".to_string()
}

/// Constant-velocity model parameters.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelToml {
    /// P-wave velocity (km/s).
    pub vp: f64,
    /// S-wave velocity (km/s); derived from vp when omitted.
    #[serde(default)]
    pub vs: Option<f64>,
    /// vp/vs ratio used when `vs` is omitted.
    #[serde(default = "default_vp_vs_ratio")]
    pub vp_vs_ratio: f64,
}

fn default_vp_vs_ratio() -> f64 {
    1.73
}

/// Search region as minimum corner plus extent (km).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionToml {
    pub origin: [f64; 3],
    pub extent: [f64; 3],
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GaussianToml {
    #[serde(default = "default_sigma_time")]
    pub sigma_time: f64,
    #[serde(default)]
    pub corr_len: f64,
    #[serde(default = "default_min_arrivals")]
    pub min_arrivals: usize,
    #[serde(default)]
    pub travel_time_error: Option<TravelTimeErrorToml>,
}

impl Default for GaussianToml {
    fn default() -> Self {
        Self {
            sigma_time: default_sigma_time(),
            corr_len: 0.0,
            min_arrivals: default_min_arrivals(),
            travel_time_error: None,
        }
    }
}

fn default_sigma_time() -> f64 {
    0.2
}
fn default_min_arrivals() -> usize {
    4
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TravelTimeErrorToml {
    pub fraction: f64,
    #[serde(default)]
    pub min: f64,
    #[serde(default = "default_tte_max")]
    pub max: f64,
}

fn default_tte_max() -> f64 {
    f64::INFINITY
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchToml {
    /// Strategy name: "grid", "metropolis", or "octree".
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_n_scatter")]
    pub n_scatter: usize,
    #[serde(default)]
    pub grid: GridToml,
    #[serde(default)]
    pub metropolis: MetropolisToml,
    #[serde(default)]
    pub octree: OctreeToml,
}

impl Default for SearchToml {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            n_scatter: default_n_scatter(),
            grid: GridToml::default(),
            metropolis: MetropolisToml::default(),
            octree: OctreeToml::default(),
        }
    }
}

fn default_strategy() -> String {
    "octree".to_string()
}
fn default_n_scatter() -> usize {
    1000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridToml {
    #[serde(default = "default_spacing")]
    pub spacing: f64,
}

impl Default for GridToml {
    fn default() -> Self {
        Self {
            spacing: default_spacing(),
        }
    }
}

fn default_spacing() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetropolisToml {
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,
    #[serde(default)]
    pub n_learn: Option<usize>,
    #[serde(default)]
    pub n_equilibrate: Option<usize>,
    #[serde(default)]
    pub step_init: Option<f64>,
    #[serde(default = "default_temperature")]
    pub initial_temperature: f64,
}

impl Default for MetropolisToml {
    fn default() -> Self {
        Self {
            n_samples: default_n_samples(),
            n_learn: None,
            n_equilibrate: None,
            step_init: None,
            initial_temperature: default_temperature(),
        }
    }
}

fn default_n_samples() -> usize {
    20_000
}
fn default_temperature() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OctreeToml {
    #[serde(default = "default_init_cells")]
    pub init_cells: [usize; 3],
    #[serde(default = "default_min_node_size")]
    pub min_node_size: f64,
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: usize,
    #[serde(default)]
    pub stop_on_min_size: bool,
    #[serde(default)]
    pub use_station_density: bool,
    #[serde(default = "default_mean_cell_velocity")]
    pub mean_cell_velocity: f64,
}

impl Default for OctreeToml {
    fn default() -> Self {
        Self {
            init_cells: default_init_cells(),
            min_node_size: default_min_node_size(),
            max_evaluations: default_max_evaluations(),
            stop_on_min_size: false,
            use_station_density: false,
            mean_cell_velocity: default_mean_cell_velocity(),
        }
    }
}

fn default_init_cells() -> [usize; 3] {
    [10, 10, 10]
}
fn default_min_node_size() -> f64 {
    0.1
}
fn default_max_evaluations() -> usize {
    50_000
}
fn default_mean_cell_velocity() -> f64 {
    5.0
}

/// One station row.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationToml {
    pub label: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// One arrival row.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArrivalToml {
    pub station: String,
    #[serde(default = "default_phase")]
    pub phase: String,
    pub time: f64,
    #[serde(default = "default_arrival_sigma")]
    pub sigma: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_phase() -> String {
    "P".to_string()
}
fn default_arrival_sigma() -> f64 {
    0.1
}
fn default_weight() -> f64 {
    1.0
}
