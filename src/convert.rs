//! Pure conversion functions: TOML config structs -> crate API config types.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};

use poseidon_event::{Arrival, HomogeneousModel, Point3, SearchRegion, Station};
use poseidon_locate::{LocateConfig, SearchStrategy};
use poseidon_metropolis::MetropolisConfig;
use poseidon_misfit::{GaussianParams, Method, TravelTimeError};
use poseidon_octree::{OctreeConfig, TerminationPolicy};

use crate::config::*;

/// Builds the search region from its TOML block.
pub fn build_region(toml: &RegionToml) -> Result<SearchRegion> {
    let origin = Point3::new(toml.origin[0], toml.origin[1], toml.origin[2]);
    SearchRegion::new(origin, toml.extent).context("invalid [region]")
}

/// Builds the constant-velocity model from its TOML block.
pub fn build_model(toml: &ModelToml) -> Result<HomogeneousModel> {
    if !toml.vp.is_finite() || toml.vp <= 0.0 {
        bail!("invalid [model].vp: {}", toml.vp);
    }
    Ok(match toml.vs {
        Some(vs) => HomogeneousModel::new(toml.vp, vs),
        None => HomogeneousModel::from_vp_vs_ratio(toml.vp, toml.vp_vs_ratio)?,
    })
}

/// Builds the station map, rejecting duplicate labels.
pub fn build_stations(rows: &[StationToml]) -> Result<BTreeMap<String, Station>> {
    let mut stations = BTreeMap::new();
    for row in rows {
        let station = Station::new(row.label.clone(), row.x, row.y, row.z);
        station.validate()?;
        if stations.insert(row.label.clone(), station).is_some() {
            bail!("duplicate station label: {:?}", row.label);
        }
    }
    Ok(stations)
}

/// Builds the arrival list, checking station references.
pub fn build_arrivals(
    rows: &[ArrivalToml],
    stations: &BTreeMap<String, Station>,
) -> Result<Vec<Arrival>> {
    let mut arrivals = Vec::with_capacity(rows.len());
    for row in rows {
        if !stations.contains_key(&row.station) {
            bail!(
                "arrival references unknown station {:?} (phase {:?})",
                row.station,
                row.phase
            );
        }
        let arrival = Arrival::new(row.station.clone(), &row.phase, row.time, row.sigma)?
            .with_prior_weight(row.weight)?;
        arrivals.push(arrival);
    }
    Ok(arrivals)
}

/// Builds the Gaussian error-model parameters from their TOML block.
pub fn build_gaussian(toml: &GaussianToml) -> GaussianParams {
    let mut params = GaussianParams::new(toml.sigma_time)
        .with_corr_len(toml.corr_len)
        .with_min_arrivals(toml.min_arrivals);
    if let Some(tte) = &toml.travel_time_error {
        params = params.with_travel_time_error(TravelTimeError {
            fraction: tte.fraction,
            min: tte.min,
            max: tte.max,
        });
    }
    params
}

/// Builds the full run configuration: method, Gaussian parameters, and the
/// selected search strategy.
pub fn build_locate_config(config: &RunConfig, seed_override: Option<u64>) -> Result<LocateConfig> {
    let method: Method = config
        .method
        .parse()
        .with_context(|| format!("invalid method {:?}", config.method))?;

    let strategy = match config.search.strategy.to_lowercase().as_str() {
        "grid" => SearchStrategy::Grid {
            spacing: config.search.grid.spacing,
        },
        "metropolis" => {
            let m = &config.search.metropolis;
            let mut cfg = MetropolisConfig::new(m.n_samples)
                .with_initial_temperature(m.initial_temperature);
            if let Some(n_learn) = m.n_learn {
                cfg = cfg.with_learn(n_learn);
            }
            if let Some(n_equilibrate) = m.n_equilibrate {
                cfg = cfg.with_equilibrate(n_equilibrate);
            }
            if let Some(step_init) = m.step_init {
                cfg = cfg.with_step_init(step_init);
            }
            SearchStrategy::Metropolis(cfg)
        }
        "octree" => {
            let o = &config.search.octree;
            let termination = if o.stop_on_min_size {
                TerminationPolicy::StopOnMinSize
            } else {
                TerminationPolicy::RefineUntilBudget
            };
            SearchStrategy::Octree(
                OctreeConfig::new()
                    .with_init_cells(o.init_cells)
                    .with_min_node_size(o.min_node_size)
                    .with_max_evaluations(o.max_evaluations)
                    .with_termination(termination)
                    .with_station_density(o.use_station_density)
                    .with_mean_cell_velocity(o.mean_cell_velocity),
            )
        }
        other => bail!("unknown search strategy: {other:?}"),
    };

    let seed = seed_override.or(config.seed).unwrap_or(0);
    let locate_config = LocateConfig::new(method, build_gaussian(&config.gaussian), strategy)
        .with_n_scatter(config.search.n_scatter)
        .with_seed(seed);
    locate_config.validate()?;
    Ok(locate_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> RunConfig {
        toml::from_str(
            r#"
            [model]
            vp = 6.0

            [region]
            origin = [-20.0, -20.0, 0.0]
            extent = [40.0, 40.0, 20.0]
        "#,
        )
        .unwrap()
    }

    #[test]
    fn builds_defaults() {
        let config = minimal();
        assert!(build_region(&config.region).is_ok());
        assert!(build_model(&config.model).is_ok());
        let locate = build_locate_config(&config, None).unwrap();
        assert_eq!(locate.strategy().name(), "octree");
        assert_eq!(locate.seed(), 0);
    }

    #[test]
    fn seed_override_wins() {
        let mut config = minimal();
        config.seed = Some(3);
        let locate = build_locate_config(&config, Some(99)).unwrap();
        assert_eq!(locate.seed(), 99);
    }

    #[test]
    fn model_without_vs_uses_the_ratio() {
        let mut config = minimal();
        config.model.vp_vs_ratio = 1.5;
        let model = build_model(&config.model).unwrap();
        assert_eq!(model.vs(), 4.0);

        config.model.vp_vs_ratio = 0.0;
        assert!(build_model(&config.model).is_err());
    }

    #[test]
    fn rejects_bad_inputs() {
        let mut config = minimal();
        config.method = "least_squares".to_string();
        assert!(build_locate_config(&config, None).is_err());

        let mut config = minimal();
        config.search.strategy = "annealing".to_string();
        assert!(build_locate_config(&config, None).is_err());

        let mut config = minimal();
        config.model.vp = -1.0;
        assert!(build_model(&config.model).is_err());
    }

    #[test]
    fn arrivals_must_reference_known_stations() {
        let stations = build_stations(&[StationToml {
            label: "NE".to_string(),
            x: 30.0,
            y: 30.0,
            z: 0.0,
        }])
        .unwrap();
        let rows = [ArrivalToml {
            station: "XX".to_string(),
            phase: "P".to_string(),
            time: 100.0,
            sigma: 0.1,
            weight: 1.0,
        }];
        assert!(build_arrivals(&rows, &stations).is_err());
    }

    #[test]
    fn duplicate_stations_are_rejected() {
        let row = |label: &str| StationToml {
            label: label.to_string(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };
        assert!(build_stations(&[row("A"), row("A")]).is_err());
    }
}
