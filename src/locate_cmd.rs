//! Locate command: run one location from a TOML run file.

use anyhow::{bail, Context, Result};
use tracing::{info, info_span};

use poseidon_event::CancelFlag;
use poseidon_locate::{locate, Located};

use crate::cli::LocateArgs;
use crate::config::RunConfig;
use crate::convert;

/// Run the location pipeline.
pub fn run(args: LocateArgs) -> Result<()> {
    let _cmd = info_span!("locate").entered();

    // 1. Load the run TOML
    let toml_str = std::fs::read_to_string(&args.config)
        .with_context(|| format!("failed to read run file: {}", args.config.display()))?;
    let config: RunConfig = toml::from_str(&toml_str).context("failed to parse TOML run file")?;

    // 2. Build inputs
    let region = convert::build_region(&config.region)?;
    let model = convert::build_model(&config.model)?;
    let stations = convert::build_stations(&config.stations)?;
    let arrivals = convert::build_arrivals(&config.arrivals, &stations)?;
    let locate_config = convert::build_locate_config(&config, args.seed)?;

    if stations.is_empty() {
        bail!("no stations: add [[stations]] tables to the run file");
    }
    if arrivals.is_empty() {
        bail!("no arrivals: add [[arrivals]] tables to the run file");
    }
    info!(
        n_stations = stations.len(),
        n_arrivals = arrivals.len(),
        strategy = locate_config.strategy().name(),
        method = locate_config.method().name(),
        "starting location"
    );

    // 3. Locate
    let located = locate(
        &region,
        &locate_config,
        &model,
        &stations,
        arrivals,
        &CancelFlag::new(),
    )
    .context("location failed")?;

    print_summary(&located);

    // 4. Optional JSON outputs
    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&located.hypocenter)
            .context("failed to serialize hypocenter")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write hypocenter: {}", path.display()))?;
        info!(path = %path.display(), "hypocenter written");
    }
    if let Some(path) = &args.scatter {
        let json = serde_json::to_string(&located.scatter)
            .context("failed to serialize scatter cloud")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write scatter cloud: {}", path.display()))?;
        info!(path = %path.display(), n_points = located.scatter.len(), "scatter written");
    }

    Ok(())
}

fn print_summary(located: &Located) {
    let hypo = &located.hypocenter;
    println!(
        "hypocenter  x {:9.3} km  y {:9.3} km  z {:7.3} km",
        hypo.point.x, hypo.point.y, hypo.point.z
    );
    println!(
        "origin time {:.3} s  (var {:.4} s²)",
        hypo.origin_time, hypo.origin_time_var
    );
    println!(
        "quality     rms {:.3} s  gap {:.0}°/{:.0}°  used {}/{}",
        hypo.quality.rms,
        hypo.quality.azimuth_gap,
        hypo.quality.secondary_azimuth_gap,
        hypo.quality.n_used,
        hypo.quality.n_arrivals
    );
    if let Some(ell) = &hypo.ellipsoid {
        println!(
            "ellipsoid   semi-axes {:.2} / {:.2} / {:.2} km",
            ell.semi_axes[0], ell.semi_axes[1], ell.semi_axes[2]
        );
    }
    println!(
        "search      {} ({} evaluations{}{})",
        hypo.diagnostics.strategy,
        hypo.diagnostics.n_evaluated,
        if hypo.diagnostics.low_confidence {
            ", low confidence"
        } else {
            ""
        },
        if hypo.diagnostics.cancelled {
            ", cancelled"
        } else {
            ""
        }
    );
    for (station, phase, stats) in located.station_stats.iter() {
        println!(
            "residual    {station:<8} {phase:<4} mean {:+.3} s  sd {:.3} s  n {}",
            stats.mean(),
            stats.std_dev(),
            stats.count
        );
    }
}
