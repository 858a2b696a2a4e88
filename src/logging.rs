use tracing_subscriber::EnvFilter;

/// Workspace crates whose `tracing` output the default filter admits.
const CRATE_TARGETS: &[&str] = &[
    "poseidon",
    "poseidon_event",
    "poseidon_misfit",
    "poseidon_grid",
    "poseidon_metropolis",
    "poseidon_octree",
    "poseidon_scatter",
    "poseidon_locate",
];

/// Sets up the tracing subscriber from the `-v` count: no flag logs
/// warnings only, then info, debug, and trace as flags stack up.
///
/// A set `RUST_LOG` takes precedence over the flag entirely.
pub fn init(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let default_filter: String = CRATE_TARGETS
        .iter()
        .map(|t| format!("{t}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
