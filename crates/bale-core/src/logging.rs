//! Logging setup.
//!
//! Library crates only emit `tracing` events; the binary installs the
//! subscriber. The default filter opens the bale crates up to the chosen
//! verbosity while holding dependency noise (the HTTP server, the file
//! watcher, the async runtime) at `warn`. A set `RUST_LOG` wins over the
//! verbosity flag entirely.

use tracing_subscriber::EnvFilter;

/// Workspace crates whose events the verbosity flag controls.
const BALE_TARGETS: &[&str] = &[
    "bale_core",
    "bale_resolver",
    "bale_parser",
    "bale_graph",
    "bale_bundler",
    "bale_dev",
    "bale_cli",
];

/// How much build output the binary surfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Errors only; for CI and piped output.
    Quiet,
    /// Build summaries, rebuild notices, dev-server lifecycle.
    #[default]
    Normal,
    /// Per-phase detail: resolution, discovery, chunk assignment,
    /// emission, patch computation.
    Verbose,
}

impl Verbosity {
    /// Filter directives: everything at `warn`, the bale crates at the
    /// selected level.
    fn directives(self) -> String {
        let level = match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
        };
        let mut directives = String::from("warn");
        for target in BALE_TARGETS {
            directives.push_str(&format!(",{target}={level}"));
        }
        directives
    }
}

/// Install the global subscriber for the `bale` binary.
///
/// Later calls are no-ops, so an embedder that installed its own
/// subscriber first keeps it. Verbose mode shows event targets so a
/// reader can tell which pipeline phase spoke.
pub fn init_logging(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directives()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity == Verbosity::Verbose)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}
