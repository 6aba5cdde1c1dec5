//! Diagnostic logging setup.
//!
//! Events go to stderr so that `--json` output on stdout stays parseable.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "GRADX_LOG";

const DEFAULT_DIRECTIVES: &str = "gradx_client=info,gradx=info";

fn filter(verbose: bool) -> EnvFilter {
    match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new("gradx_client=debug,gradx=debug"),
        Err(_) => EnvFilter::new(DEFAULT_DIRECTIVES),
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
