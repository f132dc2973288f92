// src/logging.rs

use tracing::Level;
use tracing_subscriber::{filter::Directive, fmt, EnvFilter};

/// Install the global subscriber: `RUST_LOG` directives plus `log_level`,
/// falling back to `info` when `log_level` does not parse.
///
/// Returns `false` when a global subscriber was already set; that one stays.
pub fn init(log_level: &str) -> bool {
    let directive: Directive = log_level
        .parse()
        .unwrap_or_else(|_| Level::INFO.into());
    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
