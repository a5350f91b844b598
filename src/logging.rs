//! Logging setup.
//!
//! Thin wrapper over tracing-subscriber: the CLI verbosity flags map to a
//! level filter, and `RUST_LOG` takes precedence when set.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    #[default]
    Normal,
    /// Debug and above.
    Verbose,
}

impl Verbosity {
    fn directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "fixdex=error",
            Verbosity::Normal => "fixdex=info",
            Verbosity::Verbose => "fixdex=debug",
        }
    }
}

/// Initialize the logging system. Safe to call more than once; later calls
/// are ignored.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}
