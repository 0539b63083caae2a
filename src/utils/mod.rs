//! Utilities: logging setup.
//!
//! Key items:
//!   init_logging / derive_level
//!
//! Logs always go to stderr; stdout carries output records only.

use tracing::Level;
use tracing_subscriber::EnvFilter;

pub mod logging {
    use super::*;

    /// Verbosity flags -> level. `--debug` and `-q` win over `-v`.
    pub fn derive_level(verbose: u8, quiet: bool, debug: bool) -> Level {
        if debug {
            return Level::DEBUG;
        }
        if quiet {
            return Level::ERROR;
        }
        match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    }

    /// Directive used when `RUST_LOG` is unset.
    pub fn default_directive(level: Level) -> String {
        format!("ghizmo={}", level.as_str().to_ascii_lowercase())
    }

    /// Install the global subscriber. `RUST_LOG` overrides the derived level.
    /// `debug` adds source locations to each line.
    pub fn init_logging(level: Level, debug: bool) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_file(debug)
            .with_line_number(debug)
            .try_init();
    }
}

pub use logging::{derive_level, init_logging};
