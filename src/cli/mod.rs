//! Command-line front end
//!
//! `main.rs` only parses arguments; the logic for each subcommand lives in
//! [`commands`], authentication in [`auth`].

pub mod auth;
pub mod commands;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingSettings;

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins; otherwise the configured level, raised to `debug` by
/// `--verbose` or `logging.verbose`.
pub fn init_logging(logging: &LoggingSettings, verbose: bool) {
    let level = if verbose || logging.verbose {
        "debug"
    } else {
        logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A second init (tests calling into the CLI twice) is harmless
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
