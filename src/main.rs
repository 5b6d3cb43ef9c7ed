//! Coupon Enroller CLI
//!
//! # Usage
//!
//! ```bash
//! coupon-enroller browsers
//! coupon-enroller discover --min-rating 4.5 --sort rating --desc
//! coupon-enroller enroll --browser firefox --include rust --limit 5
//! ENROLLER_PASSWORD=... coupon-enroller daily --email me@example.com
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use coupon_enroller::{
    cli::{
        self,
        auth::AuthArgs,
        commands::{self, FilterArgs, SourceArgs},
    },
    config::ConfigLoader,
    utils::VERSION,
};

#[derive(Parser)]
#[command(author, version = VERSION, about, long_about = None)]
#[command(name = "coupon-enroller")]
struct Cli {
    /// Configuration file (defaults to the per-user config path when it exists)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List supported, installed and default browsers
    Browsers,

    /// Discover courses and print those matching the filter
    Discover {
        #[command(flatten)]
        sources: SourceArgs,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Sign in and enroll in the courses matching the filter
    Enroll {
        #[command(flatten)]
        auth: AuthArgs,
        #[command(flatten)]
        sources: SourceArgs,
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Run the daily discover/filter/enroll job once
    Daily {
        #[command(flatten)]
        auth: AuthArgs,
        #[command(flatten)]
        sources: SourceArgs,
        /// Enroll in at most this many courses (overrides enrollment.daily_limit)
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| ConfigLoader::default_path().filter(|path| path.exists()));
    let settings = ConfigLoader::new().load(config_path.as_deref())?;

    cli::init_logging(&settings.logging, args.verbose);
    debug!("Using configuration file: {:?}", config_path);

    match &args.command {
        Command::Browsers => commands::run_browsers(args.json),
        Command::Discover { sources, filter } => {
            commands::run_discover(&settings, sources, filter, args.json).await
        }
        Command::Enroll {
            auth,
            sources,
            filter,
        } => commands::run_enroll(&settings, auth, sources, filter, args.json).await,
        Command::Daily {
            auth,
            sources,
            limit,
        } => commands::run_daily(&settings, auth, sources, *limit, args.json).await,
    }
}
