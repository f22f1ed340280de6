//! Turnkey - Build Orchestration CLI
//!
//! Entry point that parses the command line, sets up logging, and hands
//! off to the selected platform pipeline.

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{AndroidArgs, CommonArgs, DesktopArgs};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "turnkey",
    version = VERSION,
    about = "Build orchestration for cmake/make and Android ant/ndk-build projects"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and package an Android ant/ndk-build project
    Android(AndroidArgs),
    /// Build and package a cmake/make project
    Desktop(DesktopArgs),
}

impl Commands {
    fn common(&self) -> &CommonArgs {
        match self {
            Commands::Android(args) => &args.common,
            Commands::Desktop(args) => &args.common,
        }
    }
}

/// Initialize logging to stderr; RUST_LOG overrides the verbosity flag
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.command.common().verbose);

    let result = match cli.command {
        Commands::Android(args) => commands::run_android(args),
        Commands::Desktop(args) => commands::run_desktop(args),
    };

    let code = match result {
        Ok(()) => 0,
        Err(err) => {
            error!("{err}");
            err.exit_code()
        }
    };
    std::process::exit(code);
}
