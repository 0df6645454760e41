//! CLI frontend for the Parlor session engine.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "parlor",
    about = "Parlor: wagered mini-games for group chats",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted sequence of chat actions against an in-memory engine
    Replay {
        /// Script file (JSON)
        script: PathBuf,

        /// RNG seed for prompts and rolls (default: config seed, else 42)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Engine config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Group settings file (JSON)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Stop at the first rejected action
        #[arg(long)]
        strict: bool,
    },

    /// Print the effective engine configuration, validating any given files
    Config {
        /// Engine config file (JSON; default: built-in defaults)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Group settings file (JSON)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Replay {
            script,
            seed,
            config,
            settings,
            strict,
        } => commands::replay::run(
            &script,
            &commands::replay::ReplayOptions {
                seed,
                config,
                settings,
                strict,
            },
        ),
        Commands::Config {
            file,
            settings,
            json,
        } => commands::config::run(file.as_deref(), settings.as_deref(), json),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
