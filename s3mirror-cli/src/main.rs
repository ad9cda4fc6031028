//! s3mirror — mirror a local directory tree to and from an object-storage bucket.
//!
//! # Usage
//!
//! ```text
//! s3mirror push <path> [--dry-run] [--json]
//! s3mirror pull <path> [--dry-run] [--json]
//! s3mirror list [--long] [--json]
//! s3mirror config show
//! s3mirror config init [--force]
//! ```
//!
//! `--bucket <name>` is accepted by every subcommand and overrides both the
//! config file and `AWS_BUCKET_NAME`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigCommand, list::ListArgs, sync::SyncArgs, GlobalArgs};
use s3mirror_sync::Direction;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "s3mirror",
    version,
    about = "Mirror a local directory tree to and from an object-storage bucket",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Make the bucket hold exactly the files under <path>.
    Push(SyncArgs),

    /// Make <path> hold exactly the objects in the bucket.
    Pull(SyncArgs),

    /// Print the public URL of every object in the bucket.
    List(ListArgs),

    /// Inspect or initialise ~/.s3mirror/config.yaml.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Commands::Push(args) => args.run(Direction::Push, &cli.global),
        Commands::Pull(args) => args.run(Direction::Pull, &cli.global),
        Commands::List(args) => args.run(&cli.global),
        Commands::Config { command } => commands::config::run(command, &cli.global),
    }
}

/// Progress goes to stderr so stdout stays clean for `--json` and URLs.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
