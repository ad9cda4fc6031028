//! `s3mirror push` / `s3mirror pull` — one-way mirror in either direction.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use s3mirror_sync::{
    pipeline::{self, Command, Outcome},
    ActionResult, Direction, Op, RunReport,
};

use super::GlobalArgs;

/// Arguments shared by `s3mirror push` and `s3mirror pull`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Local directory to mirror.
    #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new())]
    pub path: String,

    /// Show what would change without touching either side.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self, direction: Direction, global: &GlobalArgs) -> Result<()> {
        let config = super::load_config(global)?;
        let root = PathBuf::from(&self.path);
        let command = match direction {
            Direction::Push => Command::Push { root },
            Direction::Pull => Command::Pull { root },
        };

        let outcome = super::block_on(async {
            let reconciler = super::connect(&config, self.dry_run).await;
            pipeline::run(&reconciler, command).await
        })?
        .with_context(|| format!("{direction} failed for bucket '{}'", config.bucket))?;

        let Outcome::Synced(report) = outcome else {
            anyhow::bail!("{direction} produced no report");
        };
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        report.ensure_complete()?;
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let target = match report.direction {
        Direction::Push => format!("bucket '{}'", report.bucket),
        Direction::Pull => format!("'{}'", report.root.display()),
    };

    if report.is_noop() {
        println!(
            "{prefix}{} {target} already mirrored ({} unchanged)",
            "✓".green(),
            report.unchanged
        );
        return;
    }

    let (transfer, delete) = match report.direction {
        Direction::Push => (Op::Upload, Op::DeleteRemote),
        Direction::Pull => (Op::Download, Op::DeleteLocal),
    };
    let mark = if report.failures.is_empty() {
        "✓".green()
    } else {
        "✗".red()
    };
    println!(
        "{prefix}{mark} {} {target} ({} {transfer}, {} {delete}, {} unchanged, {} failed)",
        report.direction,
        report.count(transfer),
        report.count(delete),
        report.unchanged,
        report.failures.len()
    );

    for action in &report.actions {
        let symbol = match (action, action.op()) {
            (ActionResult::WouldApply { .. }, _) => "~".yellow(),
            (_, Op::Upload | Op::Download) => "+".green(),
            (_, Op::DeleteRemote | Op::DeleteLocal) => "-".red(),
        };
        println!("  {symbol}  {}", action.key());
    }
    for failure in &report.failures {
        println!("  {}  {} ({})", "!".red(), failure.key, failure.error);
    }
}
