//! `s3mirror config` — show the effective configuration or write a default file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use s3mirror_core::config::{self, Config};

use super::GlobalArgs;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the configuration a run would use, after every override.
    Show,

    /// Write a config file holding the defaults.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
}

pub fn run(command: ConfigCommand, global: &GlobalArgs) -> Result<()> {
    let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
    match command {
        ConfigCommand::Show => show(&home, global),
        ConfigCommand::Init { force } => init(&home, force),
    }
}

fn show(home: &std::path::Path, global: &GlobalArgs) -> Result<()> {
    let path = config::config_path_at(home);
    let effective = super::load_config(global)?;

    let source = if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not present, using defaults)", path.display())
    };
    println!("# {source}");
    print!("{}", serde_yaml::to_string(&effective)?);
    Ok(())
}

fn init(home: &std::path::Path, force: bool) -> Result<()> {
    let path = config::config_path_at(home);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    let written = config::save_at(home, &Config::default())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{} wrote {}", "✓".green(), written.display());
    Ok(())
}
