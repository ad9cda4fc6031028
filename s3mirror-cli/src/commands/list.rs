//! `s3mirror list` — public URL of every object in the bucket.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use s3mirror_sync::{
    pipeline::{self, Command, Outcome},
    ListedObject,
};

use super::GlobalArgs;

/// Arguments for `s3mirror list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Accepted for symmetry with push/pull; listing never reads it.
    pub path: Option<String>,

    /// Show key and size next to each URL.
    #[arg(long, conflicts_with = "json")]
    pub long: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ListRow {
    #[tabled(rename = "key")]
    key: String,
    #[tabled(rename = "size")]
    size: u64,
    #[tabled(rename = "url")]
    url: String,
}

impl ListArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = super::load_config(global)?;

        let outcome = super::block_on(async {
            let reconciler = super::connect(&config, false).await;
            pipeline::run(&reconciler, Command::List).await
        })?
        .with_context(|| format!("list failed for bucket '{}'", config.bucket))?;

        let Outcome::Listed(objects) = outcome else {
            anyhow::bail!("list produced no listing");
        };
        if self.json {
            println!("{}", serde_json::to_string_pretty(&objects)?);
        } else if self.long {
            print_table(objects);
        } else {
            for object in &objects {
                println!("{}", object.url);
            }
        }
        Ok(())
    }
}

fn print_table(objects: Vec<ListedObject>) {
    if objects.is_empty() {
        println!("(bucket is empty)");
        return;
    }
    let rows: Vec<ListRow> = objects
        .into_iter()
        .map(|o| ListRow {
            key: o.key.0,
            size: o.size,
            url: o.url,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
