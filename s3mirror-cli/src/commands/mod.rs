//! Subcommand implementations and the plumbing they share.

pub mod config;
pub mod list;
pub mod sync;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;

use s3mirror_core::Config;
use s3mirror_store::S3Store;
use s3mirror_sync::{Reconciler, SyncOptions};

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Bucket to mirror against (overrides config and AWS_BUCKET_NAME).
    #[arg(long, global = true, value_parser = clap::builder::NonEmptyStringValueParser::new())]
    pub bucket: Option<String>,
}

/// Defaults, then config file, then environment, then `--bucket`.
pub fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = s3mirror_core::config::resolve().context("failed to load configuration")?;
    if let Some(bucket) = &global.bucket {
        config.bucket = bucket.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Drive `fut` to completion on a fresh multi-threaded runtime.
pub fn block_on<F: Future>(fut: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    Ok(runtime.block_on(fut))
}

/// Token cancelled on the first Ctrl-C. Must be called inside the runtime.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; cancelling in-flight operations");
            trigger.cancel();
        }
    });
    token
}

/// Reconciler backed by the S3 client described by `config`.
pub async fn connect(config: &Config, dry_run: bool) -> Reconciler {
    let store = S3Store::connect(config).await;
    Reconciler::new(
        Arc::new(store),
        config.bucket.clone(),
        SyncOptions::from_config(config, dry_run),
        cancel_on_ctrl_c(),
    )
}
