//! Shared entrypoint used by every CLI subcommand that touches the bucket.

use std::path::PathBuf;

use crate::reconcile::{ListedObject, Reconciler};
use crate::report::RunReport;
use crate::SyncError;

/// What to do against the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Mirror the local tree onto the bucket.
    Push { root: PathBuf },
    /// Mirror the bucket onto the local tree.
    Pull { root: PathBuf },
    /// Enumerate the bucket's objects and their public URLs.
    List,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Synced(RunReport),
    Listed(Vec<ListedObject>),
}

/// Run a single command against the reconciler's bucket.
pub async fn run(reconciler: &Reconciler, command: Command) -> Result<Outcome, SyncError> {
    tracing::debug!("running {command:?} against '{}'", reconciler.bucket());
    match command {
        Command::Push { root } => Ok(Outcome::Synced(reconciler.push(&root).await?)),
        Command::Pull { root } => Ok(Outcome::Synced(reconciler.pull(&root).await?)),
        Command::List => Ok(Outcome::Listed(reconciler.list().await?)),
    }
}
