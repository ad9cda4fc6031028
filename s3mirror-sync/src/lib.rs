//! # s3mirror-sync
//!
//! One-way mirroring between a local directory tree and a bucket.
//!
//! Build a [`Reconciler`] over any [`s3mirror_store::ObjectStore`] and call
//! [`Reconciler::push`], [`Reconciler::pull`] or [`Reconciler::list`], or go
//! through [`pipeline::run`].

pub mod diff;
pub mod error;
pub mod guard;
pub mod local;
pub mod pipeline;
pub mod reconcile;
pub mod remote;
pub mod report;

pub use diff::{diff, KeyDiff};
pub use error::SyncError;
pub use guard::OpGuard;
pub use reconcile::{BucketState, ListedObject, Reconciler, SyncOptions};
pub use report::{ActionResult, Direction, KeyFailure, Op, RunReport};
