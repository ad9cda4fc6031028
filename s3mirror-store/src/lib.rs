//! # s3mirror-store
//!
//! The object-storage capability the sync engine is written against.
//!
//! [`ObjectStore`] exposes exactly the remote operations a mirror run needs.
//! [`S3Store`] talks to S3 or any S3-compatible endpoint; [`MemoryStore`]
//! keeps everything in process and backs the engine's tests.

pub mod error;
pub mod memory;
pub mod s3;
mod traits;
pub mod url;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use s3::S3Store;
pub use traits::{CannedAcl, ListPage, ObjectBody, ObjectStore, PutOptions};
