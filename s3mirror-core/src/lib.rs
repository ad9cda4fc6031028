//! s3mirror core library — canonical keys, domain records, configuration.
//!
//! - [`key`] — path ⇄ key codec
//! - [`types`] — [`ObjectKey`] and the per-side records
//! - [`config`] — explicit runtime configuration
//! - [`error`] — [`KeyError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod key;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, KeyError};
pub use types::{LocalFile, LocalFiles, ObjectKey, RemoteFiles, RemoteObject};
