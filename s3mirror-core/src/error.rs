//! Error types for s3mirror-core.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the path ⇄ key codec.
#[derive(Debug, Error)]
pub enum KeyError {
    /// A path argument was empty.
    #[error("path not provided")]
    EmptyPath,

    /// The current directory could not be read while absolutizing a path.
    #[error("cannot resolve current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    /// The file does not live under the root it was keyed against.
    #[error("{path} is not under root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// The path is the root itself, which has no key.
    #[error("{path} is the sync root and has no key")]
    Empty { path: PathBuf },

    /// A path component is not valid UTF-8 and cannot become a key.
    #[error("{path} contains a non UTF-8 component")]
    NonUtf8 { path: PathBuf },

    /// A remote key that would resolve outside the local root.
    #[error("key '{key}' cannot be mapped to a local path")]
    UnsafeKey { key: String },
}

/// All errors that can arise while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure, annotated with the file involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes the file path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.s3mirror/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A setting holds a value outside its accepted range.
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
