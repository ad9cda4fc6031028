//! Runtime configuration.
//!
//! # Sources (lowest precedence first)
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. `~/.s3mirror/config.yaml`
//! 3. Environment ([`BUCKET_ENV`], [`ENDPOINT_ENV`], [`CONCURRENCY_ENV`],
//!    [`TIMEOUT_ENV`]); empty values count as unset
//! 4. Command-line flags (applied by the binary)
//!
//! # API pattern
//!
//! Every function touching the filesystem has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

pub const BUCKET_ENV: &str = "AWS_BUCKET_NAME";
pub const ENDPOINT_ENV: &str = "S3MIRROR_ENDPOINT";
pub const CONCURRENCY_ENV: &str = "S3MIRROR_CONCURRENCY";
pub const TIMEOUT_ENV: &str = "S3MIRROR_TIMEOUT_SECS";

pub const DEFAULT_BUCKET: &str = "default";
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Everything a run needs to know about its environment, resolved once at
/// process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target bucket name.
    pub bucket: String,
    /// Storage region; falls back to the provider's default chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom S3-compatible endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Address buckets as `<endpoint>/<bucket>` instead of `<bucket>.<host>`.
    pub path_style: bool,
    /// Upper bound on in-flight per-key operations.
    pub concurrency: usize,
    /// Deadline for each individual storage call.
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            region: None,
            endpoint: None,
            path_style: false,
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Per-operation deadline as a [`Duration`].
    pub fn op_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Overlay environment values read through `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bucket) = get(BUCKET_ENV) {
            self.bucket = bucket;
        }
        if let Some(endpoint) = get(ENDPOINT_ENV) {
            self.endpoint = Some(endpoint);
        }
        if let Some(raw) = get(CONCURRENCY_ENV) {
            self.concurrency = parse_positive(CONCURRENCY_ENV, &raw)?;
        }
        if let Some(raw) = get(TIMEOUT_ENV) {
            self.timeout_secs = parse_positive(TIMEOUT_ENV, &raw)?;
        }
        Ok(self)
    }

    /// Reject values no run could work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "bucket",
                value: self.bucket.clone(),
                reason: "must not be empty",
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "concurrency",
                value: "0".to_string(),
                reason: "must be at least 1",
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "timeout_secs",
                value: "0".to_string(),
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

fn parse_positive<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + From<u8>,
{
    match raw.trim().parse::<T>() {
        Ok(v) if v != T::from(0) => Ok(v),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
            reason: "expected a positive integer",
        }),
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.s3mirror/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".s3mirror").join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the config file, or defaults when it does not exist.
///
/// Returns `ConfigError::Parse` (with path) if the YAML is malformed.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// Atomically save `config` to `<home>/.s3mirror/config.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path_at(home);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid config path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_file_name("config.yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// File, then process environment, then validation.
pub fn resolve_at(home: &Path) -> Result<Config, ConfigError> {
    let config = load_at(home)?.apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

/// `resolve_at` convenience wrapper.
pub fn resolve() -> Result<Config, ConfigError> {
    resolve_at(&home()?)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
