use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `secret_key` from the file.
pub const SECRET_ENV_VAR: &str = "MBK_SECRET_KEY";

/// Retry policy parameters for every HTTP call (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Worker counts of the fixed thread pools. The two top-level phases always
/// run on a pool of two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Concurrent card page fetches.
    pub pages: usize,
    /// Concurrent per-card attachment/comment jobs.
    pub records: usize,
    /// Concurrent attachment payload downloads.
    pub attachment_items: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pages: 50,
            records: 10,
            attachment_items: 197,
        }
    }
}

/// Request timeouts in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Signed API calls (card pages, attachment lists, murmurs).
    pub api_secs: u64,
    /// Attachment payload downloads.
    pub download_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            api_secs: 300,
            download_secs: 600,
        }
    }
}

impl TimeoutConfig {
    pub fn api(&self) -> Duration {
        Duration::from_secs(self.api_secs)
    }

    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download_secs)
    }
}

/// Global configuration loaded from `~/.config/mbk/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbkConfig {
    /// Base URL of the Mingle server, e.g. `https://mingle.example.com`.
    pub host: String,
    /// Project identifier used in `/api/v2/projects/{project}/...`.
    pub project: String,
    /// API user name (the `APIAuth` access key id).
    pub username: String,
    /// HMAC secret. May be left empty and supplied via `MBK_SECRET_KEY`.
    #[serde(default)]
    pub secret_key: String,
    /// Backup root; destroyed and recreated on every run.
    pub destination: PathBuf,
    /// Card pages requested per sweep round.
    pub batch_size: u64,
    /// Extra list-and-fetch rounds for failed attachments (total attempts = 1 + this).
    pub attachment_retry_rounds: u32,
    #[serde(default)]
    pub pools: PoolConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl Default for MbkConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            project: String::new(),
            username: String::new(),
            secret_key: String::new(),
            destination: PathBuf::from("mingle_resource"),
            batch_size: 200,
            attachment_retry_rounds: 2,
            pools: PoolConfig::default(),
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl MbkConfig {
    /// Check that the config can drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            anyhow::bail!("config: host is empty");
        }
        url::Url::parse(self.host.trim())
            .with_context(|| format!("config: host {:?} is not a URL", self.host))?;
        if self.project.trim().is_empty() {
            anyhow::bail!("config: project is empty");
        }
        if self.username.trim().is_empty() {
            anyhow::bail!("config: username is empty");
        }
        if self.secret_key.is_empty() {
            anyhow::bail!("config: secret_key is empty (set it in the file or via {SECRET_ENV_VAR})");
        }
        if self.batch_size == 0 {
            anyhow::bail!("config: batch_size must be at least 1");
        }
        if self.pools.pages == 0 || self.pools.records == 0 || self.pools.attachment_items == 0 {
            anyhow::bail!("config: pool sizes must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("config: retry.max_attempts must be at least 1");
        }
        Ok(())
    }

    /// Replace `secret_key` with the value of `MBK_SECRET_KEY` when set.
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
            if !secret.is_empty() {
                self.secret_key = secret;
            }
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mbk")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MbkConfig> {
    load_or_init_at(&config_path()?)
}

/// Like [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<MbkConfig> {
    if !path.exists() {
        let default_cfg = MbkConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: MbkConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
