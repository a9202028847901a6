//! CLI command handlers.

mod backup;
mod config;

pub use backup::run_backup;
pub use config::run_config;

use anyhow::Result;
use mbk_core::config::{self as core_config, MbkConfig};
use std::path::Path;

/// Load the config from `path` or the XDG default, then apply env overrides.
fn load_config(path: Option<&Path>) -> Result<(std::path::PathBuf, MbkConfig)> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => core_config::config_path()?,
    };
    let mut cfg = core_config::load_or_init_at(&path)?;
    cfg.apply_env();
    Ok((path, cfg))
}
