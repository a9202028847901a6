//! `mbk backup` – run one full backup.

use anyhow::Result;
use mbk_core::logging;
use mbk_core::BackupAgent;
use std::path::{Path, PathBuf};

pub fn run_backup(config: Option<&Path>, destination: Option<PathBuf>, log_dir: Option<PathBuf>) -> Result<()> {
    init_logging(log_dir);

    let (path, mut cfg) = super::load_config(config)?;
    if let Some(dest) = destination {
        cfg.destination = dest;
    }
    cfg.validate()?;
    tracing::debug!(config = %path.display(), host = %cfg.host, project = %cfg.project, "loaded config");

    let report = BackupAgent::new(cfg).run()?;

    println!(
        "Saved {} card pages, {} attachments, {} murmur feeds for {} cards.",
        report.written.pages, report.written.attachments, report.written.murmurs, report.records
    );
    if !report.is_complete() {
        anyhow::bail!("backup incomplete: {}", report.failures);
    }
    Ok(())
}

fn init_logging(log_dir: Option<PathBuf>) {
    let dir = match log_dir.map(Ok).unwrap_or_else(logging::default_log_dir) {
        Ok(dir) => dir,
        Err(e) => {
            logging::init_logging_stderr();
            tracing::warn!(error = %e, "no log directory; logging to stderr only");
            return;
        }
    };
    if let Err(e) = logging::init_logging(&dir) {
        logging::init_logging_stderr();
        tracing::warn!(error = %format!("{:#}", e), "file logging unavailable; logging to stderr only");
    }
}
