//! `mbk config` – show where the config lives and what it says.

use anyhow::Result;
use std::path::Path;

pub fn run_config(config: Option<&Path>) -> Result<()> {
    let (path, cfg) = super::load_config(config)?;
    println!("config: {}", path.display());
    println!("host: {}", cfg.host);
    println!("project: {}", cfg.project);
    println!("username: {}", cfg.username);
    println!(
        "secret_key: {}",
        if cfg.secret_key.is_empty() { "(unset)" } else { "(set)" }
    );
    println!("destination: {}", cfg.destination.display());
    println!(
        "batch_size: {}, pools: pages={} records={} attachment_items={}",
        cfg.batch_size, cfg.pools.pages, cfg.pools.records, cfg.pools.attachment_items
    );
    if let Err(e) = cfg.validate() {
        println!("not ready: {:#}", e);
    }
    Ok(())
}
