//! Shared backup sink: file writes and failure lists behind one lock.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::registry::{FailureRegistry, FailureSummary};
use super::{
    attachment_file_name, murmurs_file_name, numbered_file_name, page_file_name, temp_path,
    ATTACHMENTS_DIR, CARDS_DIR, MURMURS_DIR,
};

/// Number of files written per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub pages: usize,
    pub attachments: usize,
    pub murmurs: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    failures: FailureRegistry,
    written: WriteCounts,
    /// Attachment file name on disk -> `(card, name as listed)`.
    attachment_owners: HashMap<String, (u64, String)>,
}

impl StoreState {
    /// File name for an attachment, unique per `(card, name)` even when
    /// sanitizing maps two listed names onto the same string.
    fn attachment_slot(&mut self, card: u64, file_name: &str) -> String {
        let base = attachment_file_name(card, file_name);
        let mut candidate = base.clone();
        let mut n = 1;
        loop {
            match self.attachment_owners.get(&candidate) {
                None => {
                    self.attachment_owners
                        .insert(candidate.clone(), (card, file_name.to_string()));
                    break;
                }
                Some((c, name)) if *c == card && name == file_name => break,
                Some(_) => {
                    n += 1;
                    candidate = numbered_file_name(&base, n);
                }
            }
        }
        if candidate != format!("{}-{}", card, file_name) {
            tracing::warn!(card, attachment = %file_name, saved_as = %candidate, "attachment saved under a different name");
        }
        candidate
    }
}

/// The backup destination. Safe to share between worker threads; every write
/// and every failure entry goes through the same mutex.
#[derive(Debug)]
pub struct BackupStore {
    root: PathBuf,
    state: Mutex<StoreState>,
}

impl BackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Destroy the destination (if it is a directory) and recreate the empty layout.
    pub fn reset(&self) -> Result<()> {
        let root = &self.root;
        if root.as_os_str().is_empty() || root.parent().is_none() {
            anyhow::bail!("refusing to reset backup root {:?}", root);
        }
        if root.is_dir() {
            fs::remove_dir_all(root)
                .with_context(|| format!("remove old backup at {}", root.display()))?;
        } else if root.exists() {
            anyhow::bail!("backup root {} exists and is not a directory", root.display());
        }
        for dir in [CARDS_DIR, ATTACHMENTS_DIR, MURMURS_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).with_context(|| format!("create {}", path.display()))?;
        }
        tracing::debug!(root = %root.display(), "backup layout created");
        Ok(())
    }

    /// Save a raw card page as `cards/{min}-{max}.xml`.
    pub fn save_page(&self, min: u64, max: u64, body: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(CARDS_DIR).join(page_file_name(min, max));
        let mut state = self.lock();
        write_file(&path, body)?;
        state.written.pages += 1;
        Ok(path)
    }

    /// Save attachment bytes as `attachments/{card}-{file_name}`. A name that
    /// is not a safe path component, or that collides with another
    /// attachment of the card once sanitized, is saved under an adjusted name.
    pub fn save_attachment(&self, card: u64, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let mut state = self.lock();
        let path = self
            .root
            .join(ATTACHMENTS_DIR)
            .join(state.attachment_slot(card, file_name));
        write_file(&path, bytes)?;
        state.written.attachments += 1;
        Ok(path)
    }

    /// Save a card's murmur feed as `murmurs/{card}.xml`.
    pub fn save_murmurs(&self, card: u64, body: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(MURMURS_DIR).join(murmurs_file_name(card));
        let mut state = self.lock();
        write_file(&path, body)?;
        state.written.murmurs += 1;
        Ok(path)
    }

    pub fn record_failed_page(&self, page: u64) {
        self.lock().failures.push_page(page);
    }

    /// Record an attachment that never came through, keyed `{card}-{name}`.
    pub fn record_failed_attachment(&self, card: u64, name: &str) {
        self.lock().failures.push_attachment(format!("{}-{}", card, name));
    }

    /// Record a card whose attachment list could not be read.
    pub fn record_failed_attachment_list(&self, card: u64) {
        self.lock()
            .failures
            .push_attachment(format!("{}-attachments.xml", card));
    }

    pub fn record_failed_murmurs(&self, card: u64) {
        self.lock().failures.push_comments(card);
    }

    /// Deduplicated failures so far.
    pub fn failures(&self) -> FailureSummary {
        self.lock().failures.summary()
    }

    pub fn written(&self) -> WriteCounts {
        self.lock().written
    }
}

/// Write to `path.part`, then rename over `path`.
fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    let mut f = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
    f.write_all(bytes)
        .with_context(|| format!("write {}", tmp.display()))?;
    drop(f);
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} to {}", tmp.display(), path.display()))?;
    Ok(())
}
