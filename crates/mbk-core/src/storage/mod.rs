//! Backup directory layout, file writes and failure bookkeeping.
//!
//! Layout under the destination root:
//!
//! ```text
//! cards/{min}-{max}.xml          raw card page bodies
//! attachments/{card}-{file_name} raw attachment bytes
//! murmurs/{card}.xml             raw murmur (comment) feeds
//! ```
//!
//! Files are written to a `.part` sibling and renamed into place, so a file
//! under its final name is always complete.

mod registry;
mod sanitize;
mod store;

pub use registry::{FailureRegistry, FailureSummary};
pub use sanitize::sanitize_file_name;
pub use store::{BackupStore, WriteCounts};

use std::path::{Path, PathBuf};

pub const CARDS_DIR: &str = "cards";
pub const ATTACHMENTS_DIR: &str = "attachments";
pub const MURMURS_DIR: &str = "murmurs";

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `12.xml` → `12.xml.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// `cards/` file name for a page spanning `min..=max`.
pub fn page_file_name(min: u64, max: u64) -> String {
    format!("{}-{}.xml", min, max)
}

/// `attachments/` file name; the attachment's own name is sanitized.
pub fn attachment_file_name(card: u64, file_name: &str) -> String {
    format!("{}-{}", card, sanitize_file_name(file_name))
}

/// `name` with `~{n}` inserted before its extension (`a.png` → `a~2.png`).
pub fn numbered_file_name(name: &str, n: u32) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}~{}{}", &name[..dot], n, &name[dot..]),
        _ => format!("{}~{}", name, n),
    }
}

/// `murmurs/` file name for a card.
pub fn murmurs_file_name(card: u64) -> String {
    format!("{}.xml", card)
}
