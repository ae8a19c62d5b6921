//! Line-oriented persisted set of already-seen canonical listing URLs.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Canonical URLs already processed for one search
pub type HistorySet = BTreeSet<String>;

/// Load a history file.
///
/// A missing or unreadable file yields an empty set: the worst outcome is a
/// repeated notification.
pub fn load(path: &Path) -> HistorySet {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No history at {}, starting empty", path.display());
            return HistorySet::new();
        }
        Err(e) => {
            warn!("Could not read history {}: {}; treating as empty", path.display(), e);
            return HistorySet::new();
        }
    };

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Overwrite the history file with the complete, sorted set.
///
/// The new content is written to a sibling temp file and renamed into place,
/// so a failed save leaves the previous history intact.
pub fn save(path: &Path, urls: &HistorySet) -> Result<()> {
    let mut content = String::with_capacity(urls.iter().map(|u| u.len() + 1).sum());
    for url in urls {
        content.push_str(url);
        content.push('\n');
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create history directory {}", parent.display()))?;
    }

    let tmp = temp_path(path);
    fs::write(&tmp, content)
        .with_context(|| format!("Failed to write history temp file {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to replace history {}", path.display()));
    }

    debug!("Saved {} history entries to {}", urls.len(), path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
