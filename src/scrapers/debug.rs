use crate::scrapers::traits::DebugSink;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Writes snapshots as `<dir>/<name>.html`
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DebugSink for DirectorySink {
    fn dump(&self, name: &str, content: &str) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("Could not create debug directory {}: {}", self.dir.display(), e);
            return;
        }

        let path = self.dir.join(format!("{}.html", snapshot_name(name)));
        match std::fs::write(&path, content) {
            Ok(()) => debug!("Saved {} bytes to {}", content.len(), path.display()),
            Err(e) => warn!("Could not write {}: {}", path.display(), e),
        }
    }
}

/// Makes a URL fragment safe to use as a file name.
pub fn snapshot_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "page".to_string()
    } else {
        cleaned
    }
}
