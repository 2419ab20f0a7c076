//! File-backed storage for sets of string identifiers.
//!
//! Two sets live here: announcement ids that have already been broadcast,
//! and the chat ids subscribed to the broadcast. Each is a plain JSON array
//! of strings under the data directory.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Key for the set of announcement ids already delivered.
pub const SENT_ANNOUNCEMENTS: &str = "sent_announcements";
/// Key for the set of subscribed chat ids.
pub const CHAT_IDS: &str = "chat_ids";

/// Durable set store. One JSON file per key, full overwrite on save.
///
/// Provides no locking of its own; callers must serialize load-modify-save
/// sequences per key (see the store mutex in `main`).
pub struct SetStore {
    dir: PathBuf,
}

impl SetStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Load the set stored under `key`.
    ///
    /// A missing or unparsable file means "no prior state" and yields an
    /// empty set; this never fails the caller.
    pub fn load(&self, key: &str) -> HashSet<String> {
        let path = self.path_for(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return HashSet::new(),
            Err(e) => {
                warn!("Failed to read {}: {e}", path.display());
                return HashSet::new();
            }
        };
        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(items) => items.into_iter().collect(),
            Err(e) => {
                warn!("Corrupt state file {}, starting empty: {e}", path.display());
                HashSet::new()
            }
        }
    }

    /// Overwrite the set stored under `key`.
    ///
    /// Writes to a temporary file and renames it into place, so a crash
    /// mid-write leaves the previous contents intact.
    pub fn save(&self, key: &str, set: &HashSet<String>) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let items: Vec<&String> = set.iter().collect();
        let content = serde_json::to_string_pretty(&items)?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}
