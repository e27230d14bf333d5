use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::debug;
use veritas_core::Turn;

use crate::error::{Result, StorageError};
use crate::store::ConversationStore;

/// Placeholder replaced by the sanitised user id in file patterns.
pub const USER_ID_PLACEHOLDER: &str = "{user_id}";

/// Conversation store keeping one JSON file per user.
///
/// Each file is a pretty-printed array of `{role, content}` objects with
/// non-ASCII text written as-is. Saves go to a temporary sibling first and
/// are renamed into place, so a reader never sees a half-written log.
pub struct JsonFileStore {
    dir: PathBuf,
    file_pattern: String,
    tmp_counter: AtomicU64,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`. `file_pattern` must contain
    /// `{user_id}`; a pattern without it gets the id appended before `.json`.
    pub fn new(dir: impl Into<PathBuf>, file_pattern: impl Into<String>) -> Self {
        let mut file_pattern = file_pattern.into();
        if !file_pattern.contains(USER_ID_PLACEHOLDER) {
            let stem = file_pattern.trim_end_matches(".json").to_string();
            file_pattern = format!("{stem}{USER_ID_PLACEHOLDER}.json");
        }
        Self {
            dir: dir.into(),
            file_pattern,
            tmp_counter: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the log file for `user_id`.
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        let name = self
            .file_pattern
            .replace(USER_ID_PLACEHOLDER, &sanitize_user_id(user_id));
        self.dir.join(name)
    }

    fn tmp_path_for(&self, path: &Path) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{name}.{}.{n}.tmp", std::process::id()))
    }
}

/// Map a user id onto a safe file-name fragment.
///
/// Characters outside `[A-Za-z0-9_-]` become `_`; an empty id becomes `_`.
pub fn sanitize_user_id(user_id: &str) -> String {
    let cleaned: String = user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl ConversationStore for JsonFileStore {
    async fn load(&self, user_id: &str) -> Result<Vec<Turn>> {
        let path = self.path_for(user_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(user_id, "No conversation log yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    async fn save(&self, user_id: &str, turns: &[Turn]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(user_id);
        let body = serde_json::to_string_pretty(turns)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let tmp = self.tmp_path_for(&path);
        tokio::fs::write(&tmp, body.as_bytes()).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(user_id, entries = turns.len(), path = %path.display(), "Conversation log saved");
        Ok(())
    }
}
