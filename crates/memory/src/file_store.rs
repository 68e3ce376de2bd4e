//! File-based session store: one pretty-printed JSON file per session.
//!
//! Storage location: `~/.filescout/sessions/<session>.json` by default.
//! Session ids are percent-encoded into file names, so any id maps to a
//! distinct, portable file name and lists back to itself.

use async_trait::async_trait;
use filescout_core::conversation::{ConversationState, SessionId};
use filescout_core::error::StoreError;
use filescout_core::store::SessionStore;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSION: &str = "json";

/// A directory of JSON session files.
///
/// Each save writes to a temporary file and renames it over the target, so
/// a crash mid-write leaves the previous checkpoint intact.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(dir = %dir.display(), "File session store");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.{EXTENSION}", encode_id(id.as_str())))
    }
}

/// Percent-encode every byte outside `[A-Za-z0-9_-]`.
fn encode_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn decode_id(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn storage_err(action: &str, path: &Path, e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(format!("Failed to {action} '{}': {e}", path.display()))
}

#[async_trait]
impl SessionStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, id: &SessionId, state: &ConversationState) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_err("create session directory", &self.dir, e))?;

        let path = self.path_for(id);
        let json = serde_json::to_string_pretty(state).map_err(|e| StoreError::Corrupted {
            session_id: id.to_string(),
            reason: e.to_string(),
        })?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| storage_err("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| storage_err("replace", &path, e))?;

        debug!(session = %id, turns = state.len(), "Session saved");
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<ConversationState>, StoreError> {
        let path = self.path_for(id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err("read", &path, e)),
        };

        let state = serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
            session_id: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(state))
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_err("delete", &path, e)),
        }
    }

    async fn list(&self) -> Result<Vec<SessionId>, StoreError> {
        let mut reader = match tokio::fs::read_dir(&self.dir).await {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_err("list", &self.dir, e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| storage_err("list", &self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match decode_id(stem) {
                Some(id) => ids.push(SessionId(id)),
                None => warn!(file = %path.display(), "Skipping unrecognised session file"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}
