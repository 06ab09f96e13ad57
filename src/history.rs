//! Transcript history
//!
//! Newest-first list of completed sessions, capped at a fixed size and
//! persisted as pretty-printed JSON. Loading is lazy and tolerant: a missing
//! or corrupt file starts an empty history instead of failing the session
//! pipeline.

use crate::cleanup::CleanupEngine;
use crate::error::HistoryError;
use crate::insert::ClipboardService;
use crate::lexicon::PersonalLexicon;
use crate::profile::StyleProfile;
use crate::transcript::{CleanTranscript, CloudTier, InsertionStatus, RawTranscript};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// One completed dictation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub app_bundle_id: String,
    pub raw_text: String,
    pub clean_text: String,
    pub insertion_status: InsertionStatus,
}

impl TranscriptEntry {
    pub fn new(
        app_bundle_id: impl Into<String>,
        raw_text: impl Into<String>,
        clean_text: impl Into<String>,
        insertion_status: InsertionStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            app_bundle_id: app_bundle_id.into(),
            raw_text: raw_text.into(),
            clean_text: clean_text.into(),
            insertion_status,
        }
    }
}

/// The slice of history the session coordinator needs
#[async_trait::async_trait]
pub trait TranscriptHistory: Send + Sync {
    async fn append(&self, entry: TranscriptEntry) -> Result<(), HistoryError>;
    async fn delete(&self, entry_id: Uuid) -> Result<(), HistoryError>;
    async fn recent(&self, limit: usize) -> Vec<TranscriptEntry>;
    async fn search(&self, query: &str) -> Vec<TranscriptEntry>;
}

struct HistoryState {
    entries: Vec<TranscriptEntry>,
    has_loaded: bool,
}

pub struct HistoryStore {
    state: Mutex<HistoryState>,
    storage_path: PathBuf,
    clipboard: Arc<dyn ClipboardService>,
    max_entries: usize,
}

impl HistoryStore {
    pub fn new(
        storage_path: PathBuf,
        clipboard: Arc<dyn ClipboardService>,
        max_entries: usize,
    ) -> Self {
        Self {
            state: Mutex::new(HistoryState {
                entries: Vec::new(),
                has_loaded: false,
            }),
            storage_path,
            clipboard,
            max_entries,
        }
    }

    /// Re-runs cleanup for a stored entry and updates its clean text.
    pub async fn retry(
        &self,
        entry_id: Uuid,
        engine: &dyn CleanupEngine,
        profile: &StyleProfile,
        lexicon: &PersonalLexicon,
        tier: CloudTier,
    ) -> Result<CleanTranscript, HistoryError> {
        let raw_text = {
            let state = self.lock_loaded();
            state
                .entries
                .iter()
                .find(|e| e.id == entry_id)
                .map(|e| e.raw_text.clone())
                .ok_or(HistoryError::MissingEntry)?
        };

        let retried = engine
            .cleanup(&RawTranscript::from_text(raw_text), profile, lexicon, tier)
            .await?;

        {
            let mut state = self.lock_loaded();
            if let Some(entry) = state.entries.iter_mut().find(|e| e.id == entry_id) {
                entry.clean_text = retried.text.clone();
            }
            self.persist(&state.entries)?;
        }

        Ok(retried)
    }

    /// Copies the most recent entry's text back onto the clipboard. Falls
    /// back to the raw text when the entry has no clean text.
    pub async fn paste_last(&self) -> Result<Option<TranscriptEntry>, HistoryError> {
        let latest = {
            let state = self.lock_loaded();
            state.entries.first().cloned()
        };
        let Some(latest) = latest else {
            return Ok(None);
        };

        let text = if latest.clean_text.is_empty() {
            latest.raw_text.clone()
        } else {
            latest.clean_text.clone()
        };
        self.clipboard.set_string(&text).await?;
        Ok(Some(latest))
    }

    fn lock_loaded(&self) -> std::sync::MutexGuard<'_, HistoryState> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.has_loaded {
            state.has_loaded = true;
            state.entries = self.load_entries();
        }
        state
    }

    fn load_entries(&self) -> Vec<TranscriptEntry> {
        if !self.storage_path.exists() {
            return Vec::new();
        }
        match std::fs::read(&self.storage_path) {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
                warn!(
                    "history decode failed for {}: {e}",
                    self.storage_path.display()
                );
                Vec::new()
            }),
            Err(e) => {
                warn!(
                    "history load failed for {}: {e}",
                    self.storage_path.display()
                );
                Vec::new()
            }
        }
    }

    fn persist(&self, entries: &[TranscriptEntry]) -> Result<(), HistoryError> {
        let write = || -> std::io::Result<()> {
            if let Some(dir) = self.storage_path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let data = serde_json::to_vec_pretty(entries)?;
            let tmp = self.storage_path.with_extension("json.tmp");
            std::fs::write(&tmp, data)?;
            std::fs::rename(&tmp, &self.storage_path)?;
            Ok(())
        };
        write().map_err(|e| HistoryError::PersistenceFailed(e.to_string()))
    }
}

#[async_trait::async_trait]
impl TranscriptHistory for HistoryStore {
    async fn append(&self, entry: TranscriptEntry) -> Result<(), HistoryError> {
        let mut state = self.lock_loaded();
        state.entries.insert(0, entry);
        state.entries.truncate(self.max_entries);
        self.persist(&state.entries)
    }

    async fn delete(&self, entry_id: Uuid) -> Result<(), HistoryError> {
        let mut state = self.lock_loaded();
        state.entries.retain(|e| e.id != entry_id);
        self.persist(&state.entries)
    }

    async fn recent(&self, limit: usize) -> Vec<TranscriptEntry> {
        if limit == 0 {
            return Vec::new();
        }
        let state = self.lock_loaded();
        state.entries.iter().take(limit).cloned().collect()
    }

    async fn search(&self, query: &str) -> Vec<TranscriptEntry> {
        let state = self.lock_loaded();
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return state.entries.clone();
        }
        let needle = trimmed.to_lowercase();
        state
            .entries
            .iter()
            .filter(|entry| {
                entry.raw_text.to_lowercase().contains(&needle)
                    || entry.clean_text.to_lowercase().contains(&needle)
                    || entry.app_bundle_id.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::RuleBasedCleanupEngine;
    use crate::insert::MemoryClipboard;

    fn store_in(dir: &tempfile::TempDir) -> (HistoryStore, Arc<MemoryClipboard>) {
        let clipboard = Arc::new(MemoryClipboard::new());
        let store = HistoryStore::new(
            dir.path().join("transcript-history.json"),
            clipboard.clone(),
            DEFAULT_MAX_ENTRIES,
        );
        (store, clipboard)
    }

    fn entry(app: &str, raw: &str, clean: &str) -> TranscriptEntry {
        TranscriptEntry::new(app, raw, clean, InsertionStatus::Inserted)
    }

    #[tokio::test]
    async fn test_append_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_in(&dir);

        store.append(entry("a", "first", "first")).await.unwrap();
        store.append(entry("b", "second", "second")).await.unwrap();

        let recent = store.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].raw_text, "second");
        assert_eq!(recent[1].raw_text, "first");
    }

    #[tokio::test]
    async fn test_cap_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let clipboard = Arc::new(MemoryClipboard::new());
        let store = HistoryStore::new(dir.path().join("history.json"), clipboard, 3);

        for i in 0..5 {
            store
                .append(entry("app", &format!("raw {i}"), ""))
                .await
                .unwrap();
        }
        let recent = store.recent(10).await;
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].raw_text, "raw 4");
        assert_eq!(recent[2].raw_text, "raw 2");
    }

    #[tokio::test]
    async fn test_search_matches_raw_clean_and_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_in(&dir);

        store
            .append(entry("com.example.mail", "draft the budget email", "Budget email drafted"))
            .await
            .unwrap();
        store
            .append(entry("com.example.ide", "fix the parser", "Fix the parser"))
            .await
            .unwrap();

        assert_eq!(store.search("BUDGET").await.len(), 1);
        assert_eq!(store.search("example").await.len(), 2);
        assert_eq!(store.search("  ").await.len(), 2);
        assert!(store.search("nonexistent").await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_in(&dir);

        let first = entry("a", "one", "one");
        let id = first.id;
        store.append(first).await.unwrap();
        store.append(entry("b", "two", "two")).await.unwrap();

        store.delete(id).await.unwrap();
        let recent = store.recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].raw_text, "two");
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let clipboard: Arc<dyn ClipboardService> = Arc::new(MemoryClipboard::new());

        {
            let store = HistoryStore::new(path.clone(), clipboard.clone(), DEFAULT_MAX_ENTRIES);
            store.append(entry("app", "persisted", "Persisted")).await.unwrap();
        }

        let reloaded = HistoryStore::new(path, clipboard, DEFAULT_MAX_ENTRIES);
        let recent = reloaded.recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].clean_text, "Persisted");
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, b"[{broken").unwrap();

        let store = HistoryStore::new(
            path,
            Arc::new(MemoryClipboard::new()),
            DEFAULT_MAX_ENTRIES,
        );
        assert!(store.recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_paste_last_prefers_clean_text() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clipboard) = store_in(&dir);

        store.append(entry("app", "um raw text", "Clean text")).await.unwrap();
        let pasted = store.paste_last().await.unwrap();
        assert!(pasted.is_some());
        assert_eq!(clipboard.latest_value(), "Clean text");

        store.append(entry("app", "raw only", "")).await.unwrap();
        store.paste_last().await.unwrap();
        assert_eq!(clipboard.latest_value(), "raw only");
    }

    #[tokio::test]
    async fn test_paste_last_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_in(&dir);
        assert!(store.paste_last().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retry_updates_clean_text() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_in(&dir);

        let stored = entry("app", "Um I think uh this should stay clear.", "old clean");
        let id = stored.id;
        store.append(stored).await.unwrap();

        let engine = RuleBasedCleanupEngine;
        let retried = store
            .retry(
                id,
                &engine,
                &StyleProfile {
                    structure_mode: crate::profile::StructureMode::Natural,
                    ..StyleProfile::default()
                },
                &PersonalLexicon::default(),
                CloudTier::None,
            )
            .await
            .unwrap();
        assert_eq!(retried.text, "I think this should stay clear.");

        let recent = store.recent(1).await;
        assert_eq!(recent[0].clean_text, "I think this should stay clear.");
    }

    #[tokio::test]
    async fn test_retry_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_in(&dir);
        let engine = RuleBasedCleanupEngine;
        let result = store
            .retry(
                Uuid::new_v4(),
                &engine,
                &StyleProfile::default(),
                &PersonalLexicon::default(),
                CloudTier::None,
            )
            .await;
        assert!(matches!(result, Err(HistoryError::MissingEntry)));
    }
}
