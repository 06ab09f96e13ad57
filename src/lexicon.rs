//! Personal lexicon
//!
//! User-maintained term corrections ("kubernetes" → "Kubernetes"), scoped
//! either globally or to one application. Substitution is whole-word,
//! case-insensitive, longest term first so short terms cannot shadow phrases
//! that contain them.

use crate::context::AppContext;
use crate::transcript::{EditKind, TranscriptEdit};
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Where an entry applies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Global,
    App {
        bundle_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub term: String,
    pub preferred: String,
    #[serde(default)]
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PersonalLexicon {
    pub entries: Vec<LexiconEntry>,
}

/// Result of running lexicon substitution over a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconApplication {
    pub text: String,
    pub edits: Vec<TranscriptEdit>,
}

/// Applies every matching entry to the text, longest term first.
///
/// Free function so the cleanup engine can reuse it on a lexicon snapshot
/// without holding the service lock.
pub fn apply_lexicon(text: &str, lexicon: &PersonalLexicon) -> LexiconApplication {
    if text.is_empty() {
        return LexiconApplication {
            text: text.to_string(),
            edits: Vec::new(),
        };
    }

    let mut entries: Vec<&LexiconEntry> = lexicon.entries.iter().collect();
    entries.sort_by(|a, b| b.term.len().cmp(&a.term.len()));

    let mut updated = text.to_string();
    let mut edits = Vec::new();

    for entry in entries {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(&entry.term));
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        if re.is_match(&updated) {
            updated = re
                .replace_all(&updated, NoExpand(&entry.preferred))
                .into_owned();
            edits.push(TranscriptEdit::new(
                EditKind::LexiconCorrection,
                entry.term.clone(),
                entry.preferred.clone(),
            ));
        }
    }

    LexiconApplication {
        text: updated,
        edits,
    }
}

/// Serialized-access store of lexicon entries
pub struct PersonalLexiconService {
    entries: Mutex<Vec<LexiconEntry>>,
}

impl PersonalLexiconService {
    pub fn new(entries: Vec<LexiconEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Inserts or replaces the entry with the same term (case-insensitive)
    /// and scope. Blank terms are ignored.
    pub fn upsert(&self, term: impl Into<String>, preferred: impl Into<String>, scope: Scope) {
        let term = term.into();
        if term.trim().is_empty() {
            return;
        }
        let preferred = preferred.into();

        let mut entries = self.lock();
        if let Some(existing) = entries
            .iter_mut()
            .find(|e| e.term.eq_ignore_ascii_case(&term) && e.scope == scope)
        {
            existing.term = term;
            existing.preferred = preferred;
            return;
        }
        entries.push(LexiconEntry {
            term,
            preferred,
            scope,
        });
    }

    pub fn remove(&self, term: &str, scope: &Scope) {
        self.lock()
            .retain(|e| !(e.term.eq_ignore_ascii_case(term) && e.scope == *scope));
    }

    /// Snapshot of every entry regardless of scope
    pub fn snapshot(&self) -> PersonalLexicon {
        PersonalLexicon {
            entries: self.lock().clone(),
        }
    }

    /// Snapshot of the entries applicable to the given app context
    pub fn snapshot_for(&self, app: Option<&AppContext>) -> PersonalLexicon {
        let entries = self
            .lock()
            .iter()
            .filter(|entry| match &entry.scope {
                Scope::Global => true,
                Scope::App { bundle_id } => {
                    Some(bundle_id.as_str()) == app.map(|a| a.bundle_identifier.as_str())
                }
            })
            .cloned()
            .collect();
        PersonalLexicon { entries }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LexiconEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for PersonalLexiconService {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
