//! Snippet expansion
//!
//! Snippets expand a spoken trigger into verbatim text ("my email" → the
//! actual address) before any cleanup runs, so the expansion is never
//! rewritten. Matching is whole-word and case-insensitive.

use crate::context::AppContext;
use crate::lexicon::Scope;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub trigger: String,
    pub expansion: String,
    #[serde(default)]
    pub scope: Scope,
}

impl Snippet {
    pub fn new(trigger: impl Into<String>, expansion: impl Into<String>, scope: Scope) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger: trigger.into(),
            expansion: expansion.into(),
            scope,
        }
    }
}

/// Serialized-access store of snippets
pub struct SnippetService {
    snippets: Mutex<Vec<Snippet>>,
}

impl SnippetService {
    pub fn new(snippets: Vec<Snippet>) -> Self {
        Self {
            snippets: Mutex::new(snippets),
        }
    }

    pub fn upsert(&self, snippet: Snippet) {
        let mut snippets = self.lock();
        if let Some(existing) = snippets.iter_mut().find(|s| s.id == snippet.id) {
            *existing = snippet;
        } else {
            snippets.push(snippet);
        }
    }

    pub fn remove(&self, id: Uuid) {
        self.lock().retain(|s| s.id != id);
    }

    pub fn list(&self) -> Vec<Snippet> {
        self.lock().clone()
    }

    /// Expands every in-scope snippet trigger in the text
    pub fn apply(&self, text: &str, app: Option<&AppContext>) -> String {
        if text.is_empty() {
            return text.to_string();
        }

        let mut updated = text.to_string();
        for snippet in self.lock().iter() {
            let in_scope = match &snippet.scope {
                Scope::Global => true,
                Scope::App { bundle_id } => {
                    Some(bundle_id.as_str()) == app.map(|a| a.bundle_identifier.as_str())
                }
            };
            if in_scope {
                updated = expand(snippet, &updated);
            }
        }
        updated
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Snippet>> {
        self.snippets.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SnippetService {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn expand(snippet: &Snippet, text: &str) -> String {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(&snippet.trigger));
    match Regex::new(&pattern) {
        Ok(re) => re
            .replace_all(text, NoExpand(&snippet.expansion))
            .into_owned(),
        Err(_) => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_word_expansion() {
        let service = SnippetService::default();
        service.upsert(Snippet::new("my email", "dev@example.com", Scope::Global));

        let out = service.apply("send it to my email please", None);
        assert_eq!(out, "send it to dev@example.com please");
    }

    #[test]
    fn test_trigger_inside_word_not_expanded() {
        let service = SnippetService::default();
        service.upsert(Snippet::new("sig", "Best, Sam", Scope::Global));

        assert_eq!(service.apply("the design is done", None), "the design is done");
    }

    #[test]
    fn test_app_scoped_snippet() {
        let service = SnippetService::default();
        service.upsert(Snippet::new(
            "standup",
            "Daily standup notes:",
            Scope::App {
                bundle_id: "com.example.notes".to_string(),
            },
        ));

        let notes = AppContext::new("com.example.notes", "Notes");
        let other = AppContext::new("com.example.other", "Other");
        assert_eq!(
            service.apply("standup today", Some(&notes)),
            "Daily standup notes: today"
        );
        assert_eq!(service.apply("standup today", Some(&other)), "standup today");
    }

    #[test]
    fn test_upsert_by_id_replaces() {
        let service = SnippetService::default();
        let snippet = Snippet::new("sig", "old", Scope::Global);
        let id = snippet.id;
        service.upsert(snippet);
        service.upsert(Snippet {
            id,
            trigger: "sig".to_string(),
            expansion: "new".to_string(),
            scope: Scope::Global,
        });

        let all = service.list();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].expansion, "new");
    }
}
