//! Transcript cleanup engines
//!
//! Cleanup is pluggable: the rule-based engine runs fully offline and is the
//! guaranteed fallback; the remote and OpenAI engines call an HTTPS endpoint
//! and are gated by the budget guard. All engines share one contract: raw
//! transcript in, clean transcript with an edit audit trail out.

pub mod openai;
pub mod ranker;
pub mod rules;
pub mod remote;

use crate::error::CleanupError;
use crate::lexicon::PersonalLexicon;
use crate::profile::StyleProfile;
use crate::transcript::{CleanTranscript, CloudTier, RawTranscript};
use async_trait::async_trait;

pub use ranker::LocalCleanupRanker;
pub use rules::{RuleBasedCleanupCandidateGenerator, RuleBasedCleanupEngine};

/// Refines raw transcripts by applying the style profile, personal lexicon,
/// and filler policy.
#[async_trait]
pub trait CleanupEngine: Send + Sync {
    /// Cleans up one raw transcript. `tier` selects the cloud model class
    /// for engines that have one; local engines ignore it.
    async fn cleanup(
        &self,
        raw: &RawTranscript,
        profile: &StyleProfile,
        lexicon: &PersonalLexicon,
        tier: CloudTier,
    ) -> Result<CleanTranscript, CleanupError>;
}

/// Estimated request tokens for budget decisions: `max(1, words × 1.35)`.
pub fn estimated_tokens(text: &str) -> u64 {
    let word_count = text.split_whitespace().count();
    ((word_count as f64 * 1.35).round() as u64).max(1)
}

/// Collapses an HTTP error body into a single-line preview safe for logs and
/// error messages: newlines stripped, trimmed, capped at 240 characters.
pub(crate) fn sanitize_error_body_preview(body: &str) -> String {
    let cleaned = body.replace(['\n', '\r'], " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return "(no response body)".to_string();
    }

    const LIMIT: usize = 240;
    if cleaned.chars().count() <= LIMIT {
        return cleaned.to_string();
    }
    let truncated: String = cleaned.chars().take(LIMIT).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_tokens() {
        assert_eq!(estimated_tokens(""), 1);
        assert_eq!(estimated_tokens("one two three four"), 5); // 4 * 1.35 = 5.4 → 5
        assert_eq!(estimated_tokens("a b c d e f g h i j"), 14); // 10 * 1.35 = 13.5 → 14
    }

    #[test]
    fn test_sanitize_preview_strips_newlines() {
        assert_eq!(
            sanitize_error_body_preview("  line one\nline two\r\n  "),
            "line one line two"
        );
    }

    #[test]
    fn test_sanitize_preview_empty() {
        assert_eq!(sanitize_error_body_preview("\n\n"), "(no response body)");
    }

    #[test]
    fn test_sanitize_preview_truncates_at_240() {
        let body = "x".repeat(500);
        let preview = sanitize_error_body_preview(&body);
        assert_eq!(preview.chars().count(), 241); // 240 chars + ellipsis
        assert!(preview.ends_with('…'));
    }
}
