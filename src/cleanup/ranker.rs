//! Local candidate ranking
//!
//! Scores every cleanup candidate against the raw transcript and picks the
//! best. Scoring weighs semantic preservation most heavily, then fluency,
//! with small penalties for heavy editing and a dominant penalty for
//! rewriting slash commands that should pass through untouched.

use crate::metrics::{self, TextNormalizer};
use crate::profile::{CommandPolicy, StyleProfile};
use crate::transcript::{CleanupCandidate, EditKind};
use regex::Regex;
use std::sync::OnceLock;

use super::rules::RAW_PASSTHROUGH_ID;

const PROTECTED_LIKE_PHRASES: [&str; 14] = [
    "seemed like",
    "seems like",
    "looks like",
    "looked like",
    "feel like",
    "felt like",
    "would like",
    "didn't like",
    "didnt like",
    "like that",
    "like this",
    "like a",
    "like an",
    "like to",
];

const UNAMBIGUOUS_FILLERS: [&str; 7] = [
    "um",
    "uh",
    "you know",
    "i mean",
    "basically",
    "sort of",
    "kind of",
];

fn interjectional_like_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(^|[.!?]\s+)like,\s+|,\s*like,\s*").expect("static pattern")
    })
}

fn leading_punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[,.!?;:]").expect("static pattern"))
}

/// Score breakdown for one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanupRankingScore {
    pub semantic_preservation_score: f64,
    pub fluency_score: f64,
    pub edit_distance_penalty: f64,
    pub command_safety_penalty: f64,
    pub total_score: f64,
}

#[derive(Debug, Clone)]
pub struct LocalCleanupRanker {
    normalizer: TextNormalizer,
}

impl LocalCleanupRanker {
    pub fn new() -> Self {
        Self {
            normalizer: TextNormalizer::default(),
        }
    }

    /// Picks the highest-scoring candidate. Ties inside a 1e-12 epsilon go to
    /// the lexicographically smaller rule path so ranking stays deterministic.
    pub fn best_candidate(
        &self,
        raw_text: &str,
        candidates: &[CleanupCandidate],
        profile: &StyleProfile,
    ) -> CleanupCandidate {
        let Some(first) = candidates.first() else {
            return CleanupCandidate {
                text: raw_text.to_string(),
                applied_edits: Vec::new(),
                removed_fillers: Vec::new(),
                rule_path_id: RAW_PASSTHROUGH_ID.to_string(),
            };
        };

        let mut best = first;
        let mut best_score = self.score_candidate(raw_text, first, profile);

        for candidate in &candidates[1..] {
            let score = self.score_candidate(raw_text, candidate, profile);
            if score.total_score > best_score.total_score + 1e-12 {
                best = candidate;
                best_score = score;
                continue;
            }
            if (score.total_score - best_score.total_score).abs() <= 1e-12
                && candidate.rule_path_id < best.rule_path_id
            {
                best = candidate;
                best_score = score;
            }
        }

        best.clone()
    }

    pub fn score_candidate(
        &self,
        raw_text: &str,
        candidate: &CleanupCandidate,
        profile: &StyleProfile,
    ) -> CleanupRankingScore {
        let semantic = self.semantic_preservation_score(raw_text, candidate);
        let fluency = fluency_score(&candidate.text);
        let edit_penalty = self.edit_distance_penalty(raw_text, &candidate.text);
        let command_penalty = command_safety_penalty(raw_text, &candidate.text, profile);

        let total =
            (semantic * 0.65) + (fluency * 0.25) - (edit_penalty * 0.10) - (command_penalty * 1.0);

        CleanupRankingScore {
            semantic_preservation_score: semantic,
            fluency_score: fluency,
            edit_distance_penalty: edit_penalty,
            command_safety_penalty: command_penalty,
            total_score: total,
        }
    }

    fn semantic_preservation_score(&self, raw_text: &str, candidate: &CleanupCandidate) -> f64 {
        let raw_normalized = self.normalizer.normalize(raw_text);
        let candidate_normalized = self.normalizer.normalize(&candidate.text);

        let mut score = 1.0;

        for phrase in PROTECTED_LIKE_PHRASES {
            if raw_normalized.contains(phrase) && !candidate_normalized.contains(phrase) {
                score -= 0.25;
            }
        }

        let risky_like_removals = candidate
            .removed_fillers
            .iter()
            .filter(|filler| filler.eq_ignore_ascii_case("like"))
            .count();
        if risky_like_removals > 0 {
            score -= (risky_like_removals as f64 * 0.15).min(0.3);
        }

        let raw_words = metrics::tokenize_words(&raw_normalized);
        let candidate_words = metrics::tokenize_words(&candidate_normalized);
        if raw_words.len() > candidate_words.len() && !raw_words.is_empty() {
            let dropped = raw_words.len() - candidate_words.len();
            let accounted_filler_drops = dropped.min(candidate.removed_fillers.len());
            let non_filler_drops = dropped - accounted_filler_drops;
            if non_filler_drops > 0 {
                score -= (non_filler_drops as f64 / raw_words.len() as f64).min(0.4);
            }
        }

        let safe_removed = candidate
            .removed_fillers
            .iter()
            .filter(|filler| is_unambiguous_filler(filler))
            .count();
        if safe_removed > 0 {
            score += (safe_removed as f64 * 0.1).min(0.2);
        }

        let lexicon_edits = candidate
            .applied_edits
            .iter()
            .filter(|edit| edit.kind == EditKind::LexiconCorrection)
            .count();
        if lexicon_edits > 0 {
            score += (lexicon_edits as f64 * 0.08).min(0.2);
        }

        if is_interjectional_like_removed(raw_text, candidate) {
            score += 0.15;
        }

        score.clamp(0.0, 1.2)
    }

    fn edit_distance_penalty(&self, raw_text: &str, candidate_text: &str) -> f64 {
        let raw_normalized = self.normalizer.normalize(raw_text);
        let candidate_normalized = self.normalizer.normalize(candidate_text);
        let raw_words = metrics::tokenize_words(&raw_normalized);
        let candidate_words = metrics::tokenize_words(&candidate_normalized);

        if raw_words == candidate_words {
            return 0.0;
        }
        if raw_words.is_empty() {
            return if candidate_words.is_empty() { 0.0 } else { 1.0 };
        }

        let distance = metrics::levenshtein(&raw_words, &candidate_words);
        (distance as f64 / raw_words.len().max(1) as f64).clamp(0.0, 1.0)
    }
}

impl Default for LocalCleanupRanker {
    fn default() -> Self {
        Self::new()
    }
}

fn fluency_score(text: &str) -> f64 {
    let mut score: f64 = 1.0;

    if leading_punctuation_re().is_match(text) {
        score -= 0.25;
    }
    if interjectional_like_re().is_match(text) {
        score -= 0.2;
    }
    if text.contains("  ") {
        score -= 0.2;
    }
    if text.contains(",.") || text.contains("..") {
        score -= 0.2;
    }

    score.clamp(0.0, 1.0)
}

/// A slash command under a passthrough profile must survive verbatim; any
/// rewrite zeroes out the candidate.
fn command_safety_penalty(raw_text: &str, candidate_text: &str, profile: &StyleProfile) -> f64 {
    if profile.command_policy != CommandPolicy::Passthrough {
        return 0.0;
    }
    let raw_trimmed = raw_text.trim();
    if !raw_trimmed.starts_with('/') {
        return 0.0;
    }
    if candidate_text.trim() == raw_trimmed {
        0.0
    } else {
        1.0
    }
}

fn is_unambiguous_filler(filler: &str) -> bool {
    let normalized = filler.trim().to_lowercase();
    UNAMBIGUOUS_FILLERS.contains(&normalized.as_str())
}

fn is_interjectional_like_removed(raw_text: &str, candidate: &CleanupCandidate) -> bool {
    let removed_like = candidate
        .removed_fillers
        .iter()
        .any(|filler| filler.eq_ignore_ascii_case("like"));
    if !removed_like {
        return false;
    }

    let re = interjectional_like_re();
    re.is_match(raw_text) && !re.is_match(&candidate.text)
}
