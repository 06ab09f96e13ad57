//! Rule-based cleanup
//!
//! Deterministic, offline cleanup: generate a candidate per filler policy,
//! then let the ranker pick the best. Candidates are built in a fixed order —
//! filler removal, lexicon substitution, structure rewrite — with every step
//! recording its edits.

use super::ranker::LocalCleanupRanker;
use super::CleanupEngine;
use crate::error::CleanupError;
use crate::lexicon::{self, PersonalLexicon};
use crate::profile::{FillerPolicy, StructureMode, StyleProfile};
use crate::transcript::{
    CleanTranscript, CleanupCandidate, CloudTier, EditKind, RawTranscript, TranscriptEdit,
};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

pub(crate) const RAW_PASSTHROUGH_ID: &str = "raw-pass-through";

const BALANCED_FILLERS: [&str; 3] = ["um", "uh", "you know"];
const AGGRESSIVE_FILLERS: [&str; 4] = ["i mean", "basically", "sort of", "kind of"];

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

/// Sentence-initial discourse marker: "Like, ..."
fn sentence_initial_like_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(^|[.!?]\s+)like,\s+").expect("static pattern"))
}

/// Parenthetical discourse marker: ", like, ..."
fn parenthetical_like_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i),\s*like,\s*").expect("static pattern"))
}

/// Default local (non-cloud) cleanup engine
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedCleanupEngine;

#[async_trait]
impl CleanupEngine for RuleBasedCleanupEngine {
    async fn cleanup(
        &self,
        raw: &RawTranscript,
        profile: &StyleProfile,
        lexicon: &PersonalLexicon,
        _tier: CloudTier,
    ) -> Result<CleanTranscript, CleanupError> {
        let generator = RuleBasedCleanupCandidateGenerator;
        let candidates = generator.generate_candidates(raw, profile, lexicon);
        let ranker = LocalCleanupRanker::new();
        let best = ranker.best_candidate(&raw.text, &candidates, profile);

        Ok(CleanTranscript {
            text: best.text.clone(),
            edits: best.applied_edits.clone(),
            removed_fillers: best.removed_fillers.clone(),
            uncertainty_flags: Vec::new(),
            model_tier: CloudTier::None,
        })
    }
}

impl RuleBasedCleanupEngine {
    /// Builds one candidate for a specific profile variant.
    pub(crate) fn build_candidate(
        &self,
        raw: &RawTranscript,
        profile: &StyleProfile,
        lexicon: &PersonalLexicon,
        rule_path_id: &str,
    ) -> CleanupCandidate {
        let mut edits: Vec<TranscriptEdit> = Vec::new();

        let filler_result = remove_fillers(&raw.text, profile.filler_policy);
        let mut text = filler_result.text;
        let removed_fillers = filler_result.removed;
        edits.extend(filler_result.edits);

        let lexicon_result = lexicon::apply_lexicon(&text, lexicon);
        text = lexicon_result.text;
        edits.extend(lexicon_result.edits);

        let structure_result = apply_structure(&text, profile.structure_mode);
        text = structure_result.0;
        edits.extend(structure_result.1);

        CleanupCandidate {
            text,
            applied_edits: edits,
            removed_fillers,
            rule_path_id: rule_path_id.to_string(),
        }
    }
}

/// Produces the deterministic, deduplicated candidate set.
///
/// Always explores all three filler aggressiveness levels on top of the base
/// profile's tone/structure/command settings and lets the ranker arbitrate;
/// the raw passthrough candidate always comes first.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedCleanupCandidateGenerator;

impl RuleBasedCleanupCandidateGenerator {
    pub fn generate_candidates(
        &self,
        raw: &RawTranscript,
        profile: &StyleProfile,
        lexicon: &PersonalLexicon,
    ) -> Vec<CleanupCandidate> {
        let engine = RuleBasedCleanupEngine;
        let mut candidates = vec![CleanupCandidate {
            text: raw.text.clone(),
            applied_edits: Vec::new(),
            removed_fillers: Vec::new(),
            rule_path_id: RAW_PASSTHROUGH_ID.to_string(),
        }];

        for (path_id, policy) in [
            ("profile-minimal", FillerPolicy::Minimal),
            ("profile-balanced", FillerPolicy::Balanced),
            ("profile-aggressive", FillerPolicy::Aggressive),
        ] {
            let variant = StyleProfile {
                name: format!("{}-{}", profile.name, path_id.trim_start_matches("profile-")),
                filler_policy: policy,
                ..profile.clone()
            };
            candidates.push(engine.build_candidate(raw, &variant, lexicon, path_id));
        }

        deduplicated(candidates)
    }
}

fn deduplicated(candidates: Vec<CleanupCandidate>) -> Vec<CleanupCandidate> {
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.text.clone()))
        .collect()
}

struct FillerRemoval {
    text: String,
    removed: Vec<String>,
    edits: Vec<TranscriptEdit>,
}

fn remove_fillers(text: &str, policy: FillerPolicy) -> FillerRemoval {
    if policy == FillerPolicy::Minimal {
        return FillerRemoval {
            text: text.to_string(),
            removed: Vec::new(),
            edits: Vec::new(),
        };
    }

    let direct_fillers: Vec<&str> = match policy {
        FillerPolicy::Balanced => BALANCED_FILLERS.to_vec(),
        _ => BALANCED_FILLERS
            .iter()
            .chain(AGGRESSIVE_FILLERS.iter())
            .copied()
            .collect(),
    };

    let mut updated = text.to_string();
    let mut removed = Vec::new();
    let mut edits = Vec::new();

    for filler in direct_fillers {
        let (next, count) = strip_filler_word(&updated, filler);
        if count > 0 {
            updated = next;
            removed.extend(std::iter::repeat(filler.to_string()).take(count));
            edits.push(TranscriptEdit::new(EditKind::FillerRemoval, filler, ""));
        }
    }

    let (next, like_count) = remove_interjectional_like(&updated);
    updated = next;
    if like_count > 0 {
        removed.extend(std::iter::repeat("like".to_string()).take(like_count));
        edits.push(TranscriptEdit::new(EditKind::FillerRemoval, "like", ""));
    }

    updated = collapse_whitespace(&updated);
    FillerRemoval {
        text: updated,
        removed,
        edits,
    }
}

/// Removes standalone occurrences of a filler word or phrase.
///
/// A match must be preceded by start-of-text or whitespace and followed by
/// whitespace, sentence punctuation, or end-of-text; the trailing context is
/// checked manually (and left in place) since the regex crate has no
/// lookahead. Each removal is replaced by a single space, collapsed later.
fn strip_filler_word(text: &str, filler: &str) -> (String, usize) {
    let pattern = format!(r"(?i)(?:^|\s){}", regex::escape(filler));
    let Ok(re) = Regex::new(&pattern) else {
        return (text.to_string(), 0);
    };

    let mut output = String::with_capacity(text.len());
    let mut last = 0;
    let mut count = 0;

    for m in re.find_iter(text) {
        let boundary_ok = match text[m.end()..].chars().next() {
            None => true,
            Some(c) => c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?'),
        };
        if !boundary_ok {
            continue;
        }
        output.push_str(&text[last..m.start()]);
        output.push(' ');
        last = m.end();
        count += 1;
    }
    output.push_str(&text[last..]);
    (output, count)
}

/// Removes interjectional "like" discourse markers: sentence-initial
/// ("Like, we should...") and parenthetical ("...and, like, then...").
/// Independent of the general filler list.
fn remove_interjectional_like(text: &str) -> (String, usize) {
    let mut updated = text.to_string();
    let mut removed = 0;

    let initial = sentence_initial_like_re();
    let count = initial.find_iter(&updated).count();
    if count > 0 {
        updated = initial.replace_all(&updated, "${1}").into_owned();
        removed += count;
    }

    let parenthetical = parenthetical_like_re();
    let count = parenthetical.find_iter(&updated).count();
    if count > 0 {
        updated = parenthetical.replace_all(&updated, ", ").into_owned();
        removed += count;
    }

    (updated, removed)
}

fn apply_structure(text: &str, mode: StructureMode) -> (String, Vec<TranscriptEdit>) {
    match mode {
        StructureMode::Natural | StructureMode::Command => (text.to_string(), Vec::new()),
        StructureMode::Paragraph => (
            capitalized_sentence(text.trim()),
            vec![TranscriptEdit::new(
                EditKind::StructureRewrite,
                "raw",
                "paragraph",
            )],
        ),
        StructureMode::Bullets => {
            let bullets = split_into_clauses(text)
                .into_iter()
                .map(|clause| format!("- {clause}"))
                .collect::<Vec<_>>()
                .join("\n");
            (
                bullets,
                vec![TranscriptEdit::new(
                    EditKind::StructureRewrite,
                    "raw",
                    "bullets",
                )],
            )
        }
        StructureMode::Email => {
            let body = capitalized_sentence(text.trim());
            (
                format!("Hi,\n\n{body}\n\nThanks,"),
                vec![TranscriptEdit::new(
                    EditKind::StructureRewrite,
                    "raw",
                    "email",
                )],
            )
        }
    }
}

fn split_into_clauses(text: &str) -> Vec<String> {
    let pieces: Vec<String> = text
        .split([',', '.', ';'])
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(capitalized_sentence)
        .collect();

    if pieces.is_empty() {
        vec![capitalized_sentence(text)]
    } else {
        pieces
    }
}

fn capitalized_sentence(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => text.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    whitespace_re().replace_all(text, " ").trim().to_string()
}
