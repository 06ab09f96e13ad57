//! Transcript data model
//!
//! Raw transcripts come out of the transcription engine once per session and
//! are immutable afterwards. Cleanup produces a `CleanTranscript` carrying an
//! audit trail of edits; insertion produces an `InsertResult`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque token scoping one begin-capture → insert → history-append cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recognized span of speech with timing and optional confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_ms: u32,
    pub end_ms: u32,
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Output of the transcription engine, before any cleanup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTranscript {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub avg_confidence: Option<f64>,
    #[serde(default)]
    pub duration_ms: u32,
}

impl RawTranscript {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            segments: Vec::new(),
            avg_confidence: None,
            duration_ms: 0,
        }
    }
}

/// What kind of transformation an edit applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditKind {
    FillerRemoval,
    LexiconCorrection,
    StructureRewrite,
    Punctuation,
    CommandTransform,
}

/// Audit record of one transformation applied to the raw text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEdit {
    pub kind: EditKind,
    pub from: String,
    pub to: String,
}

impl TranscriptEdit {
    pub fn new(kind: EditKind, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            kind,
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Cloud cleanup cost class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CloudTier {
    Premium,
    Economical,
    #[default]
    None,
}

/// Cleaned-up transcript, ready for insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanTranscript {
    pub text: String,
    #[serde(default)]
    pub edits: Vec<TranscriptEdit>,
    #[serde(default)]
    pub removed_fillers: Vec<String>,
    /// Human-readable notes about degraded or uncertain processing
    #[serde(default)]
    pub uncertainty_flags: Vec<String>,
    #[serde(default)]
    pub model_tier: CloudTier,
}

impl CleanTranscript {
    pub fn passthrough(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            edits: Vec::new(),
            removed_fillers: Vec::new(),
            uncertainty_flags: Vec::new(),
            model_tier: CloudTier::None,
        }
    }
}

/// One possible cleanup of a raw transcript
///
/// Candidates carry the rule path that produced them so ranking ties can be
/// broken deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupCandidate {
    pub text: String,
    #[serde(default)]
    pub applied_edits: Vec<TranscriptEdit>,
    #[serde(default)]
    pub removed_fillers: Vec<String>,
    pub rule_path_id: String,
}

/// One strategy for delivering text into a target application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionMethod {
    Direct,
    Accessibility,
    ClipboardPaste,
    None,
}

impl std::fmt::Display for InsertionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InsertionMethod::Direct => "direct",
            InsertionMethod::Accessibility => "accessibility",
            InsertionMethod::ClipboardPaste => "clipboardPaste",
            InsertionMethod::None => "none",
        };
        write!(f, "{name}")
    }
}

/// How an insertion attempt ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsertionStatus {
    Inserted,
    CopiedOnly,
    Failed,
}

/// Outcome of running the insertion transport chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertResult {
    pub status: InsertionStatus,
    pub method: InsertionMethod,
    pub inserted_text: String,
    #[serde(default)]
    pub error_message: Option<String>,
}
