//! Text insertion
//!
//! Delivers cleaned transcripts into the focused application through an
//! ordered chain of transports. Transports are tried in priority order and
//! the first success wins; terminal-style applications that mangle synthetic
//! keystrokes get the clipboard transport moved to the front. A clipboard
//! delivery is always reported as copied-only since the text still needs a
//! paste to land.

pub mod clipboard;
pub mod typer;

use crate::context::AppContext;
use crate::error::InsertError;
use crate::transcript::{InsertResult, InsertionMethod, InsertionStatus};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub use clipboard::{
    AutoPaste, AutoPasteOutcome, ClipboardService, ClipboardTransport, CommandClipboard,
    MemoryClipboard,
};
pub use typer::CommandTypeTransport;

/// Bundle identifiers of terminal-style apps where synthetic keystrokes are
/// unreliable; for these the clipboard transport goes first.
const TERMINAL_CLIPBOARD_FIRST_BUNDLE_IDS: [&str; 4] = [
    "dev.warp.warp-stable",
    "com.openai.codex",
    "com.apple.terminal",
    "com.googlecode.iterm2",
];

/// How a single transport delivered the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Text landed in the target application directly.
    Delivered,
    /// Text was placed on the clipboard; `auto_paste_skipped` carries the
    /// reason when no paste was attempted.
    Copied { auto_paste_skipped: Option<String> },
}

/// One strategy for delivering text into the focused application
#[async_trait]
pub trait InsertionTransport: Send + Sync {
    fn method(&self) -> InsertionMethod;

    async fn insert(&self, text: &str, target: &AppContext) -> Result<InsertOutcome, InsertError>;
}

/// Runs the transport chain and reports a single [`InsertResult`]
pub struct InsertionService {
    transports: Vec<Arc<dyn InsertionTransport>>,
    extra_clipboard_first: Vec<String>,
}

impl InsertionService {
    pub fn new(transports: Vec<Arc<dyn InsertionTransport>>) -> Self {
        Self {
            transports,
            extra_clipboard_first: Vec::new(),
        }
    }

    /// Additional bundle identifiers (beyond the built-in terminal list) that
    /// should receive the clipboard transport first.
    pub fn with_clipboard_first_apps(mut self, bundle_ids: Vec<String>) -> Self {
        self.extra_clipboard_first = bundle_ids
            .into_iter()
            .map(|id| id.to_lowercase())
            .collect();
        self
    }

    pub async fn insert(&self, text: &str, target: &AppContext) -> InsertResult {
        let mut failures: Vec<String> = Vec::new();

        for transport in self.prioritized_transports(target) {
            match transport.insert(text, target).await {
                Ok(InsertOutcome::Delivered) => {
                    let status = if transport.method() == InsertionMethod::ClipboardPaste {
                        InsertionStatus::CopiedOnly
                    } else {
                        InsertionStatus::Inserted
                    };
                    debug!(method = %transport.method(), "insertion succeeded");
                    return InsertResult {
                        status,
                        method: transport.method(),
                        inserted_text: text.to_string(),
                        error_message: None,
                    };
                }
                Ok(InsertOutcome::Copied { auto_paste_skipped }) => {
                    debug!("text copied to clipboard");
                    return InsertResult {
                        status: InsertionStatus::CopiedOnly,
                        method: InsertionMethod::ClipboardPaste,
                        inserted_text: text.to_string(),
                        error_message: auto_paste_skipped,
                    };
                }
                Err(e) => {
                    warn!(method = %transport.method(), "insertion transport failed: {e}");
                    failures.push(format!("{}: {e}", transport.method()));
                }
            }
        }

        InsertResult {
            status: InsertionStatus::Failed,
            method: InsertionMethod::None,
            inserted_text: text.to_string(),
            error_message: (!failures.is_empty()).then(|| failures.join(" | ")),
        }
    }

    fn prioritized_transports(&self, target: &AppContext) -> Vec<Arc<dyn InsertionTransport>> {
        let bundle = target.bundle_identifier.to_lowercase();
        if !TERMINAL_CLIPBOARD_FIRST_BUNDLE_IDS.contains(&bundle.as_str())
            && !self.extra_clipboard_first.contains(&bundle)
        {
            return self.transports.clone();
        }

        let (clipboard, others): (Vec<_>, Vec<_>) = self
            .transports
            .iter()
            .cloned()
            .partition(|t| t.method() == InsertionMethod::ClipboardPaste);
        clipboard.into_iter().chain(others).collect()
    }
}
