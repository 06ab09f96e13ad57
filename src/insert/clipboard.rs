//! Clipboard transport
//!
//! Copies text through a pluggable [`ClipboardService`] and optionally fires
//! an auto-paste hook afterwards. Either way the transport reports a copy,
//! never a direct insertion.

use super::{InsertOutcome, InsertionTransport};
use crate::context::AppContext;
use crate::error::InsertError;
use crate::transcript::InsertionMethod;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Delay between writing the clipboard and attempting a paste
const CLIPBOARD_SETTLE: Duration = Duration::from_millis(50);

/// Writes text to a system clipboard
#[async_trait]
pub trait ClipboardService: Send + Sync {
    async fn set_string(&self, text: &str) -> Result<(), InsertError>;
}

/// In-memory clipboard for tests and headless operation
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    latest: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_value(&self) -> String {
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ClipboardService for MemoryClipboard {
    async fn set_string(&self, text: &str) -> Result<(), InsertError> {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = text.to_string();
        Ok(())
    }
}

/// Clipboard backed by an external command (wl-copy, xclip) that reads the
/// text from stdin
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: String,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl ClipboardService for CommandClipboard {
    async fn set_string(&self, text: &str) -> Result<(), InsertError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InsertError::ClipboardNotFound(self.program.clone())
                } else {
                    InsertError::ClipboardFailed(e.to_string())
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| InsertError::ClipboardFailed(e.to_string()))?;
            // Close stdin to signal EOF.
            drop(stdin);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| InsertError::ClipboardFailed(e.to_string()))?;
        if !status.success() {
            return Err(InsertError::ClipboardFailed(format!(
                "{} exited with {status}",
                self.program
            )));
        }

        debug!("text copied to clipboard via {} ({} chars)", self.program, text.len());
        Ok(())
    }
}

/// What happened after the clipboard write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoPasteOutcome {
    Attempted,
    Skipped { reason: String },
}

impl AutoPasteOutcome {
    pub fn skipped_reason(&self) -> Option<String> {
        match self {
            AutoPasteOutcome::Attempted => None,
            AutoPasteOutcome::Skipped { reason } => Some(reason.clone()),
        }
    }
}

/// Issues a paste gesture into the target application
#[async_trait]
pub trait AutoPaste: Send + Sync {
    async fn paste(&self, target: &AppContext) -> AutoPasteOutcome;
}

/// Clipboard-backed insertion transport
pub struct ClipboardTransport {
    clipboard: Arc<dyn ClipboardService>,
    auto_paste: Option<Arc<dyn AutoPaste>>,
}

impl ClipboardTransport {
    pub fn new(clipboard: Arc<dyn ClipboardService>, auto_paste: Option<Arc<dyn AutoPaste>>) -> Self {
        Self {
            clipboard,
            auto_paste,
        }
    }
}

#[async_trait]
impl InsertionTransport for ClipboardTransport {
    fn method(&self) -> InsertionMethod {
        InsertionMethod::ClipboardPaste
    }

    async fn insert(&self, text: &str, target: &AppContext) -> Result<InsertOutcome, InsertError> {
        self.clipboard.set_string(text).await?;

        let Some(auto_paste) = &self.auto_paste else {
            return Ok(InsertOutcome::Copied {
                auto_paste_skipped: Some("Auto-paste callback not configured.".to_string()),
            });
        };

        tokio::time::sleep(CLIPBOARD_SETTLE).await;
        let outcome = auto_paste.paste(target).await;
        Ok(InsertOutcome::Copied {
            auto_paste_skipped: outcome.skipped_reason(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingPaster {
        outcome: AutoPasteOutcome,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl AutoPaste for RecordingPaster {
        async fn paste(&self, _target: &AppContext) -> AutoPasteOutcome {
            *self.calls.lock().unwrap() += 1;
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn test_memory_clipboard_stores_latest() {
        let clipboard = MemoryClipboard::new();
        clipboard.set_string("first").await.unwrap();
        clipboard.set_string("second").await.unwrap();
        assert_eq!(clipboard.latest_value(), "second");
    }

    #[tokio::test]
    async fn test_transport_without_auto_paste_reports_skip_reason() {
        let clipboard = Arc::new(MemoryClipboard::new());
        let transport = ClipboardTransport::new(clipboard.clone(), None);

        let outcome = transport
            .insert("copied text", &AppContext::unknown())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            InsertOutcome::Copied {
                auto_paste_skipped: Some("Auto-paste callback not configured.".to_string())
            }
        );
        assert_eq!(clipboard.latest_value(), "copied text");
    }

    #[tokio::test]
    async fn test_transport_with_auto_paste_attempted() {
        let paster = Arc::new(RecordingPaster {
            outcome: AutoPasteOutcome::Attempted,
            calls: Mutex::new(0),
        });
        let transport =
            ClipboardTransport::new(Arc::new(MemoryClipboard::new()), Some(paster.clone()));

        let outcome = transport
            .insert("text", &AppContext::unknown())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            InsertOutcome::Copied {
                auto_paste_skipped: None
            }
        );
        assert_eq!(*paster.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_transport_propagates_paste_skip_reason() {
        let paster = Arc::new(RecordingPaster {
            outcome: AutoPasteOutcome::Skipped {
                reason: "Remote desktop session active.".to_string(),
            },
            calls: Mutex::new(0),
        });
        let transport = ClipboardTransport::new(Arc::new(MemoryClipboard::new()), Some(paster));

        let outcome = transport
            .insert("text", &AppContext::unknown())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            InsertOutcome::Copied {
                auto_paste_skipped: Some("Remote desktop session active.".to_string())
            }
        );
    }
}
