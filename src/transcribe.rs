//! Offline speech-to-text via the whisper.cpp CLI
//!
//! Runs whisper-cli as a subprocess against the captured WAV file and reads
//! the transcript back from its text output file. Audio never leaves the
//! machine.

use crate::error::TranscribeError;
use crate::transcript::RawTranscript;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

/// Converts captured audio into a raw transcript
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language_hints: &[String],
    ) -> Result<RawTranscript, TranscribeError>;
}

/// whisper-cli subprocess engine
#[derive(Debug, Clone)]
pub struct WhisperCliTranscriptionEngine {
    cli_path: PathBuf,
    model_path: PathBuf,
    additional_args: Vec<String>,
}

impl WhisperCliTranscriptionEngine {
    pub fn new(cli_path: PathBuf, model_path: PathBuf, additional_args: Vec<String>) -> Self {
        Self {
            cli_path,
            model_path,
            additional_args,
        }
    }

    /// Resolves a bare command name through PATH.
    pub fn resolve(
        cli: &str,
        model_path: PathBuf,
        additional_args: Vec<String>,
    ) -> Result<Self, TranscribeError> {
        let cli_path = which::which(cli)
            .map_err(|_| TranscribeError::CliNotFound(cli.to_string()))?;
        Ok(Self::new(cli_path, model_path, additional_args))
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperCliTranscriptionEngine {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language_hints: &[String],
    ) -> Result<RawTranscript, TranscribeError> {
        if !self.cli_path.exists() {
            return Err(TranscribeError::CliNotFound(
                self.cli_path.display().to_string(),
            ));
        }
        if !audio_path.exists() {
            return Err(TranscribeError::AudioMissing(
                audio_path.display().to_string(),
            ));
        }

        let output_base = std::env::temp_dir().join(format!("sotto-out-{}", Uuid::new_v4()));
        let txt_path = output_base.with_extension("txt");
        // The output file is removed on every exit path.
        let _txt_guard = RemoveOnDrop(txt_path.clone());

        let mut args: Vec<String> = vec![
            "-m".to_string(),
            self.model_path.display().to_string(),
            "-f".to_string(),
            audio_path.display().to_string(),
            "-of".to_string(),
            output_base.display().to_string(),
            "-otxt".to_string(),
            "-nt".to_string(),
        ];

        if let Some(code) = language_hints.first().and_then(|h| normalize_language(h)) {
            args.push("-l".to_string());
            args.push(code);
        }
        args.extend(self.additional_args.iter().cloned());

        debug!("running {} {:?}", self.cli_path.display(), args);
        let started = std::time::Instant::now();

        let output = Command::new(&self.cli_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(TranscribeError::FailedToRun {
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        if !txt_path.exists() {
            return Err(TranscribeError::OutputMissing);
        }
        let text = std::fs::read_to_string(&txt_path)?.trim().to_string();

        info!(
            "transcription completed in {:.2}s ({} chars)",
            started.elapsed().as_secs_f32(),
            text.len()
        );
        Ok(RawTranscript::from_text(text))
    }
}

/// Reduces a language hint like "en-US" to the bare ISO code whisper expects.
fn normalize_language(hint: &str) -> Option<String> {
    let lower = hint.to_lowercase();
    if lower == "en-us" || lower == "en" {
        return Some("en".to_string());
    }
    if lower.contains('-') {
        let prefix = lower.split('-').next().unwrap_or_default();
        return Some(prefix.to_string());
    }
    if lower.is_empty() {
        None
    } else {
        Some(lower)
    }
}

struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}
