//! Audio capture
//!
//! Capture is session-scoped: begin starts a recorder writing a temp WAV,
//! end stops it and hands the file path to the caller, cancel stops it and
//! deletes the file. The subprocess implementation drives an external
//! recorder command (pw-record, arecord); the synthetic implementation
//! writes silence and exists for tests and headless runs.

use crate::error::CaptureError;
use crate::transcript::SessionId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Session-scoped microphone recording
#[async_trait]
pub trait AudioCaptureService: Send + Sync {
    async fn begin_capture(&self, session: SessionId) -> Result<(), CaptureError>;

    /// Stops the recorder and returns the path of the captured audio file.
    async fn end_capture(&self, session: SessionId) -> Result<PathBuf, CaptureError>;

    /// Stops the recorder and deletes the audio file. Unknown sessions are a
    /// no-op.
    async fn cancel_capture(&self, session: SessionId);
}

fn temp_audio_path(session: SessionId) -> PathBuf {
    std::env::temp_dir().join(format!("sotto-audio-{session}.wav"))
}

struct ActiveRecorder {
    child: Child,
    path: PathBuf,
}

/// Capture backed by an external recorder command. The output path is
/// appended as the final argument.
pub struct CommandCaptureService {
    program: String,
    args: Vec<String>,
    active: Mutex<HashMap<SessionId, ActiveRecorder>>,
}

impl CommandCaptureService {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            active: Mutex::new(HashMap::new()),
        }
    }

    fn take(&self, session: SessionId) -> Option<ActiveRecorder> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&session)
    }

    async fn stop(recorder: ActiveRecorder) -> (PathBuf, Option<(i32, String)>) {
        let ActiveRecorder { mut child, path } = recorder;
        // The recorder writes until killed; terminating it finalizes the file.
        if let Err(e) = child.start_kill() {
            warn!("failed to signal recorder: {e}");
        }
        let failure = match child.wait_with_output().await {
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                // Killed recorders report no exit code; that is the normal
                // stop path, not a failure.
                output.status.code().filter(|&c| c != 0).map(|c| (c, stderr))
            }
            Err(e) => Some((-1, e.to_string())),
        };
        (path, failure)
    }
}

#[async_trait]
impl AudioCaptureService for CommandCaptureService {
    async fn begin_capture(&self, session: SessionId) -> Result<(), CaptureError> {
        let path = temp_audio_path(session);
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::SpawnFailed(format!("{}: {e}", self.program)))?;

        debug!(%session, "recorder started: {}", self.program);
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session, ActiveRecorder { child, path });
        Ok(())
    }

    async fn end_capture(&self, session: SessionId) -> Result<PathBuf, CaptureError> {
        let recorder = self
            .take(session)
            .ok_or_else(|| CaptureError::NoActiveCapture(session.to_string()))?;

        let (path, failure) = Self::stop(recorder).await;

        if !path.exists() {
            if let Some((status, stderr)) = failure {
                return Err(CaptureError::RecorderFailed { status, stderr });
            }
            return Err(CaptureError::OutputMissing(path.display().to_string()));
        }
        Ok(path)
    }

    async fn cancel_capture(&self, session: SessionId) {
        let Some(recorder) = self.take(session) else {
            return;
        };
        let (path, _) = Self::stop(recorder).await;
        let _ = std::fs::remove_file(path);
        debug!(%session, "capture cancelled");
    }
}

/// Capture that records nothing and produces a short silent WAV, used by
/// tests and the dry-run paths
#[derive(Default)]
pub struct SilentCaptureService {
    active: Mutex<HashMap<SessionId, PathBuf>>,
}

impl SilentCaptureService {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_silence(path: &PathBuf) -> Result<(), CaptureError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| CaptureError::SpawnFailed(e.to_string()))?;
        for _ in 0..16_000 {
            writer
                .write_sample(0i16)
                .map_err(|e| CaptureError::SpawnFailed(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CaptureError::SpawnFailed(e.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, PathBuf>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AudioCaptureService for SilentCaptureService {
    async fn begin_capture(&self, session: SessionId) -> Result<(), CaptureError> {
        self.lock().insert(session, temp_audio_path(session));
        Ok(())
    }

    async fn end_capture(&self, session: SessionId) -> Result<PathBuf, CaptureError> {
        let path = self
            .lock()
            .remove(&session)
            .ok_or_else(|| CaptureError::NoActiveCapture(session.to_string()))?;
        Self::write_silence(&path)?;
        Ok(path)
    }

    async fn cancel_capture(&self, session: SessionId) {
        if let Some(path) = self.lock().remove(&session) {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_silent_capture_produces_wav() {
        let service = SilentCaptureService::new();
        let session = SessionId::new();

        service.begin_capture(session).await.unwrap();
        let path = service.end_capture(session).await.unwrap();
        assert!(path.exists());

        let reader = hound::WavReader::open(&path).expect("valid wav");
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.spec().channels, 1);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_end_without_begin_is_no_active_capture() {
        let service = SilentCaptureService::new();
        let result = service.end_capture(SessionId::new()).await;
        assert!(matches!(result, Err(CaptureError::NoActiveCapture(_))));
    }

    #[tokio::test]
    async fn test_cancel_removes_audio_file() {
        let service = SilentCaptureService::new();
        let session = SessionId::new();
        service.begin_capture(session).await.unwrap();
        service.cancel_capture(session).await;
        assert!(!temp_audio_path(session).exists());

        // Cancelling an unknown session is a no-op.
        service.cancel_capture(SessionId::new()).await;
    }

    #[tokio::test]
    async fn test_command_capture_missing_program() {
        let service = CommandCaptureService::new("definitely-not-a-recorder-xyz", Vec::new());
        let result = service.begin_capture(SessionId::new()).await;
        assert!(matches!(result, Err(CaptureError::SpawnFailed(_))));
    }

    #[tokio::test]
    async fn test_command_capture_end_with_written_file() {
        // `sleep` stands in for a recorder; pre-create the output file the
        // way a real recorder would.
        let service = CommandCaptureService::new("sleep", vec!["30".to_string()]);
        let session = SessionId::new();
        service.begin_capture(session).await.unwrap();
        std::fs::write(temp_audio_path(session), b"RIFF").unwrap();

        let path = service.end_capture(session).await.unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_file(path);
    }
}
