//! Error types for sotto
//!
//! Uses thiserror for ergonomic error definitions. Lower layers (ranker,
//! candidate generator, budget guard) are non-throwing; these types cover the
//! boundaries where capture, transcription, cleanup, insertion, or persistence
//! can actually fail.

use thiserror::Error;

/// Top-level error type for the sotto application
#[derive(Error, Debug)]
pub enum SottoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Cleanup error: {0}")]
    Cleanup(#[from] CleanupError),

    #[error("Insertion error: {0}")]
    Insert(#[from] InsertError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("History error: {0}")]
    History(#[from] HistoryError),

    #[error("Benchmark error: {0}")]
    Bench(#[from] BenchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to audio capture
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No capture in progress for session {0}")]
    NoActiveCapture(String),

    #[error("Capture command not configured. Set [capture] command in config.")]
    NotConfigured,

    #[error("Recorder failed to start: {0}")]
    SpawnFailed(String),

    #[error("Recorder exited with status {status}: {stderr}")]
    RecorderFailed { status: i32, stderr: String },

    #[error("Recorder produced no audio file at {0}")]
    OutputMissing(String),
}

/// Errors related to speech-to-text transcription
#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("whisper-cli not found at: {0}")]
    CliNotFound(String),

    #[error("whisper-cli failed with status {status}: {stderr}")]
    FailedToRun { status: i32, stderr: String },

    #[error("whisper-cli completed but transcript output was missing")]
    OutputMissing,

    #[error("Audio file not found: {0}")]
    AudioMissing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error during transcription: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to transcript cleanup
#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("Cleanup endpoint must use HTTPS: {0}")]
    InsecureEndpoint(String),

    #[error("Cleanup request failed with status {status}: {body_preview}")]
    HttpFailure { status: u16, body_preview: String },

    #[error("Cleanup returned no content")]
    MissingContent,

    #[error("Cleanup response could not be decoded: {0}")]
    DecodingFailure(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Errors related to text insertion
#[derive(Error, Debug)]
pub enum InsertError {
    #[error("Typing command not found: {0}")]
    TyperNotFound(String),

    #[error("Clipboard command not found: {0}")]
    ClipboardNotFound(String),

    #[error("Text injection failed: {0}")]
    InjectionFailed(String),

    #[error("Clipboard write failed: {0}")]
    ClipboardFailed(String),

    #[error("No focused element accepts text")]
    NoFocusedElement,
}

/// Errors surfaced by the session coordinator
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found")]
    SessionNotFound,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Transcribe(#[from] TranscribeError),

    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Errors related to transcript history persistence
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Transcript entry not found")]
    MissingEntry,

    #[error("Unable to persist transcript history: {0}")]
    PersistenceFailed(String),

    #[error(transparent)]
    Cleanup(#[from] CleanupError),

    #[error(transparent)]
    Insert(#[from] InsertError),
}

/// Errors raised by the benchmark runner and validators
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Malformed manifest {path}: {reason}")]
    MalformedManifest { path: String, reason: String },

    #[error("Report is missing required metric: {0}")]
    MissingMetric(String),

    #[error("Pipeline WER delta {actual} exceeded max allowed {max_allowed}")]
    WerDeltaExceeded { actual: f64, max_allowed: f64 },

    #[error("Pipeline CER delta {actual} exceeded max allowed {max_allowed}")]
    CerDeltaExceeded { actual: f64, max_allowed: f64 },

    #[error("Pipeline regressed sample count {actual} exceeded max allowed {max_allowed}")]
    RegressedSamplesExceeded { actual: usize, max_allowed: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using SottoError
pub type Result<T> = std::result::Result<T, SottoError>;
