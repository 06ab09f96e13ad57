//! Sotto: private, local-first dictation
//!
//! This library provides the core functionality for:
//! - Capturing speech through an external recorder command
//! - Transcribing audio offline with whisper.cpp (whisper-cli)
//! - Cleaning transcripts (filler removal, lexicon, structure) with local
//!   rule-based candidates ranked offline, optionally arbitrated to a cloud
//!   engine under a monthly budget guard
//! - Inserting the cleaned text into the focused application via a
//!   typing/clipboard transport chain
//! - Keeping a searchable transcript history with retry and re-paste
//!
//! # Architecture
//!
//! ```text
//!   hotkey events                 ┌─────────────────────────────┐
//!  ───────────────▶  Daemon ───▶ │     SessionCoordinator      │
//!                                └─────────────────────────────┘
//!                                   │          │           │
//!                     begin/end     │          │           │
//!                        ▼          ▼          ▼           ▼
//!                   ┌─────────┐ ┌────────┐ ┌────────┐ ┌─────────┐
//!                   │ Capture │ │Whisper │ │Cleanup │ │ Insert  │
//!                   │(command)│ │ (CLI)  │ │        │ │ (chain) │
//!                   └─────────┘ └────────┘ └────────┘ └─────────┘
//!                                              │
//!                            candidates + ranking (offline)
//!                                              │
//!                              budget guard ──▶ cloud engine
//!                                              │   (optional)
//!                                              ▼
//!                                       history store
//! ```
//!
//! Audio never leaves the machine; cloud engines only ever see text, and only
//! when the budget guard authorizes the call.

pub mod bench;
pub mod budget;
pub mod capture;
pub mod cleanup;
pub mod config;
pub mod context;
pub mod daemon;
pub mod error;
pub mod history;
pub mod hotkey;
pub mod insert;
pub mod lexicon;
pub mod metrics;
pub mod profile;
pub mod session;
pub mod snippet;
pub mod state;
pub mod transcribe;
pub mod transcript;

pub use config::Config;
pub use daemon::{Daemon, HotkeyEvent};
pub use error::{Result, SottoError};
pub use session::SessionCoordinator;
