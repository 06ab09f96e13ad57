//! Recording lifecycle state machine
//!
//! Pure state machine governing press-to-talk and hands-free recording:
//! Idle → Recording(one mode) → Transcribing → Idle. Only one mode can be
//! active at a time, and `Transcribing` is exited exclusively through the
//! `mark_transcription_*` calls, so sessions can never overlap.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingMode {
    PressToTalk,
    HandsFree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingLifecycleState {
    Idle,
    RecordingPressToTalk,
    RecordingHandsFree,
    Transcribing,
}

impl RecordingLifecycleState {
    /// Short name for state files and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingLifecycleState::Idle => "idle",
            RecordingLifecycleState::RecordingPressToTalk
            | RecordingLifecycleState::RecordingHandsFree => "recording",
            RecordingLifecycleState::Transcribing => "transcribing",
        }
    }
}

/// What a hotkey event did to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingTransition {
    Start(RecordingMode),
    Stop(RecordingMode),
    Ignore(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingStateMachine {
    state: RecordingLifecycleState,
}

impl RecordingStateMachine {
    pub fn new() -> Self {
        Self {
            state: RecordingLifecycleState::Idle,
        }
    }

    pub fn state(&self) -> RecordingLifecycleState {
        self.state
    }

    pub fn handle_option_key_down(&mut self) -> RecordingTransition {
        match self.state {
            RecordingLifecycleState::Idle => {
                self.state = RecordingLifecycleState::RecordingPressToTalk;
                RecordingTransition::Start(RecordingMode::PressToTalk)
            }
            RecordingLifecycleState::RecordingPressToTalk => RecordingTransition::Ignore(
                "Already recording with hold-to-talk.".to_string(),
            ),
            RecordingLifecycleState::RecordingHandsFree => {
                RecordingTransition::Ignore("Hands-free recording is active.".to_string())
            }
            RecordingLifecycleState::Transcribing => RecordingTransition::Ignore(
                "Still transcribing the previous session.".to_string(),
            ),
        }
    }

    pub fn handle_option_key_up(&mut self) -> RecordingTransition {
        match self.state {
            RecordingLifecycleState::RecordingPressToTalk => {
                self.state = RecordingLifecycleState::Transcribing;
                RecordingTransition::Stop(RecordingMode::PressToTalk)
            }
            RecordingLifecycleState::Idle => {
                RecordingTransition::Ignore("No active hold-to-talk recording.".to_string())
            }
            RecordingLifecycleState::RecordingHandsFree => {
                RecordingTransition::Ignore("Hands-free recording is active.".to_string())
            }
            RecordingLifecycleState::Transcribing => RecordingTransition::Ignore(
                "Still transcribing the previous session.".to_string(),
            ),
        }
    }

    pub fn handle_hands_free_toggle(&mut self) -> RecordingTransition {
        match self.state {
            RecordingLifecycleState::Idle => {
                self.state = RecordingLifecycleState::RecordingHandsFree;
                RecordingTransition::Start(RecordingMode::HandsFree)
            }
            RecordingLifecycleState::RecordingHandsFree => {
                self.state = RecordingLifecycleState::Transcribing;
                RecordingTransition::Stop(RecordingMode::HandsFree)
            }
            RecordingLifecycleState::RecordingPressToTalk => {
                RecordingTransition::Ignore("Hold-to-talk is active.".to_string())
            }
            RecordingLifecycleState::Transcribing => RecordingTransition::Ignore(
                "Still transcribing the previous session.".to_string(),
            ),
        }
    }

    pub fn mark_transcription_completed(&mut self) {
        self.state = RecordingLifecycleState::Idle;
    }

    pub fn mark_transcription_failed(&mut self) {
        self.state = RecordingLifecycleState::Idle;
    }
}

impl Default for RecordingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
