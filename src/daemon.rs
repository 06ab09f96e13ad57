//! Daemon event loop
//!
//! Bridges raw hotkey events into the session coordinator: the state machine
//! decides what each event means, the toggle gate debounces the hands-free
//! key, and the lifecycle state is mirrored to an optional state file for
//! status bars and other external integrations.

use crate::context::AppContextProvider;
use crate::error::Result;
use crate::hotkey::{HotkeySignal, HotkeyToggleGate};
use crate::session::SessionCoordinator;
use crate::state::{RecordingStateMachine, RecordingTransition};
use crate::transcript::SessionId;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Raw hotkey events from the platform listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    OptionKeyDown,
    OptionKeyUp,
    HandsFreeKeyDown,
    HandsFreeKeyUp,
    Shutdown,
}

/// Mirrors the lifecycle state for external integrations (status bars)
fn write_state_file(path: &PathBuf, state: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("failed to create state file directory: {e}");
            return;
        }
    }
    if let Err(e) = std::fs::write(path, state) {
        tracing::warn!("failed to write state file: {e}");
    }
}

fn cleanup_state_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("failed to remove state file: {e}");
        }
    }
}

pub struct Daemon {
    coordinator: Arc<SessionCoordinator>,
    context_provider: Arc<dyn AppContextProvider>,
    machine: RecordingStateMachine,
    gate: HotkeyToggleGate,
    state_file: Option<PathBuf>,
    language_hints: Vec<String>,
    current_session: Option<SessionId>,
}

impl Daemon {
    pub fn new(
        coordinator: Arc<SessionCoordinator>,
        context_provider: Arc<dyn AppContextProvider>,
        state_file: Option<PathBuf>,
        language_hints: Vec<String>,
    ) -> Self {
        Self {
            coordinator,
            context_provider,
            machine: RecordingStateMachine::new(),
            gate: HotkeyToggleGate::default(),
            state_file,
            language_hints,
            current_session: None,
        }
    }

    /// Runs until the channel closes, a shutdown event arrives, or the
    /// process receives SIGTERM/SIGINT.
    pub async fn run(&mut self, mut events: mpsc::Receiver<HotkeyEvent>) -> Result<()> {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        self.write_state();
        info!("daemon started");

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(HotkeyEvent::Shutdown) | None => break,
                        Some(event) => self.handle_event(event).await,
                    }
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("received Ctrl-C, shutting down");
                    break;
                }
            }
        }

        // A recording left behind on shutdown is cancelled, not transcribed.
        if let Some(session) = self.current_session.take() {
            self.coordinator.cancel(session).await;
        }
        if let Some(path) = &self.state_file {
            cleanup_state_file(path);
        }
        info!("daemon stopped");
        Ok(())
    }

    pub async fn handle_event(&mut self, event: HotkeyEvent) {
        match event {
            HotkeyEvent::OptionKeyDown => {
                let transition = self.machine.handle_option_key_down();
                self.apply_transition(transition).await;
            }
            HotkeyEvent::OptionKeyUp => {
                let transition = self.machine.handle_option_key_up();
                self.apply_transition(transition).await;
            }
            HotkeyEvent::HandsFreeKeyDown => {
                self.gate.consume(HotkeySignal::Pressed);
            }
            HotkeyEvent::HandsFreeKeyUp => {
                if self.gate.consume(HotkeySignal::Released) {
                    let transition = self.machine.handle_hands_free_toggle();
                    self.apply_transition(transition).await;
                }
            }
            HotkeyEvent::Shutdown => {}
        }
    }

    pub fn state(&self) -> crate::state::RecordingLifecycleState {
        self.machine.state()
    }

    async fn apply_transition(&mut self, transition: RecordingTransition) {
        match transition {
            RecordingTransition::Start(mode) => {
                let context = self.context_provider.frontmost().await;
                debug!(?mode, app = %context.bundle_identifier, "starting recording");
                match self.coordinator.start_press_to_talk(context).await {
                    Ok(session) => {
                        self.current_session = Some(session);
                        self.coordinator.set_hands_free_enabled(matches!(
                            mode,
                            crate::state::RecordingMode::HandsFree
                        ));
                    }
                    Err(e) => {
                        error!("failed to start recording: {e}");
                        self.machine.mark_transcription_failed();
                    }
                }
            }
            RecordingTransition::Stop(mode) => {
                debug!(?mode, "stopping recording");
                self.write_state();
                let Some(session) = self.current_session.take() else {
                    self.machine.mark_transcription_failed();
                    return;
                };
                let hints = self.language_hints.clone();
                match self.coordinator.stop_press_to_talk(session, &hints).await {
                    Ok(result) => {
                        info!(status = ?result.status, "transcript delivered");
                        self.machine.mark_transcription_completed();
                    }
                    Err(e) => {
                        error!("session failed: {e}");
                        self.machine.mark_transcription_failed();
                    }
                }
                self.coordinator.set_hands_free_enabled(false);
            }
            RecordingTransition::Ignore(reason) => {
                debug!("hotkey event ignored: {reason}");
            }
        }
        self.write_state();
    }

    fn write_state(&self) {
        if let Some(path) = &self.state_file {
            write_state_file(path, self.machine.state().as_str());
        }
    }
}
