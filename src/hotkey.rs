//! Hotkey toggle gate
//!
//! Raw hands-free hotkey signals arrive as press/release pairs, sometimes with
//! key repeats or a delayed release. The gate collapses each pair into a
//! single toggle decision and debounces rapid repeated releases so one
//! physical press cannot toggle twice.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeySignal {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy)]
pub struct HotkeyToggleGate {
    armed: bool,
    last_toggle_at: Option<Instant>,
    debounce_window: Duration,
}

impl HotkeyToggleGate {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

    pub fn new(debounce_window: Duration) -> Self {
        Self {
            armed: false,
            last_toggle_at: None,
            debounce_window,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Feeds one signal; returns true when the pair completes a toggle.
    pub fn consume(&mut self, signal: HotkeySignal) -> bool {
        self.consume_at(signal, Instant::now())
    }

    /// Same as [`consume`](Self::consume) with an injected clock.
    pub fn consume_at(&mut self, signal: HotkeySignal, now: Instant) -> bool {
        match signal {
            HotkeySignal::Pressed => {
                // Pressing only arms; key repeats re-arm harmlessly.
                self.armed = true;
                false
            }
            HotkeySignal::Released => {
                if !self.armed {
                    // Release without a matching press (e.g. after reset).
                    return false;
                }
                self.armed = false;

                if let Some(last) = self.last_toggle_at {
                    if now.duration_since(last) < self.debounce_window {
                        return false;
                    }
                }

                self.last_toggle_at = Some(now);
                true
            }
        }
    }

    /// Clears arming and debounce state; used when hotkey monitoring restarts.
    pub fn reset(&mut self) {
        self.armed = false;
        self.last_toggle_at = None;
    }
}

impl Default for HotkeyToggleGate {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEBOUNCE)
    }
}
