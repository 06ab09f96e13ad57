//! Style profiles
//!
//! A style profile controls how aggressively cleanup rewrites a transcript.
//! Resolution order: per-app override, then built-in heuristics for IDE and
//! remote-desktop contexts, then the global default.

use crate::context::AppContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StyleTone {
    #[default]
    Natural,
    Professional,
    Concise,
    Friendly,
    Technical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StructureMode {
    #[default]
    Natural,
    Paragraph,
    Bullets,
    Email,
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FillerPolicy {
    Minimal,
    #[default]
    Balanced,
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommandPolicy {
    Passthrough,
    #[default]
    Transform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleProfile {
    #[serde(default = "default_profile_name")]
    pub name: String,
    #[serde(default)]
    pub tone: StyleTone,
    #[serde(default)]
    pub structure_mode: StructureMode,
    #[serde(default)]
    pub filler_policy: FillerPolicy,
    #[serde(default)]
    pub command_policy: CommandPolicy,
}

fn default_profile_name() -> String {
    "Default".to_string()
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self {
            name: default_profile_name(),
            tone: StyleTone::Natural,
            structure_mode: StructureMode::Paragraph,
            filler_policy: FillerPolicy::Balanced,
            command_policy: CommandPolicy::Transform,
        }
    }
}

impl StyleProfile {
    fn ide() -> Self {
        Self {
            name: "IDE".to_string(),
            tone: StyleTone::Technical,
            structure_mode: StructureMode::Natural,
            filler_policy: FillerPolicy::Balanced,
            command_policy: CommandPolicy::Passthrough,
        }
    }

    fn remote_desktop() -> Self {
        Self {
            name: "Remote Desktop".to_string(),
            tone: StyleTone::Concise,
            structure_mode: StructureMode::Paragraph,
            filler_policy: FillerPolicy::Aggressive,
            command_policy: CommandPolicy::Transform,
        }
    }
}

/// Serialized-access store of the global profile and per-app overrides
pub struct StyleProfileService {
    inner: Mutex<ProfileState>,
}

struct ProfileState {
    global: StyleProfile,
    per_app: HashMap<String, StyleProfile>,
}

impl StyleProfileService {
    pub fn new(global: StyleProfile, per_app: HashMap<String, StyleProfile>) -> Self {
        Self {
            inner: Mutex::new(ProfileState { global, per_app }),
        }
    }

    pub fn set_global(&self, profile: StyleProfile) {
        self.lock().global = profile;
    }

    pub fn set_for_app(&self, bundle_id: impl Into<String>, profile: StyleProfile) {
        self.lock().per_app.insert(bundle_id.into(), profile);
    }

    pub fn remove_for_app(&self, bundle_id: &str) {
        self.lock().per_app.remove(bundle_id);
    }

    /// Per-app override beats context heuristics beats the global default
    pub fn resolve(&self, app: &AppContext) -> StyleProfile {
        let state = self.lock();
        if let Some(profile) = state.per_app.get(&app.bundle_identifier) {
            return profile.clone();
        }
        if app.is_ide {
            return StyleProfile::ide();
        }
        if app.is_remote_desktop {
            return StyleProfile::remote_desktop();
        }
        state.global.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProfileState> {
        // Poisoning only happens if another holder panicked; the stored
        // profiles stay valid either way.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for StyleProfileService {
    fn default() -> Self {
        Self::new(StyleProfile::default(), HashMap::new())
    }
}
