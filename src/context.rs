//! Target application context
//!
//! Describes the application that currently has focus. The OS-specific probe
//! that produces these lives outside the core; everything downstream (style
//! resolution, insertion ordering, command passthrough) only reads the fields.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The application a dictation session will insert into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppContext {
    pub bundle_identifier: String,
    pub app_name: String,
    /// Accessibility description of the focused input field, when available
    #[serde(default)]
    pub input_field_description: Option<String>,
    #[serde(default)]
    pub is_remote_desktop: bool,
    #[serde(default)]
    pub is_ide: bool,
}

impl AppContext {
    pub fn new(bundle_identifier: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            bundle_identifier: bundle_identifier.into(),
            app_name: app_name.into(),
            input_field_description: None,
            is_remote_desktop: false,
            is_ide: false,
        }
    }

    /// Placeholder context when the frontmost application cannot be determined
    pub fn unknown() -> Self {
        Self::new("unknown", "Unknown")
    }
}

/// Supplies the frontmost application context to the daemon.
///
/// Production implementations query the OS; the static provider covers
/// headless setups and tests.
#[async_trait]
pub trait AppContextProvider: Send + Sync {
    async fn frontmost(&self) -> AppContext;
}

/// Always returns the same context
pub struct StaticContextProvider {
    context: AppContext,
}

impl StaticContextProvider {
    pub fn new(context: AppContext) -> Self {
        Self { context }
    }
}

impl Default for StaticContextProvider {
    fn default() -> Self {
        Self::new(AppContext::unknown())
    }
}

#[async_trait]
impl AppContextProvider for StaticContextProvider {
    async fn frontmost(&self) -> AppContext {
        self.context.clone()
    }
}
