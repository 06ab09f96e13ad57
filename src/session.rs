//! Session coordinator
//!
//! Owns the capture → transcribe → cleanup → insert → history pipeline for
//! every dictation session. Cloud cleanup is arbitrated per session by the
//! budget guard; any cloud failure falls back to the local rule-based engine
//! so the session always produces text.

use crate::budget::{BudgetGuard, CloudMode};
use crate::capture::AudioCaptureService;
use crate::cleanup::{estimated_tokens, CleanupEngine};
use crate::context::AppContext;
use crate::error::SessionError;
use crate::history::{TranscriptEntry, TranscriptHistory};
use crate::insert::InsertionService;
use crate::lexicon::PersonalLexiconService;
use crate::profile::{CommandPolicy, StyleProfileService};
use crate::snippet::SnippetService;
use crate::transcript::{CleanTranscript, CloudTier, InsertResult, RawTranscript, SessionId};
use crate::transcribe::TranscriptionEngine;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

struct ActiveSession {
    app_context: AppContext,
    #[allow(dead_code)]
    started_at: DateTime<Utc>,
}

/// Deletes the captured audio file on every exit path out of `stop`.
struct TempAudioGuard(PathBuf);

impl Drop for TempAudioGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

pub struct SessionCoordinator {
    capture: Arc<dyn AudioCaptureService>,
    transcriber: Arc<dyn TranscriptionEngine>,
    cleanup: Arc<dyn CleanupEngine>,
    fallback_cleanup: Arc<dyn CleanupEngine>,
    insertion: Arc<InsertionService>,
    history: Arc<dyn TranscriptHistory>,
    lexicon: Arc<PersonalLexiconService>,
    profiles: Arc<StyleProfileService>,
    snippets: Arc<SnippetService>,
    budget: Arc<BudgetGuard>,
    active: Mutex<HashMap<SessionId, ActiveSession>>,
    hands_free_enabled: Mutex<bool>,
}

impl SessionCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        capture: Arc<dyn AudioCaptureService>,
        transcriber: Arc<dyn TranscriptionEngine>,
        cleanup: Arc<dyn CleanupEngine>,
        fallback_cleanup: Arc<dyn CleanupEngine>,
        insertion: Arc<InsertionService>,
        history: Arc<dyn TranscriptHistory>,
        lexicon: Arc<PersonalLexiconService>,
        profiles: Arc<StyleProfileService>,
        snippets: Arc<SnippetService>,
        budget: Arc<BudgetGuard>,
    ) -> Self {
        Self {
            capture,
            transcriber,
            cleanup,
            fallback_cleanup,
            insertion,
            history,
            lexicon,
            profiles,
            snippets,
            budget,
            active: Mutex::new(HashMap::new()),
            hands_free_enabled: Mutex::new(false),
        }
    }

    pub async fn start_press_to_talk(
        &self,
        app_context: AppContext,
    ) -> Result<SessionId, SessionError> {
        let session = SessionId::new();
        self.capture.begin_capture(session).await?;
        self.lock_active().insert(
            session,
            ActiveSession {
                app_context,
                started_at: Utc::now(),
            },
        );
        info!(%session, "dictation session started");
        Ok(session)
    }

    pub async fn stop_press_to_talk(
        &self,
        session: SessionId,
        language_hints: &[String],
    ) -> Result<InsertResult, SessionError> {
        let active = self
            .lock_active()
            .remove(&session)
            .ok_or(SessionError::SessionNotFound)?;

        let audio_path = self.capture.end_capture(session).await?;
        let _audio_guard = TempAudioGuard(audio_path.clone());

        let mut raw = self
            .transcriber
            .transcribe(&audio_path, language_hints)
            .await?;

        // Snippets expand before cleanup so expansions are never rewritten.
        raw.text = self.snippets.apply(&raw.text, Some(&active.app_context));

        let profile = self.profiles.resolve(&active.app_context);
        let lexicon = self.lexicon.snapshot_for(Some(&active.app_context));

        let cleaned = self
            .prepare_clean_transcript(&raw, &profile, &lexicon, &active.app_context)
            .await?;

        let insert_result = self
            .insertion
            .insert(&cleaned.text, &active.app_context)
            .await;

        // Audio stays ephemeral; history records text only.
        let entry = TranscriptEntry::new(
            active.app_context.bundle_identifier.clone(),
            raw.text.clone(),
            cleaned.text.clone(),
            insert_result.status,
        );
        self.history.append(entry).await?;

        info!(%session, status = ?insert_result.status, "dictation session completed");
        Ok(insert_result)
    }

    pub async fn cancel(&self, session: SessionId) {
        self.lock_active().remove(&session);
        self.capture.cancel_capture(session).await;
        info!(%session, "dictation session cancelled");
    }

    pub fn set_hands_free_enabled(&self, enabled: bool) {
        *self
            .hands_free_enabled
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = enabled;
    }

    pub fn is_hands_free_enabled(&self) -> bool {
        *self
            .hands_free_enabled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Arbitrates between cloud and local cleanup for one transcript.
    async fn prepare_clean_transcript(
        &self,
        raw: &RawTranscript,
        profile: &crate::profile::StyleProfile,
        lexicon: &crate::lexicon::PersonalLexicon,
        app_context: &AppContext,
    ) -> Result<CleanTranscript, SessionError> {
        // Slash commands in IDEs pass through untouched under a passthrough
        // policy; no cleanup engine sees them.
        if profile.command_policy == CommandPolicy::Passthrough
            && app_context.is_ide
            && raw.text.trim().starts_with('/')
        {
            return Ok(CleanTranscript::passthrough(raw.text.clone()));
        }

        let decision = self.budget.authorize(estimated_tokens(&raw.text));

        if decision.mode == CloudMode::Disabled {
            let mut fallback = self
                .fallback_cleanup
                .cleanup(raw, profile, lexicon, CloudTier::None)
                .await?;
            if let Some(reason) = decision.reason {
                fallback.uncertainty_flags.push(reason);
            }
            return Ok(fallback);
        }

        match self
            .cleanup
            .cleanup(raw, profile, lexicon, decision.tier)
            .await
        {
            Ok(cloud) => {
                self.budget.record(decision.estimated_cost_usd);
                Ok(cloud)
            }
            Err(e) => {
                warn!("cloud cleanup failed, using local fallback: {e}");
                let mut fallback = self
                    .fallback_cleanup
                    .cleanup(raw, profile, lexicon, CloudTier::None)
                    .await?;
                fallback
                    .uncertainty_flags
                    .push("Cloud cleanup unavailable, used local fallback".to_string());
                Ok(fallback)
            }
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, ActiveSession>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Pricing;
    use crate::capture::SilentCaptureService;
    use crate::cleanup::RuleBasedCleanupEngine;
    use crate::error::{CleanupError, TranscribeError};
    use crate::history::HistoryStore;
    use crate::insert::{ClipboardTransport, MemoryClipboard};
    use crate::lexicon::PersonalLexicon;
    use crate::profile::{StructureMode, StyleProfile};
    use crate::transcript::InsertionStatus;
    use async_trait::async_trait;
    use std::path::Path;

    struct FixedTranscriber(String);

    #[async_trait]
    impl TranscriptionEngine for FixedTranscriber {
        async fn transcribe(
            &self,
            _audio_path: &Path,
            _language_hints: &[String],
        ) -> Result<RawTranscript, TranscribeError> {
            Ok(RawTranscript::from_text(self.0.clone()))
        }
    }

    struct FailingCloudEngine;

    #[async_trait]
    impl CleanupEngine for FailingCloudEngine {
        async fn cleanup(
            &self,
            _raw: &RawTranscript,
            _profile: &StyleProfile,
            _lexicon: &PersonalLexicon,
            _tier: CloudTier,
        ) -> Result<CleanTranscript, CleanupError> {
            Err(CleanupError::Network("connection refused".to_string()))
        }
    }

    struct Fixture {
        coordinator: SessionCoordinator,
        clipboard: Arc<MemoryClipboard>,
        history: Arc<HistoryStore>,
        _dir: tempfile::TempDir,
    }

    fn fixture_with(
        transcript: &str,
        cloud: Arc<dyn CleanupEngine>,
        budget: BudgetGuard,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let clipboard = Arc::new(MemoryClipboard::new());
        let history = Arc::new(HistoryStore::new(
            dir.path().join("history.json"),
            clipboard.clone(),
            crate::history::DEFAULT_MAX_ENTRIES,
        ));
        let insertion = Arc::new(InsertionService::new(vec![Arc::new(
            ClipboardTransport::new(clipboard.clone(), None),
        )]));
        let profiles = Arc::new(crate::profile::StyleProfileService::new(
            StyleProfile {
                structure_mode: StructureMode::Natural,
                ..StyleProfile::default()
            },
            HashMap::new(),
        ));

        let coordinator = SessionCoordinator::new(
            Arc::new(SilentCaptureService::new()),
            Arc::new(FixedTranscriber(transcript.to_string())),
            cloud,
            Arc::new(RuleBasedCleanupEngine),
            insertion,
            history.clone(),
            Arc::new(PersonalLexiconService::default()),
            profiles,
            Arc::new(SnippetService::default()),
            Arc::new(budget),
        );

        Fixture {
            coordinator,
            clipboard,
            history,
            _dir: dir,
        }
    }

    fn local_budget(spend: f64) -> BudgetGuard {
        BudgetGuard::new(
            Pricing::default(),
            BudgetGuard::DEFAULT_SOFT_THRESHOLD_USD,
            BudgetGuard::DEFAULT_HARD_THRESHOLD_USD,
            spend,
            None,
        )
    }

    fn hints() -> Vec<String> {
        vec!["en-US".to_string()]
    }

    #[tokio::test]
    async fn test_full_session_pipeline() {
        let fixture = fixture_with(
            "Um I think uh this should stay clear.",
            Arc::new(RuleBasedCleanupEngine),
            local_budget(0.0),
        );
        let app = AppContext::new("com.example.editor", "Editor");

        let session = fixture
            .coordinator
            .start_press_to_talk(app)
            .await
            .unwrap();
        let result = fixture
            .coordinator
            .stop_press_to_talk(session, &hints())
            .await
            .unwrap();

        assert_eq!(result.status, InsertionStatus::CopiedOnly);
        assert_eq!(
            fixture.clipboard.latest_value(),
            "I think this should stay clear."
        );

        let recent = fixture.history.recent(1).await;
        assert_eq!(recent[0].raw_text, "Um I think uh this should stay clear.");
        assert_eq!(recent[0].clean_text, "I think this should stay clear.");

        // The temp audio file must be gone after the session completes.
        let audio = std::env::temp_dir().join(format!("sotto-audio-{session}.wav"));
        assert!(!audio.exists());
    }

    #[tokio::test]
    async fn test_stop_unknown_session() {
        let fixture = fixture_with("text", Arc::new(RuleBasedCleanupEngine), local_budget(0.0));
        let result = fixture
            .coordinator
            .stop_press_to_talk(SessionId::new(), &hints())
            .await;
        assert!(matches!(result, Err(SessionError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_cancel_cleans_up() {
        let fixture = fixture_with("text", Arc::new(RuleBasedCleanupEngine), local_budget(0.0));
        let app = AppContext::new("com.example.editor", "Editor");

        let session = fixture
            .coordinator
            .start_press_to_talk(app)
            .await
            .unwrap();
        fixture.coordinator.cancel(session).await;

        // The session is gone; stopping it afterwards fails.
        let result = fixture
            .coordinator
            .stop_press_to_talk(session, &hints())
            .await;
        assert!(matches!(result, Err(SessionError::SessionNotFound)));
        assert!(fixture.history.recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_ide_slash_command_passes_through() {
        let fixture = fixture_with(
            "/build target release",
            Arc::new(RuleBasedCleanupEngine),
            local_budget(0.0),
        );
        let app = AppContext {
            is_ide: true,
            ..AppContext::new("com.example.ide", "Example IDE")
        };

        let session = fixture
            .coordinator
            .start_press_to_talk(app)
            .await
            .unwrap();
        fixture
            .coordinator
            .stop_press_to_talk(session, &hints())
            .await
            .unwrap();

        // The IDE profile is passthrough for commands, so the slash command
        // survives verbatim.
        assert_eq!(fixture.clipboard.latest_value(), "/build target release");
        let recent = fixture.history.recent(1).await;
        assert_eq!(recent[0].clean_text, "/build target release");
    }

    #[tokio::test]
    async fn test_disabled_budget_uses_local_fallback_with_reason() {
        let fixture = fixture_with("irrelevant", Arc::new(FailingCloudEngine), local_budget(8.0));

        let cleaned = fixture
            .coordinator
            .prepare_clean_transcript(
                &RawTranscript::from_text("um hello there"),
                &StyleProfile {
                    structure_mode: StructureMode::Natural,
                    ..StyleProfile::default()
                },
                &PersonalLexicon::default(),
                &AppContext::unknown(),
            )
            .await
            .unwrap();

        assert_eq!(cleaned.text, "hello there");
        assert_eq!(cleaned.model_tier, CloudTier::None);
        assert!(cleaned
            .uncertainty_flags
            .iter()
            .any(|f| f == "Monthly cloud budget cap reached"));
    }

    #[tokio::test]
    async fn test_cloud_failure_falls_back_and_tags() {
        let fixture = fixture_with("irrelevant", Arc::new(FailingCloudEngine), local_budget(0.0));

        let cleaned = fixture
            .coordinator
            .prepare_clean_transcript(
                &RawTranscript::from_text("um hello there"),
                &StyleProfile {
                    structure_mode: StructureMode::Natural,
                    ..StyleProfile::default()
                },
                &PersonalLexicon::default(),
                &AppContext::unknown(),
            )
            .await
            .unwrap();

        assert_eq!(cleaned.text, "hello there");
        assert!(cleaned
            .uncertainty_flags
            .iter()
            .any(|f| f == "Cloud cleanup unavailable, used local fallback"));
        // Nothing was spent on the failed cloud call.
        assert_eq!(fixture.coordinator.budget.monthly_spend(), 0.0);
    }

    #[tokio::test]
    async fn test_cloud_success_records_cost() {
        // A rule-based "cloud" engine stands in for a successful cloud call.
        let fixture = fixture_with("irrelevant", Arc::new(RuleBasedCleanupEngine), local_budget(1.0));

        fixture
            .coordinator
            .prepare_clean_transcript(
                &RawTranscript::from_text("um hello there from dictation"),
                &StyleProfile {
                    structure_mode: StructureMode::Natural,
                    ..StyleProfile::default()
                },
                &PersonalLexicon::default(),
                &AppContext::unknown(),
            )
            .await
            .unwrap();

        assert!(fixture.coordinator.budget.monthly_spend() > 1.0);
    }

    #[tokio::test]
    async fn test_hands_free_flag() {
        let fixture = fixture_with("text", Arc::new(RuleBasedCleanupEngine), local_budget(0.0));
        assert!(!fixture.coordinator.is_hands_free_enabled());
        fixture.coordinator.set_hands_free_enabled(true);
        assert!(fixture.coordinator.is_hands_free_enabled());
    }
}
