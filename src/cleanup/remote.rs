//! Remote transcript cleanup via a self-hosted HTTPS endpoint
//!
//! Posts the raw transcript plus style and lexicon context as JSON and
//! expects a `CleanTranscript`-shaped JSON reply. The endpoint must be HTTPS;
//! transcripts contain dictated speech and never travel in the clear.

use super::{sanitize_error_body_preview, CleanupEngine};
use crate::error::CleanupError;
use crate::lexicon::PersonalLexicon;
use crate::profile::{CommandPolicy, FillerPolicy, StructureMode, StyleProfile, StyleTone};
use crate::transcript::{CleanTranscript, CloudTier, RawTranscript, TranscriptEdit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const CLEANUP_INSTRUCTIONS: &str = "Rewrite for clarity. Remove fillers per policy. \
     Preserve user intent exactly. Do not add new facts.";

/// Configuration for the self-hosted cleanup endpoint
#[derive(Debug, Clone)]
pub struct RemoteCleanupConfig {
    pub endpoint: String,
    pub api_key: String,
    pub premium_model: String,
    pub economical_model: String,
    pub timeout: Duration,
}

impl RemoteCleanupConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            premium_model: "gpt-5-mini".to_string(),
            economical_model: "gpt-5-nano".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CleanupRequest {
    model: String,
    instructions: &'static str,
    transcript: String,
    tone: StyleTone,
    structure: StructureMode,
    filler_policy: FillerPolicy,
    command_policy: CommandPolicy,
    lexicon: HashMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CleanupResponse {
    text: String,
    edits: Vec<TranscriptEdit>,
    removed_fillers: Vec<String>,
    uncertainty_flags: Vec<String>,
}

impl Default for CleanupResponse {
    fn default() -> Self {
        Self {
            text: String::new(),
            edits: Vec::new(),
            removed_fillers: Vec::new(),
            uncertainty_flags: Vec::new(),
        }
    }
}

/// Cleanup engine backed by a self-hosted HTTPS service
#[derive(Debug, Clone)]
pub struct RemoteCleanupEngine {
    config: RemoteCleanupConfig,
}

impl RemoteCleanupEngine {
    pub fn new(config: RemoteCleanupConfig) -> Self {
        Self { config }
    }

    fn model_for(&self, tier: CloudTier) -> String {
        match tier {
            CloudTier::Premium => self.config.premium_model.clone(),
            CloudTier::Economical | CloudTier::None => self.config.economical_model.clone(),
        }
    }
}

#[async_trait]
impl CleanupEngine for RemoteCleanupEngine {
    async fn cleanup(
        &self,
        raw: &RawTranscript,
        profile: &StyleProfile,
        lexicon: &PersonalLexicon,
        tier: CloudTier,
    ) -> Result<CleanTranscript, CleanupError> {
        require_https(&self.config.endpoint)?;

        let request = CleanupRequest {
            model: self.model_for(tier),
            instructions: CLEANUP_INSTRUCTIONS,
            transcript: raw.text.clone(),
            tone: profile.tone,
            structure: profile.structure_mode,
            filler_policy: profile.filler_policy,
            command_policy: profile.command_policy,
            lexicon: lexicon_map(lexicon),
        };

        let endpoint = self.config.endpoint.clone();
        let api_key = self.config.api_key.clone();
        let timeout = self.config.timeout;

        // ureq is blocking; keep it off the async runtime.
        let decoded: CleanupResponse = tokio::task::spawn_blocking(move || {
            post_json(&endpoint, &api_key, timeout, &request)
        })
        .await
        .map_err(|e| CleanupError::Network(format!("cleanup task failed: {e}")))??;

        if decoded.text.trim().is_empty() {
            return Err(CleanupError::MissingContent);
        }

        Ok(CleanTranscript {
            text: decoded.text,
            edits: decoded.edits,
            removed_fillers: decoded.removed_fillers,
            uncertainty_flags: decoded.uncertainty_flags,
            model_tier: tier,
        })
    }
}

pub(crate) fn require_https(endpoint: &str) -> Result<(), CleanupError> {
    let scheme = endpoint.split("://").next().unwrap_or_default();
    if scheme.eq_ignore_ascii_case("https") {
        Ok(())
    } else {
        Err(CleanupError::InsecureEndpoint(endpoint.to_string()))
    }
}

/// Flattens lexicon entries into a term → preferred map. Last write wins on
/// duplicate terms in user data.
pub(crate) fn lexicon_map(lexicon: &PersonalLexicon) -> HashMap<String, String> {
    lexicon
        .entries
        .iter()
        .map(|entry| (entry.term.clone(), entry.preferred.clone()))
        .collect()
}

pub(crate) fn post_json<Req, Resp>(
    endpoint: &str,
    api_key: &str,
    timeout: Duration,
    request: &Req,
) -> Result<Resp, CleanupError>
where
    Req: Serialize,
    Resp: serde::de::DeserializeOwned,
{
    let response = ureq::post(endpoint)
        .timeout(timeout)
        .set("Content-Type", "application/json")
        .set("Authorization", &format!("Bearer {api_key}"))
        .send_json(serde_json::to_value(request).map_err(|e| {
            CleanupError::DecodingFailure(format!("request serialization failed: {e}"))
        })?)
        .map_err(|e| match e {
            ureq::Error::Status(status, resp) => {
                let body = resp.into_string().unwrap_or_default();
                CleanupError::HttpFailure {
                    status,
                    body_preview: sanitize_error_body_preview(&body),
                }
            }
            ureq::Error::Transport(t) => CleanupError::Network(t.to_string()),
        })?;

    response
        .into_json()
        .map_err(|e| CleanupError::DecodingFailure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_https() {
        assert!(require_https("https://cleanup.example.com/v1/clean").is_ok());
        assert!(require_https("HTTPS://cleanup.example.com").is_ok());
        assert!(matches!(
            require_https("http://cleanup.example.com"),
            Err(CleanupError::InsecureEndpoint(_))
        ));
        assert!(require_https("cleanup.example.com").is_err());
    }

    #[tokio::test]
    async fn test_insecure_endpoint_rejected_before_any_io() {
        let engine = RemoteCleanupEngine::new(RemoteCleanupConfig::new(
            "http://cleanup.example.com",
            "key",
        ));
        let result = engine
            .cleanup(
                &RawTranscript::from_text("hello"),
                &StyleProfile::default(),
                &PersonalLexicon::default(),
                CloudTier::Premium,
            )
            .await;
        assert!(matches!(result, Err(CleanupError::InsecureEndpoint(_))));
    }

    #[test]
    fn test_model_selection_per_tier() {
        let engine =
            RemoteCleanupEngine::new(RemoteCleanupConfig::new("https://x.example", "key"));
        assert_eq!(engine.model_for(CloudTier::Premium), "gpt-5-mini");
        assert_eq!(engine.model_for(CloudTier::Economical), "gpt-5-nano");
        assert_eq!(engine.model_for(CloudTier::None), "gpt-5-nano");
    }

    #[test]
    fn test_lexicon_map_last_write_wins() {
        use crate::lexicon::{LexiconEntry, Scope};
        let lexicon = PersonalLexicon {
            entries: vec![
                LexiconEntry {
                    term: "k8s".to_string(),
                    preferred: "Kubernetes".to_string(),
                    scope: Scope::Global,
                },
                LexiconEntry {
                    term: "k8s".to_string(),
                    preferred: "kubernetes".to_string(),
                    scope: Scope::Global,
                },
            ],
        };
        let map = lexicon_map(&lexicon);
        assert_eq!(map.len(), 1);
        assert_eq!(map["k8s"], "kubernetes");
    }

    #[test]
    fn test_response_defaults_tolerate_missing_fields() {
        let decoded: CleanupResponse =
            serde_json::from_str(r#"{"text": "clean"}"#).expect("minimal response decodes");
        assert_eq!(decoded.text, "clean");
        assert!(decoded.edits.is_empty());
        assert!(decoded.removed_fillers.is_empty());
    }
}
