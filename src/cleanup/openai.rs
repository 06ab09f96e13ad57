//! Transcript cleanup via the OpenAI chat completions API
//!
//! Uses JSON mode so the model returns a machine-readable payload instead of
//! prose. The style profile and lexicon travel in the user prompt; edits are
//! not reconstructed from the reply, only the cleaned text and filler list.

use super::remote::{post_json, require_https};
use super::CleanupEngine;
use crate::error::CleanupError;
use crate::lexicon::PersonalLexicon;
use crate::profile::StyleProfile;
use crate::transcript::{CleanTranscript, CloudTier, RawTranscript};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = "You are a transcript cleanup engine.\n\
Goals:\n\
1) Remove filler words according to filler policy.\n\
2) Rewrite for clarity while preserving meaning exactly.\n\
3) Apply lexicon corrections exactly.\n\
4) Do not invent facts.\n\
\n\
Return strict JSON with keys:\n\
- text: string\n\
- removedFillers: string[]\n\
- uncertaintyFlags: string[]";

/// Configuration for the OpenAI-backed engine
#[derive(Debug, Clone)]
pub struct OpenAiCleanupConfig {
    pub api_key: String,
    pub premium_model: String,
    pub economical_model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl OpenAiCleanupConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            premium_model: "gpt-5-mini".to_string(),
            economical_model: "gpt-5-nano".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanPayload {
    text: String,
    #[serde(default)]
    removed_fillers: Vec<String>,
    #[serde(default)]
    uncertainty_flags: Vec<String>,
}

/// Cleanup engine backed by OpenAI chat completions
#[derive(Debug, Clone)]
pub struct OpenAiCleanupEngine {
    config: OpenAiCleanupConfig,
}

impl OpenAiCleanupEngine {
    pub fn new(config: OpenAiCleanupConfig) -> Self {
        Self { config }
    }

    fn user_prompt(raw: &RawTranscript, profile: &StyleProfile, lexicon: &PersonalLexicon) -> String {
        let lexicon_lines = lexicon
            .entries
            .iter()
            .map(|entry| format!("- {} => {}", entry.term, entry.preferred))
            .collect::<Vec<_>>()
            .join("\n");
        let lexicon_block = if lexicon_lines.is_empty() {
            "(none)".to_string()
        } else {
            lexicon_lines
        };

        format!(
            "Transcript:\n{}\n\n\
             Style Profile:\n\
             - tone: {}\n\
             - structure: {}\n\
             - fillerPolicy: {}\n\
             - commandPolicy: {}\n\n\
             Lexicon corrections:\n{}",
            raw.text,
            enum_label(&profile.tone),
            enum_label(&profile.structure_mode),
            enum_label(&profile.filler_policy),
            enum_label(&profile.command_policy),
            lexicon_block,
        )
    }
}

fn enum_label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

#[async_trait]
impl CleanupEngine for OpenAiCleanupEngine {
    async fn cleanup(
        &self,
        raw: &RawTranscript,
        profile: &StyleProfile,
        lexicon: &PersonalLexicon,
        tier: CloudTier,
    ) -> Result<CleanTranscript, CleanupError> {
        require_https(&self.config.endpoint)?;

        let model = if tier == CloudTier::Economical {
            self.config.economical_model.clone()
        } else {
            self.config.premium_model.clone()
        };

        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::user_prompt(raw, profile, lexicon),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: 0.2,
        };

        let endpoint = self.config.endpoint.clone();
        let api_key = self.config.api_key.clone();
        let timeout = self.config.timeout;

        let chat: ChatResponse = tokio::task::spawn_blocking(move || {
            post_json(&endpoint, &api_key, timeout, &request)
        })
        .await
        .map_err(|e| CleanupError::Network(format!("cleanup task failed: {e}")))??;

        let content = chat
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(CleanupError::MissingContent);
        }

        let payload: CleanPayload = serde_json::from_str(content).map_err(|e| {
            error!("cleanup payload decode failed: {e}");
            CleanupError::DecodingFailure(e.to_string())
        })?;

        Ok(CleanTranscript {
            text: payload.text,
            edits: Vec::new(),
            removed_fillers: payload.removed_fillers,
            uncertainty_flags: payload.uncertainty_flags,
            model_tier: tier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{LexiconEntry, Scope};

    #[test]
    fn test_user_prompt_carries_profile_and_lexicon() {
        let lexicon = PersonalLexicon {
            entries: vec![LexiconEntry {
                term: "k8s".to_string(),
                preferred: "Kubernetes".to_string(),
                scope: Scope::Global,
            }],
        };
        let prompt = OpenAiCleanupEngine::user_prompt(
            &RawTranscript::from_text("um deploy it to k8s"),
            &StyleProfile::default(),
            &lexicon,
        );
        assert!(prompt.contains("um deploy it to k8s"));
        assert!(prompt.contains("- tone: natural"));
        assert!(prompt.contains("- structure: paragraph"));
        assert!(prompt.contains("- fillerPolicy: balanced"));
        assert!(prompt.contains("- k8s => Kubernetes"));
    }

    #[test]
    fn test_user_prompt_empty_lexicon() {
        let prompt = OpenAiCleanupEngine::user_prompt(
            &RawTranscript::from_text("hello"),
            &StyleProfile::default(),
            &PersonalLexicon::default(),
        );
        assert!(prompt.contains("Lexicon corrections:\n(none)"));
    }

    #[tokio::test]
    async fn test_insecure_endpoint_rejected() {
        let mut config = OpenAiCleanupConfig::new("key");
        config.endpoint = "http://localhost:8080/v1/chat/completions".to_string();
        let engine = OpenAiCleanupEngine::new(config);
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
    fn test_payload_defaults() {
        let payload: CleanPayload =
            serde_json::from_str(r#"{"text": "clean"}"#).expect("minimal payload decodes");
        assert_eq!(payload.text, "clean");
        assert!(payload.removed_fillers.is_empty());
        assert!(payload.uncertainty_flags.is_empty());
    }
}
