use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::log_store::ScoringLogStore;
use crate::openai::{ChatClient, ChatError, ChatMessage};
use crate::sanitizer::{self, ParseError};
use crate::types::{CallContext, Rubric, ScoreResult, ScoringLogEntry};

pub mod audio;
pub mod image;

pub use audio::AudioScoringHandler;
pub use image::ImageScoringHandler;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("User must be logged in")]
    Unauthenticated,
    #[error("OpenAI API key not configured")]
    MissingCredential,
    #[error("Invalid submission: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Upstream(#[from] ChatError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl HandlerError {
    /// Callable-style status name for the transport.
    pub fn status_code(&self) -> &'static str {
        match self {
            HandlerError::Unauthenticated => "unauthenticated",
            HandlerError::MissingCredential => "failed-precondition",
            HandlerError::InvalidArgument(_) => "invalid-argument",
            HandlerError::Upstream(_) | HandlerError::Parse(_) => "internal",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            HandlerError::Unauthenticated => "🔒 Please sign in before submitting for scoring.".to_string(),
            HandlerError::MissingCredential => {
                "⚙️ Scoring is not configured: set OPENAI_API_KEY.".to_string()
            }
            HandlerError::InvalidArgument(message) => format!("📎 {}", message),
            HandlerError::Upstream(e) => e.user_message(),
            HandlerError::Parse(e) => e.user_message(),
        }
    }
}

#[async_trait]
pub trait ScoringHandler {
    type Submission: Send + Sync;

    fn rubric(&self) -> Rubric;

    async fn score(
        &self,
        ctx: &CallContext,
        submission: &Self::Submission,
    ) -> Result<ScoreResult, HandlerError>;
}

/// Plumbing shared by both handlers: upstream call, sanitizing, logging.
#[derive(Clone)]
pub struct Judge {
    client: ChatClient,
    log_store: Option<Arc<dyn ScoringLogStore>>,
}

impl Judge {
    pub fn new(client: ChatClient, log_store: Option<Arc<dyn ScoringLogStore>>) -> Self {
        Self { client, log_store }
    }

    /// Auth first, then credentials; nothing is sent upstream unless both pass.
    fn authorize<'a>(&self, ctx: &'a CallContext) -> Result<&'a str, HandlerError> {
        let uid = ctx
            .auth
            .as_ref()
            .map(|auth| auth.uid.as_str())
            .ok_or(HandlerError::Unauthenticated)?;
        if !self.client.has_credentials() {
            return Err(HandlerError::MissingCredential);
        }
        Ok(uid)
    }

    async fn evaluate(
        &self,
        uid: &str,
        title: &str,
        rubric: Rubric,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<ScoreResult, HandlerError> {
        info!(%rubric, title, model = self.client.model(), "requesting evaluation");
        let raw = self.client.complete(messages, max_tokens).await.inspect_err(|e| {
            warn!(%rubric, error = %e, "upstream scoring call failed");
        })?;

        let result = sanitizer::sanitize_and_parse(&raw, rubric).inspect_err(|e| {
            warn!(%rubric, error = %e, "model reply rejected");
        })?;
        info!(%rubric, overall_score = result.overall_score, "evaluation accepted");

        if let Some(store) = &self.log_store {
            let entry = ScoringLogEntry::new(uid, title, rubric, result.overall_score);
            if let Err(e) = store.append(&entry).await {
                warn!(error = %e, "failed to write scoring log entry");
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::Config;
    use crate::log_store::LogStoreError;
    use tokio::sync::Mutex;
    use wiremock::MockServer;

    #[derive(Default)]
    pub struct MemoryLogStore {
        pub entries: Mutex<Vec<ScoringLogEntry>>,
    }

    #[async_trait]
    impl ScoringLogStore for MemoryLogStore {
        async fn append(&self, entry: &ScoringLogEntry) -> Result<(), LogStoreError> {
            self.entries.lock().await.push(entry.clone());
            Ok(())
        }
    }

    pub struct FailingLogStore;

    #[async_trait]
    impl ScoringLogStore for FailingLogStore {
        async fn append(&self, _entry: &ScoringLogEntry) -> Result<(), LogStoreError> {
            Err(std::io::Error::other("disk full").into())
        }
    }

    pub fn client_for(server: &MockServer, api_key: Option<&str>) -> ChatClient {
        ChatClient::new(Config {
            api_key: api_key.map(str::to_string),
            base_url: server.uri(),
            model: "gpt-4o".to_string(),
            timeout: 5,
            temperature: 0.3,
            log_dir: None,
        })
        .unwrap()
    }

    pub fn completion(content: &str) -> wiremock::ResponseTemplate {
        wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        }))
    }
}
