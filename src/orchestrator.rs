use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::console::Console;
use crate::handlers::{AudioScoringHandler, HandlerError, ImageScoringHandler, Judge, ScoringHandler};
use crate::log_store::{JsonlLogStore, ScoringLogStore};
use crate::openai::ChatClient;
use crate::types::{AudioSubmission, CallContext, ImageSubmission, Rubric, ScoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Card,
    Json,
    Quiet,
}

pub struct Orchestrator {
    image: ImageScoringHandler,
    audio: AudioScoringHandler,
    output: OutputMode,
}

impl Orchestrator {
    pub fn new(config: Config, output: OutputMode) -> Result<Self> {
        let log_store: Option<Arc<dyn ScoringLogStore>> = match &config.log_dir {
            Some(dir) => {
                let store = JsonlLogStore::new(dir);
                info!("Scoring log enabled at {}", store.path().display());
                Some(Arc::new(store))
            }
            None => {
                info!("SHOWGRID_LOG_DIR not set; scoring log disabled");
                None
            }
        };

        let judge = Judge::new(ChatClient::new(config)?, log_store);
        Ok(Self {
            image: ImageScoringHandler::new(judge.clone()),
            audio: AudioScoringHandler::new(judge),
            output,
        })
    }

    pub async fn score_image(
        &self,
        ctx: &CallContext,
        submission: &ImageSubmission,
    ) -> Result<ScoreResult, HandlerError> {
        self.announce(Rubric::Image);
        let result = self.image.score(ctx, submission).await?;
        self.present(&submission.challenge_title, Rubric::Image, &result);
        Ok(result)
    }

    pub async fn score_audio(
        &self,
        ctx: &CallContext,
        submission: &AudioSubmission,
    ) -> Result<ScoreResult, HandlerError> {
        self.announce(Rubric::Audio);
        let result = self.audio.score(ctx, submission).await?;
        self.present(&submission.chapter_title, Rubric::Audio, &result);
        Ok(result)
    }

    fn announce(&self, rubric: Rubric) {
        if self.output == OutputMode::Card {
            Console::display_loading(rubric);
        }
    }

    fn present(&self, title: &str, rubric: Rubric, result: &ScoreResult) {
        match self.output {
            OutputMode::Card => Console::display_score(title, rubric, result),
            OutputMode::Json => {
                if let Err(e) = Console::display_json(result) {
                    Console::display_error(&e);
                }
            }
            OutputMode::Quiet => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_store::LOG_FILE_NAME;
    use crate::types::ScoringLogEntry;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn end_to_end_scoring_appends_to_jsonl_log() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content":
                    "```json\n{\"creativity\":9,\"quality\":8,\"relevance\":8,\"impact\":9,\"effort\":7,\"overall_score\":8.2,\"feedback\":\"Striking.\"}\n```"
                } }]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            api_key: Some("sk-test".to_string()),
            base_url: server.uri(),
            model: "gpt-4o".to_string(),
            timeout: 5,
            temperature: 0.3,
            log_dir: Some(dir.path().to_path_buf()),
        };
        let orchestrator = Orchestrator::new(config, OutputMode::Quiet).unwrap();
        let submission = ImageSubmission {
            image_url: Some("https://cdn.example.com/a.jpg".to_string()),
            image_base64: None,
            challenge_title: "Street Life".to_string(),
            challenge_description: "Everyday moments in the city".to_string(),
            challenge_category: None,
        };

        let result = orchestrator
            .score_image(&CallContext::authenticated("user-1"), &submission)
            .await
            .unwrap();
        assert_eq!(result.overall_score, 8.2);

        let log = tokio::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).await.unwrap();
        let entry: ScoringLogEntry = serde_json::from_str(log.trim()).unwrap();
        assert_eq!(entry.user_id, "user-1");
        assert_eq!(entry.title, "Street Life");
        assert_eq!(entry.overall_score, 8.2);
    }

    #[test]
    fn invalid_config_fails_construction_with_chat_error() {
        let config = Config {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            timeout: 0,
            temperature: 0.3,
            log_dir: None,
        };
        let Err(error) = Orchestrator::new(config, OutputMode::Quiet) else {
            panic!("zero timeout should be rejected");
        };
        assert!(matches!(
            error.downcast_ref::<crate::openai::ChatError>(),
            Some(crate::openai::ChatError::ConfigError { .. })
        ));
    }
}
