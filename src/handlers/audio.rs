use async_trait::async_trait;
use tracing::info;

use crate::openai::ChatMessage;
use crate::types::{AudioSubmission, CallContext, Rubric, ScoreResult};

use super::{HandlerError, Judge, ScoringHandler};

const MAX_TOKENS: u32 = 800;
const SYSTEM_PROMPT: &str = "You are an expert storytelling judge. Respond only in JSON.";

#[derive(Clone)]
pub struct AudioScoringHandler {
    judge: Judge,
}

impl AudioScoringHandler {
    pub fn new(judge: Judge) -> Self {
        Self { judge }
    }
}

/// The line describing the recording: transcript when present, else the audio reference.
fn recording_line(submission: &AudioSubmission) -> Result<String, HandlerError> {
    let non_blank = |s: &Option<String>| {
        s.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
    };
    match (non_blank(&submission.transcript), non_blank(&submission.audio_url)) {
        (Some(transcript), _) => Ok(format!("Transcript: \"{}\"", transcript)),
        (None, Some(url)) => Ok(format!("Audio recording: {}", url)),
        (None, None) => Err(HandlerError::InvalidArgument(
            "a transcript or audio reference is required".to_string(),
        )),
    }
}

fn build_prompt(submission: &AudioSubmission, recording: &str) -> String {
    format!(
        r#"Judge this voice story for: "{title}"
Description: {description}
{recording}

Score 1-10: Storytelling, Authenticity, Relevance, Emotional Impact, Clarity

Respond ONLY with JSON:
{{"storytelling":<n>,"authenticity":<n>,"relevance":<n>,"emotional_impact":<n>,"clarity":<n>,"overall_score":<average>,"feedback":"<2-3 sentences>","highlights":["<s1>"],"improvements":["<t1>"]}}"#,
        title = submission.chapter_title,
        description = submission.chapter_description,
        recording = recording,
    )
}

#[async_trait]
impl ScoringHandler for AudioScoringHandler {
    type Submission = AudioSubmission;

    fn rubric(&self) -> Rubric {
        Rubric::Audio
    }

    async fn score(
        &self,
        ctx: &CallContext,
        submission: &Self::Submission,
    ) -> Result<ScoreResult, HandlerError> {
        let uid = self.judge.authorize(ctx)?;
        let recording = recording_line(submission)?;
        info!(uid, chapter = %submission.chapter_title, "AudioScoringHandler: scoring story");

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(submission, &recording)),
        ];
        self.judge
            .evaluate(uid, &submission.chapter_title, self.rubric(), &messages, MAX_TOKENS)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::handlers::test_support::{MemoryLogStore, client_for, completion};
    use crate::openai::ChatError;
    use crate::sanitizer::ParseError;

    fn submission() -> AudioSubmission {
        AudioSubmission {
            transcript: Some("My grandmother crossed the mountains on foot...".to_string()),
            audio_url: None,
            chapter_title: "Roots".to_string(),
            chapter_description: "A story about where your family comes from".to_string(),
        }
    }

    #[test]
    fn transcript_is_preferred_over_audio_url() {
        let mut s = submission();
        s.audio_url = Some("https://cdn.example.com/roots.m4a".to_string());
        assert!(recording_line(&s).unwrap().starts_with("Transcript: "));

        s.transcript = None;
        assert_eq!(recording_line(&s).unwrap(), "Audio recording: https://cdn.example.com/roots.m4a");

        s.audio_url = None;
        assert!(matches!(recording_line(&s), Err(HandlerError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn scores_story_with_camel_case_overall_key() {
        let reply = "Here is my verdict:\n{\"storytelling\":8,\"authenticity\":9,\"relevance\":7,\"emotional_impact\":8,\"clarity\":6,\"overallScore\":7.6,\"feedback\":\"Moving and honest.\",\"grade\":\"A\"}\nHope it helps!";
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({ "max_tokens": 800 })))
            .respond_with(completion(reply))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryLogStore::default());
        let handler = AudioScoringHandler::new(Judge::new(
            client_for(&server, Some("sk-test")),
            Some(store.clone()),
        ));
        let result = handler
            .score(&CallContext::authenticated("user-7"), &submission())
            .await
            .unwrap();

        assert_eq!(result.criteria["emotional_impact"], 8.0);
        assert_eq!(result.overall_score, 7.6);
        assert!(result.highlights.is_empty());
        assert!(result.grade.is_none());

        let entries = store.entries.lock().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Roots");
        assert_eq!(entries[0].kind, Rubric::Audio);
    }

    #[tokio::test]
    async fn out_of_range_score_fails_closed() {
        let reply = r#"{"storytelling":11,"authenticity":9,"relevance":7,"emotional_impact":8,"clarity":6,"overall_score":8,"feedback":"Great."}"#;
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(completion(reply)).mount(&server).await;

        let store = Arc::new(MemoryLogStore::default());
        let handler = AudioScoringHandler::new(Judge::new(
            client_for(&server, Some("sk-test")),
            Some(store.clone()),
        ));
        let err = handler
            .score(&CallContext::authenticated("user-7"), &submission())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Parse(ParseError::InvalidField(ref name)) if name == "storytelling"
        ));
        assert!(store.entries.lock().await.is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_is_reported_as_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided" }
            })))
            .mount(&server)
            .await;

        let handler = AudioScoringHandler::new(Judge::new(client_for(&server, Some("sk-bad")), None));
        let err = handler
            .score(&CallContext::authenticated("user-7"), &submission())
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Upstream(ChatError::ApiError { status: 401, .. })));
        assert_eq!(err.status_code(), "internal");
    }
}
