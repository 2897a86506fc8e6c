use async_trait::async_trait;
use tracing::info;

use crate::openai::{ChatMessage, ImageUrl};
use crate::types::{CallContext, ImageSubmission, Rubric, ScoreResult};

use super::{HandlerError, Judge, ScoringHandler};

const MAX_TOKENS: u32 = 1000;
const SYSTEM_PROMPT: &str = "You are an expert judge for ShowGrid. Respond only in valid JSON.";

#[derive(Clone)]
pub struct ImageScoringHandler {
    judge: Judge,
}

impl ImageScoringHandler {
    pub fn new(judge: Judge) -> Self {
        Self { judge }
    }
}

/// Base64 data wins over a URL when both are supplied.
fn image_reference(submission: &ImageSubmission) -> Result<ImageUrl, HandlerError> {
    let url = match (&submission.image_base64, &submission.image_url) {
        (Some(data), _) if !data.trim().is_empty() => {
            format!("data:image/jpeg;base64,{}", data.trim())
        }
        (_, Some(url)) if !url.trim().is_empty() => url.trim().to_string(),
        _ => {
            return Err(HandlerError::InvalidArgument(
                "an image URL or base64 image is required".to_string(),
            ));
        }
    };
    Ok(ImageUrl { url, detail: "high".to_string() })
}

fn build_prompt(submission: &ImageSubmission) -> String {
    let category = submission
        .challenge_category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| format!("Category: {}\n", c))
        .unwrap_or_default();

    format!(
        r#"You are judging a submission for: "{title}"
Description: {description}
{category}
Score this image from 1 to 10 on each criterion:
1. Creativity - how original is it?
2. Quality - technical execution
3. Relevance - how well does it match the challenge?
4. Impact - visual and emotional impact
5. Effort - apparent effort

Respond ONLY with JSON:
{{"creativity":<n>,"quality":<n>,"relevance":<n>,"impact":<n>,"effort":<n>,"overall_score":<average>,"grade":"<letter grade>","feedback":"<2-3 sentences>","highlights":["<s1>","<s2>"],"improvements":["<t1>","<t2>"]}}"#,
        title = submission.challenge_title,
        description = submission.challenge_description,
        category = category,
    )
}

#[async_trait]
impl ScoringHandler for ImageScoringHandler {
    type Submission = ImageSubmission;

    fn rubric(&self) -> Rubric {
        Rubric::Image
    }

    async fn score(
        &self,
        ctx: &CallContext,
        submission: &Self::Submission,
    ) -> Result<ScoreResult, HandlerError> {
        let uid = self.judge.authorize(ctx)?;
        let image = image_reference(submission)?;
        info!(uid, challenge = %submission.challenge_title, "ImageScoringHandler: scoring submission");

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_with_image(build_prompt(submission), image),
        ];
        self.judge
            .evaluate(uid, &submission.challenge_title, self.rubric(), &messages, MAX_TOKENS)
            .await
    }
}
