use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which set of criteria a model reply is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rubric {
    Image,
    Audio,
}

impl Rubric {
    pub fn criteria(&self) -> &'static [&'static str] {
        match self {
            Rubric::Image => &["creativity", "quality", "relevance", "impact", "effort"],
            Rubric::Audio => &[
                "storytelling",
                "authenticity",
                "relevance",
                "emotional_impact",
                "clarity",
            ],
        }
    }

    /// Only image judging asks the model for a letter grade.
    pub fn allows_grade(&self) -> bool {
        matches!(self, Rubric::Image)
    }
}

impl std::fmt::Display for Rubric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self { Rubric::Image => "image", Rubric::Audio => "audio" };
        f.write_str(s)
    }
}

/// Validated evaluation. Built only by `sanitizer::sanitize_and_parse`.
///
/// Serializes with the criteria flattened to top-level keys and the overall
/// score under `overallScore`, which the sanitizer accepts back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    #[serde(flatten)]
    pub criteria: BTreeMap<String, f64>,
    pub overall_score: f64,
    pub feedback: String,
    pub highlights: Vec<String>,
    pub improvements: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
}

/// Summary record written after a successful scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringLogEntry {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub kind: Rubric,
    pub overall_score: f64,
    pub timestamp: DateTime<Utc>,
}

impl ScoringLogEntry {
    pub fn new(user_id: &str, title: &str, kind: Rubric, overall_score: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            kind,
            overall_score,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub uid: String,
}

/// Per-call context handed to a handler by the transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthContext>,
}

impl CallContext {
    pub fn authenticated(uid: impl Into<String>) -> Self {
        Self { auth: Some(AuthContext { uid: uid.into() }) }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSubmission {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    pub challenge_title: String,
    pub challenge_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSubmission {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub chapter_title: String,
    pub chapter_description: String,
}
