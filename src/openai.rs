use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

/// Failures of the upstream chat-completions call
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Model servers are currently busy. Please try again in a few moments.")]
    ServerBusy,

    #[error("Network connection failed: {message}")]
    NetworkError { message: String },

    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid API response: {message}")]
    InvalidResponse { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl ChatError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ChatError::ServerBusy => {
                "🚫 The scoring model is currently busy. Please try again in a few moments."
                    .to_string()
            }
            ChatError::NetworkError { .. } => {
                "🌐 Network connection failed. Please check your internet connection and try again."
                    .to_string()
            }
            ChatError::Timeout { seconds } => {
                format!(
                    "⏰ Request timed out after {} seconds. The server might be overloaded.",
                    seconds
                )
            }
            ChatError::ApiError { status, message } => match *status {
                401 => "🔑 The API key was rejected by the model provider.".to_string(),
                _ => format!("❌ API error ({}): {}", status, message),
            },
            ChatError::InvalidResponse { .. } => {
                "⚠️ Failed to read the model provider's response. Please try again.".to_string()
            }
            ChatError::ConfigError { message } => {
                format!("⚙️ Configuration error: {}", message)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    pub detail: String,
}

/// One part of a multimodal user message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: MessageContent::Text(text.into()) }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: MessageContent::Text(text.into()) }
    }

    pub fn user_with_image(text: impl Into<String>, image: ImageUrl) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl { image_url: image },
            ]),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Chat-completions client for an OpenAI-compatible API
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    config: Config,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl ChatClient {
    pub fn new(config: Config) -> Result<Self, ChatError> {
        config.validate().map_err(|e| ChatError::ConfigError {
            message: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(concat!("showgrid_judge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatError::ConfigError {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn has_credentials(&self) -> bool {
        self.config.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send chat messages and return the assistant's raw text.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String, ChatError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| ChatError::ConfigError {
            message: "API key not configured".to_string(),
        })?;

        let request = ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens,
            temperature: self.config.temperature,
        };

        tracing::debug!(model = %self.config.model, max_tokens, "posting chat completion");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_response(status, response).await);
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            ChatError::InvalidResponse { message: format!("Failed to parse API response: {}", e) }
        })?;

        api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::InvalidResponse {
                message: "No choices in API response".to_string(),
            })?
            .message
            .content
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ChatError::InvalidResponse {
                message: "Empty content in API response".to_string(),
            })
    }

    fn map_reqwest_error(&self, error: reqwest::Error) -> ChatError {
        if error.is_timeout() {
            return ChatError::Timeout { seconds: self.config.timeout };
        }

        if error.is_connect() {
            return ChatError::NetworkError {
                message: "Failed to connect to server".to_string(),
            };
        }

        if error.is_request() {
            return ChatError::NetworkError {
                message: "Request failed".to_string(),
            };
        }

        ChatError::NetworkError {
            message: format!("Request error: {}", error),
        }
    }
}

async fn handle_error_response(status: StatusCode, response: reqwest::Response) -> ChatError {
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::BAD_GATEWAY
        | StatusCode::GATEWAY_TIMEOUT => ChatError::ServerBusy,
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| "API error".to_string());
            ChatError::ApiError { status: status.as_u16(), message }
        }
    }
}
