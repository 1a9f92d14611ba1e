//! Client for an OpenAI-compatible chat-completion API.
//!
//! Every public call degrades to a plain value: model listing returns an empty
//! list on failure and completion returns user-facing error text. Failures are
//! logged here so callers never have to.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::chatbot::message::ChatTurn;

/// Reply used when no model was configured and the API lists none.
pub const NO_MODELS_REPLY: &str = "Sorry, no models are available at the moment.";

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 1000;

/// Which model serves completions. Set once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelection {
    /// Use the first model the API lists, looked up on every request.
    Auto,
    Fixed(String),
}

impl ModelSelection {
    /// An unset or blank setting means auto.
    pub fn from_setting(setting: Option<String>) -> Self {
        match setting.map(|s| s.trim().to_string()) {
            Some(model) if !model.is_empty() => Self::Fixed(model),
            _ => Self::Auto,
        }
    }

    pub fn as_override(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Fixed(model) => Some(model),
        }
    }
}

pub struct CompletionClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl CompletionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Ids of the models the API currently serves. Empty on any failure.
    pub async fn list_models(&self) -> Vec<String> {
        match self.fetch_models().await {
            Ok(models) => models,
            Err(e) => {
                error!("Failed to list models: {e}");
                Vec::new()
            }
        }
    }

    /// Ask for the next assistant message given the conversation so far.
    ///
    /// Without an explicit model the first listed model is used, looked up
    /// fresh on every call.
    pub async fn complete(&self, history: &[ChatTurn], model: Option<&str>) -> String {
        let model = match model.filter(|m| !m.is_empty()) {
            Some(m) => m.to_string(),
            None => match self.list_models().await.into_iter().next() {
                Some(first) => {
                    info!("Using model: {first}");
                    first
                }
                None => return NO_MODELS_REPLY.to_string(),
            },
        };

        match self.request_completion(history, &model).await {
            Ok(text) => text,
            Err(CompletionError::Status { status, body }) => {
                error!("API error: {status} - {body}");
                format!("Sorry, I encountered an error: {status}")
            }
            Err(e) => {
                error!("Request failed: {e}");
                format!("Sorry, I couldn't process your request: {e}")
            }
        }
    }

    async fn fetch_models(&self) -> Result<Vec<String>, CompletionError> {
        let response = self
            .http
            .get(format!("{}/v1/models", self.base_url))
            .header("content-type", "application/json")
            .send()
            .await
            .map_err(|e| CompletionError::Http(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status: status.as_u16(), body });
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    async fn request_completion(
        &self,
        history: &[ChatTurn],
        model: &str,
    ) -> Result<String, CompletionError> {
        let request = CompletionRequest {
            model,
            messages: history,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        debug!("Requesting completion from {model} with {} turn(s)", history.len());

        let response = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Http(e.to_string()))?;

        if status != StatusCode::OK {
            return Err(CompletionError::Status { status: status.as_u16(), body });
        }

        let parsed: CompletionResponse =
            serde_json::from_str(&body).map_err(|e| CompletionError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(CompletionError::Empty)
    }
}

#[derive(Debug)]
pub enum CompletionError {
    Http(String),
    Status { status: u16, body: String },
    Parse(String),
    Empty,
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionError::Http(e) => write!(f, "HTTP error: {e}"),
            CompletionError::Status { status, body } => write!(f, "API error {status}: {body}"),
            CompletionError::Parse(e) => write!(f, "Parse error: {e}"),
            CompletionError::Empty => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for CompletionError {}
