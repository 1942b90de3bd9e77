//! OpenAI-compatible chat completions.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};

use vulnscope_agent::{ChatMessage, GenerationSettings};

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Request body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    /// Accepted for client compatibility; responses are never streamed.
    #[serde(default)]
    pub stream: Option<bool>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    fn settings(&self) -> GenerationSettings {
        let defaults = GenerationSettings::default();
        GenerationSettings {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChoiceMessage,
    pub finish_reason: String,
}

/// Response body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    fn single(model: String, content: String) -> Self {
        let created = chrono::Utc::now().timestamp();
        Self {
            id: format!("chatcmpl_{created}"),
            object: "chat.completion".to_string(),
            created,
            model,
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: "assistant".to_string(),
                    content,
                },
                finish_reason: "stop".to_string(),
            }],
        }
    }
}

/// POST /v1/chat/completions
pub async fn chat_completions_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Json<ChatCompletionResponse>> {
    let Json(request) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    tracing::debug!(
        messages = request.messages.len(),
        model = ?request.model,
        stream = ?request.stream,
        "Chat completion request"
    );

    let reply = state
        .orchestrator
        .chat(&request.messages, request.settings())
        .await?;

    tracing::info!(
        conversation_id = %reply.conversation_id,
        tool_calls = reply.tool_calls,
        "Chat completed"
    );

    let model = request
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| state.model().to_string());

    Ok(Json(ChatCompletionResponse::single(model, reply.content)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: ChatCompletionRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
        assert!(request.model.is_none());
        assert_eq!(request.settings(), GenerationSettings::default());
    }

    #[test]
    fn test_request_overrides() {
        let request: ChatCompletionRequest = serde_json::from_str(
            r#"{"model":"m","messages":[],"stream":true,"temperature":0.5,"max_tokens":128}"#,
        )
        .unwrap();
        let settings = request.settings();
        assert_eq!(settings.temperature, 0.5);
        assert_eq!(settings.max_tokens, 128);
    }

    #[test]
    fn test_response_shape() {
        let response = ChatCompletionResponse::single("gemini-2.5-flash".into(), "hello".into());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["id"], format!("chatcmpl_{}", response.created));
        assert_eq!(json["choices"][0]["index"], 0);
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        assert_eq!(json["choices"][0]["message"]["content"], "hello");
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
    }
}
