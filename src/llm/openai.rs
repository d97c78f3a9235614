//! OpenAI-compatible `/chat/completions` client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::debug;

use super::{ChatMessage, ChatModel, ModelResponse, ToolCall, ToolDefinition};
use crate::error::ModelError;
use crate::models::LlmConfig;

pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        })
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

fn parse_response(body: &Value) -> Result<ModelResponse, ModelError> {
    let message = body["choices"]
        .get(0)
        .map(|choice| &choice["message"])
        .ok_or_else(|| ModelError::InvalidResponse("response has no choices".to_string()))?;

    let content = message["content"].as_str().map(str::to_string);
    let tool_calls: Vec<ToolCall> = match message.get("tool_calls") {
        Some(Value::Array(calls)) => calls
            .iter()
            .map(|c| serde_json::from_value(c.clone()))
            .collect::<Result<_, _>>()
            .map_err(|e| ModelError::InvalidResponse(format!("malformed tool call: {e}")))?,
        _ => Vec::new(),
    };

    Ok(ModelResponse {
        content,
        tool_calls,
    })
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelResponse, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .json(&self.request_body(messages, tools));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout
            } else if e.is_connect() {
                ModelError::Connection(e.to_string())
            } else {
                ModelError::Request(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ModelError::InvalidResponse(format!("status {}: {}", status, body))
                }
                _ => ModelError::Server { status, body },
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let parsed = parse_response(&body)?;
        debug!(
            model = %self.model,
            tool_calls = parsed.tool_calls.len(),
            has_text = parsed.content.is_some(),
            "model responded"
        );
        Ok(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Retryable;

    fn config(base_url: String) -> LlmConfig {
        LlmConfig {
            base_url,
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_request_body_includes_tools_only_when_present() {
        let model = OpenAiChatModel::new(&config("http://localhost/v1".into())).unwrap();
        let body = model.request_body(&[ChatMessage::user("hi")], &[]);
        assert!(body.get("tools").is_none());
        assert_eq!(body["model"], "gpt-4o-mini");

        let tool = ToolDefinition::function("internet_search", "Search", json!({"type": "object"}));
        let body = model.request_body(&[ChatMessage::user("hi")], &[tool]);
        assert_eq!(body["tools"][0]["function"]["name"], "internet_search");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn test_parse_tool_call_response() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "retrieve_agricultural_info", "arguments": "{\"query\":\"oats\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });

        let parsed = parse_response(&body).unwrap();
        assert!(parsed.content.is_none());
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].function.name, "retrieve_agricultural_info");
    }

    #[test]
    fn test_parse_rejects_missing_choices() {
        assert!(matches!(
            parse_response(&json!({"choices": []})),
            Err(ModelError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_against_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Drill barley in March."}}]}"#)
            .create_async()
            .await;

        let model = OpenAiChatModel::new(&config(server.url())).unwrap();
        let response = model
            .complete(&[ChatMessage::user("When do I drill spring barley?")], &[])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text_content(), Some("Drill barley in March."));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let model = OpenAiChatModel::new(&config(server.url())).unwrap();
        let err = model.complete(&[ChatMessage::user("hi")], &[]).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_internal_server_error_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let model = OpenAiChatModel::new(&config(server.url())).unwrap();
        let err = model.complete(&[ChatMessage::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(err, ModelError::Server { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR));
        assert!(err.is_retryable());
    }
}
