//! Gemini API transport with function calling
//!
//! Wraps the v1beta generateContent endpoint behind the ModelTransport trait
//! so the orchestrator can be exercised with a scripted fake in tests.
//! Uses a long-lived reqwest::Client for connection pooling. Fault
//! classification by HTTP status lives here and nowhere else.

use crate::error::AssistantError;
use crate::tools::ToolDeclaration;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info};

//
// ================= Transport Contract =================
//

/// What the orchestrator depends on: system instruction, tool catalog, and
/// role-tagged contents in; text plus requested tool calls out.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_instruction: String,
    pub tools: Vec<ToolDeclaration>,
    pub contents: Vec<Content>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub text: String,
    pub tool_calls: Vec<FunctionCall>,
}

#[async_trait::async_trait]
pub trait ModelTransport: Send + Sync {
    async fn generate(&self, request: ModelRequest) -> Result<ModelReply>;
}

//
// ================= Wire Types =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part {
                text: Some(text.into()),
                ..Part::default()
            }],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part {
                text: Some(text.into()),
                ..Part::default()
            }],
        }
    }

    /// The model's own turn containing the calls it requested, echoed back so
    /// it can correlate the responses that follow.
    pub fn model_calls(calls: Vec<FunctionCall>) -> Self {
        Self {
            role: "model".to_string(),
            parts: calls
                .into_iter()
                .map(|call| Part {
                    function_call: Some(call),
                    ..Part::default()
                })
                .collect(),
        }
    }

    /// All per-call results of one round, as a single follow-up turn in the
    /// order the calls were requested.
    pub fn function_responses(responses: Vec<FunctionResponse>) -> Self {
        Self {
            role: "user".to_string(),
            parts: responses
                .into_iter()
                .map(|response| Part {
                    function_response: Some(response),
                    ..Part::default()
                })
                .collect(),
        }
    }
}

/// Mock transport for development & testing
/// Replays scripted replies in order and records every request it receives.
pub struct MockTransport {
    script: tokio::sync::Mutex<std::collections::VecDeque<Result<ModelReply>>>,
    pub requests: tokio::sync::Mutex<Vec<ModelRequest>>,
}

impl MockTransport {
    pub fn new(script: Vec<Result<ModelReply>>) -> Self {
        Self {
            script: tokio::sync::Mutex::new(script.into()),
            requests: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn text_reply(text: impl Into<String>) -> Result<ModelReply> {
        Ok(ModelReply {
            text: text.into(),
            tool_calls: vec![],
        })
    }

    pub fn call_reply(text: impl Into<String>, calls: Vec<FunctionCall>) -> Result<ModelReply> {
        Ok(ModelReply {
            text: text.into(),
            tool_calls: calls,
        })
    }
}

#[async_trait::async_trait]
impl ModelTransport for MockTransport {
    async fn generate(&self, request: ModelRequest) -> Result<ModelReply> {
        self.requests.lock().await.push(request);
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Self::text_reply("(no scripted reply)"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolsEntry>,
    system_instruction: SystemInstruction,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolsEntry {
    function_declarations: Vec<ToolDeclaration>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

//
// ================= Client =================

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
        }
    }

    fn extract_reply(response: GeminiResponse) -> Result<ModelReply> {
        let content = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .ok_or_else(|| {
                AssistantError::EmptyResponse("no candidates in model response".to_string())
            })?;

        let mut reply = ModelReply::default();
        for part in content.parts {
            if let Some(text) = part.text {
                if !reply.text.is_empty() {
                    reply.text.push('\n');
                }
                reply.text.push_str(&text);
            }
            if let Some(call) = part.function_call {
                reply.tool_calls.push(call);
            }
        }

        Ok(reply)
    }
}

#[async_trait::async_trait]
impl ModelTransport for GeminiClient {
    async fn generate(&self, request: ModelRequest) -> Result<ModelReply> {
        if self.api_key.is_empty() {
            return Err(AssistantError::MissingApiKey);
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);

        let tools = if request.tools.is_empty() {
            vec![]
        } else {
            vec![ToolsEntry {
                function_declarations: request.tools,
            }]
        };

        let wire_request = GeminiRequest {
            contents: request.contents,
            tools,
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: Some(request.system_instruction),
                    ..Part::default()
                }],
            },
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
        };

        info!("Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AssistantError::Transport(format!("Gemini API error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = %status, "Gemini API error response: {}", error_text);

            return Err(match status.as_u16() {
                429 => AssistantError::QuotaExhausted(error_text),
                401 | 403 => AssistantError::AuthRejected(error_text),
                _ => AssistantError::Transport(format!("Gemini API {}: {}", status, error_text)),
            });
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AssistantError::Transport(format!("Gemini parse error: {}", e))
        })?;

        Self::extract_reply(gemini_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::declarations;
    use serde_json::json;

    #[test]
    fn test_request_serialization_carries_declarations() {
        let request = GeminiRequest {
            contents: vec![Content::user_text("Log my lunch expense")],
            tools: vec![ToolsEntry {
                function_declarations: declarations(),
            }],
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: Some("You are a personal assistant".to_string()),
                    ..Part::default()
                }],
            },
            generation_config: GenerationConfig {
                temperature: 0.3,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
        };

        let serialized = serde_json::to_string(&request).unwrap();
        assert!(serialized.contains("functionDeclarations"));
        assert!(serialized.contains("log_transaction"));
        assert!(serialized.contains("systemInstruction"));
        // No stray nulls for unused part fields.
        assert!(!serialized.contains("functionCall\":null"));
    }

    #[test]
    fn test_extract_reply_with_function_calls() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "text": "Logging that now." },
                        { "functionCall": {
                            "name": "log_transaction",
                            "args": { "amount": 250, "type": "expense", "category": "Food" }
                        }}
                    ]
                }
            }]
        }))
        .unwrap();

        let reply = GeminiClient::extract_reply(response).unwrap();
        assert_eq!(reply.text, "Logging that now.");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "log_transaction");
    }

    #[test]
    fn test_extract_reply_empty_candidates() {
        let response: GeminiResponse = serde_json::from_value(json!({ "candidates": [] })).unwrap();
        assert!(matches!(
            GeminiClient::extract_reply(response),
            Err(AssistantError::EmptyResponse(_))
        ));
    }
}
