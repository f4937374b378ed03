//! Minimal Anthropic Claude API client.
//!
//! Only what a content oracle needs:
//! - Non-streaming completions with a per-client timeout
//! - Tool definitions and forced tool use for structured output

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors that can occur when using the Claude client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Model did not call tool '{0}'")]
    MissingToolUse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout => true,
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Claude API client.
#[derive(Clone)]
pub struct Claude {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Claude {
    /// Create a new Claude client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            client: build_http_client(DEFAULT_TIMEOUT)?,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Create a Claude client from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::NoApiKey)?;
        Self::new(api_key)
    }

    /// Set the model used for every request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, Error> {
        self.client = build_http_client(timeout)?;
        Ok(self)
    }

    /// Force the model to call `tool` and return the input it produced.
    pub async fn complete_with_forced_tool(
        &self,
        request: Request,
        tool: Tool,
    ) -> Result<serde_json::Value, Error> {
        let api_request = self.build_api_request(&request, &tool);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{API_BASE}/messages"))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        api_response
            .tool_input(&tool.name)
            .ok_or(Error::MissingToolUse(tool.name))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn build_api_request<'a>(&'a self, request: &'a Request, tool: &'a Tool) -> ApiRequest<'a> {
        ApiRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: "user",
                    content: &m.text,
                })
                .collect(),
            temperature: request.temperature,
            tools: [tool],
            tool_choice: ApiToolChoice {
                r#type: "tool",
                name: &tool.name,
            },
        }
    }
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30).min(timeout))
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))
}

fn network_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(e.to_string())
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A completion request. The tool to call is supplied separately.
#[derive(Debug, Clone)]
pub struct Request {
    pub max_tokens: usize,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
}

impl Request {
    /// Create a new request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            max_tokens: 1024,
            system: None,
            messages,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A user turn.
#[derive(Debug, Clone)]
pub struct Message {
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A tool definition.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    tools: [&'a Tool; 1],
    tool_choice: ApiToolChoice<'a>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiToolChoice<'a> {
    r#type: &'static str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
}

impl ApiResponse {
    /// Input of the first call to the named tool, if any.
    fn tool_input(self, tool_name: &str) -> Option<serde_json::Value> {
        self.content.into_iter().find_map(|block| match block {
            ApiContent::ToolUse { name, input } if name == tool_name => Some(input),
            _ => None,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    ToolUse {
        name: String,
        input: serde_json::Value,
    },
    /// Text and thinking blocks; the oracle only reads tool calls.
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_tool() -> Tool {
        Tool {
            name: "report".to_string(),
            description: "Report a reading".to_string(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn test_forced_tool_request_shape() {
        let client = Claude::new("test-key").unwrap().with_model("claude-3-opus");
        let request = Request::new(vec![Message::user("Hi")])
            .with_system("You narrate a text adventure")
            .with_max_tokens(500)
            .with_temperature(0.5);
        let tool = report_tool();

        let json = serde_json::to_value(client.build_api_request(&request, &tool)).unwrap();
        assert_eq!(json["model"], "claude-3-opus");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["system"], "You narrate a text adventure");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Hi");
        assert_eq!(json["tools"][0]["name"], "report");
        assert_eq!(json["tool_choice"]["type"], "tool");
        assert_eq!(json["tool_choice"]["name"], "report");
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let client = Claude::new("test-key").unwrap();
        let request = Request::new(vec![Message::user("Hi")]);
        let tool = report_tool();

        let json = serde_json::to_value(client.build_api_request(&request, &tool)).unwrap();
        assert_eq!(json["model"], DEFAULT_MODEL);
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_tool_input_skips_other_blocks() {
        let response: ApiResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "stop_reason": "tool_use",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "thinking out loud"},
                {"type": "tool_use", "id": "t1", "name": "report", "input": {"action": "take"}}
            ]
        }))
        .unwrap();
        assert_eq!(response.tool_input("report").unwrap()["action"], "take");
    }

    #[test]
    fn test_tool_input_missing() {
        let response: ApiResponse = serde_json::from_value(serde_json::json!({
            "content": [{"type": "text", "text": "no tools today"}]
        }))
        .unwrap();
        assert!(response.tool_input("report").is_none());
    }

    #[test]
    fn test_transient_errors() {
        assert!(Error::Timeout.is_transient());
        assert!(Error::Api { status: 529, message: String::new() }.is_transient());
        assert!(!Error::Api { status: 400, message: String::new() }.is_transient());
        assert!(!Error::NoApiKey.is_transient());
    }
}
