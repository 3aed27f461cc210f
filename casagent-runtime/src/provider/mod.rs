//! # LLM Provider Interface
//!
//! A trait-based abstraction for the model backend driving the agent.
//!
//! ## Design
//! - `ResponseProvider` trait defines the core interface
//! - The OpenAI Responses API implementation lives in `openai`
//! - Conversation state is server-side: each response carries an id, and the
//!   next request threads it back as `previous_response_id`
//! - Function tools plus the hosted `file_search` tool

pub mod openai;

pub use openai::OpenAIProvider;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Core Types
// ============================================================================

/// A tool/function that the model can call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id to echo back with the tool output
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    /// Parse arguments as JSON
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

/// One item of model input
#[derive(Debug, Clone)]
pub enum InputItem {
    /// A user message
    UserText(String),
    /// The output of a tool call from the previous response
    FunctionCallOutput { call_id: String, output: String },
}

impl InputItem {
    pub fn user(text: impl Into<String>) -> Self {
        Self::UserText(text.into())
    }

    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionCallOutput {
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

/// Request parameters for one model round trip
#[derive(Debug, Clone, Default)]
pub struct ResponseRequest {
    pub input: Vec<InputItem>,
    pub model: Option<String>,
    pub instructions: Option<String>,
    /// Conversation cursor from the previous response
    pub previous_response_id: Option<String>,
    pub tools: Vec<ToolDefinition>,
    /// Vector stores backing the hosted file_search tool; empty disables it
    pub file_search_stores: Vec<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<usize>,
}

impl ResponseRequest {
    pub fn new(input: Vec<InputItem>) -> Self {
        Self {
            input,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_previous_response_id(mut self, id: Option<String>) -> Self {
        self.previous_response_id = id;
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_file_search(mut self, vector_store_ids: Vec<String>) -> Self {
        self.file_search_stores = vector_store_ids;
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_output_tokens(mut self, max: usize) -> Self {
        self.max_output_tokens = Some(max);
        self
    }
}

/// Response from one model round trip
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// The new conversation cursor
    pub id: String,
    pub model: String,
    /// Assistant text, if the model produced any
    pub output_text: Option<String>,
    /// Function calls the model wants executed
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl ModelResponse {
    /// Whether this response asks for tool execution
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Error type for provider operations
#[derive(Debug)]
pub enum ProviderError {
    /// Network/connection error
    Network(String),
    /// API returned an error
    Api { status: u16, message: String },
    /// Failed to parse response
    Parse(String),
    /// Rate limited
    RateLimited { retry_after: Option<u64> },
    /// Invalid request
    InvalidRequest(String),
    /// Model not found
    ModelNotFound(String),
    /// Authentication failed
    AuthenticationFailed,
    /// Other error
    Other(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::RateLimited { retry_after } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after {
                    write!(f, " (retry after {}s)", secs)?;
                }
                Ok(())
            }
            Self::InvalidRequest(e) => write!(f, "Invalid request: {}", e),
            Self::ModelNotFound(m) => write!(f, "Model not found: {}", m),
            Self::AuthenticationFailed => write!(f, "Authentication failed"),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProviderError {}

/// The main provider trait
#[allow(async_fn_in_trait)]
pub trait ResponseProvider: Send + Sync {
    /// Get the provider name (e.g., "openai")
    fn name(&self) -> &str;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Send one round trip and get the full response
    async fn respond(&self, request: ResponseRequest) -> Result<ModelResponse, ProviderError>;

    /// Simple prompt -> text helper
    async fn prompt(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = ResponseRequest::new(vec![InputItem::user(prompt)]);
        let response = self.respond(request).await?;
        response
            .output_text
            .ok_or_else(|| ProviderError::Other("No text in response".into()))
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// Configuration for creating providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: Some("https://api.openai.com/v1".into()),
            default_model: Some("gpt-4.1".into()),
            headers: HashMap::new(),
            timeout_secs: Some(120),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

// ============================================================================
// Usage Tracking
// ============================================================================

/// Tracks token usage across multiple calls
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    pub total_calls: usize,
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
    pub by_model: HashMap<String, Usage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, model: &str, usage: &Usage) {
        self.total_calls += 1;
        self.total_input_tokens += usage.input_tokens;
        self.total_output_tokens += usage.output_tokens;

        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.input_tokens += usage.input_tokens;
        entry.output_tokens += usage.output_tokens;
        entry.total_tokens += usage.total_tokens;
    }

    pub fn total_tokens(&self) -> usize {
        self.total_input_tokens + self.total_output_tokens
    }
}

// ============================================================================
// Tests
// ============================================================================
