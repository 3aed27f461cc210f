//! OpenAI Responses API provider implementation
//!
//! Conversation state lives on the server: each call returns a response id,
//! and the next call threads it back as `previous_response_id`.

use super::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OpenAI Responses API provider
pub struct OpenAIProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.timeout_secs.unwrap_or(120),
            ))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
    }
}

impl ResponseProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("gpt-4.1")
    }

    async fn respond(&self, request: ResponseRequest) -> Result<ModelResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(self.default_model());
        let api_request = build_api_request(model, &request);

        let mut req = self
            .client
            .post(format!("{}/responses", self.base_url()))
            .json(&api_request);

        if let Some(api_key) = &self.config.api_key {
            if !api_key.is_empty() {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }
        }

        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();

            if status == 429 {
                return Err(ProviderError::RateLimited { retry_after: None });
            } else if status == 401 {
                return Err(ProviderError::AuthenticationFailed);
            }

            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_api_response(api_response))
    }
}

// ============================================================================
// Wire format
// ============================================================================

fn build_api_request(model: &str, request: &ResponseRequest) -> ApiRequest {
    let input = request
        .input
        .iter()
        .map(|item| match item {
            InputItem::UserText(text) => ApiInputItem::Message {
                role: "user".into(),
                content: text.clone(),
            },
            InputItem::FunctionCallOutput { call_id, output } => {
                ApiInputItem::FunctionCallOutput {
                    r#type: "function_call_output".into(),
                    call_id: call_id.clone(),
                    output: output.clone(),
                }
            }
        })
        .collect();

    let mut tools: Vec<ApiTool> = request
        .tools
        .iter()
        .map(|t| ApiTool::Function {
            name: t.name.clone(),
            description: Some(t.description.clone()),
            parameters: Some(t.parameters.clone()),
        })
        .collect();

    if !request.file_search_stores.is_empty() {
        tools.push(ApiTool::FileSearch {
            vector_store_ids: request.file_search_stores.clone(),
        });
    }

    ApiRequest {
        model: model.to_string(),
        input,
        instructions: request.instructions.clone(),
        previous_response_id: request.previous_response_id.clone(),
        tools: if tools.is_empty() { None } else { Some(tools) },
        temperature: request.temperature,
        max_output_tokens: request.max_output_tokens,
    }
}

fn parse_api_response(api: ApiResponse) -> ModelResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for item in api.output {
        match item {
            ApiOutputItem::Message { content } => {
                for part in content {
                    if let ApiContentPart::OutputText { text: t } = part {
                        text.push_str(&t);
                    }
                }
            }
            ApiOutputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => {
                tool_calls.push(ToolCall {
                    id: call_id,
                    name,
                    arguments,
                });
            }
            ApiOutputItem::Other => {}
        }
    }

    let usage = api
        .usage
        .map(|u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    ModelResponse {
        id: api.id,
        model: api.model,
        output_text: if text.is_empty() { None } else { Some(text) },
        tool_calls,
        usage,
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    input: Vec<ApiInputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ApiInputItem {
    Message {
        role: String,
        content: String,
    },
    FunctionCallOutput {
        r#type: String,
        call_id: String,
        output: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiTool {
    Function {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        parameters: Option<serde_json::Value>,
    },
    FileSearch {
        vector_store_ids: Vec<String>,
    },
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    id: String,
    model: String,
    #[serde(default)]
    output: Vec<ApiOutputItem>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiOutputItem {
    Message {
        content: Vec<ApiContentPart>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentPart {
    OutputText {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: usize,
    output_tokens: usize,
    total_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_shape() {
        let request = ResponseRequest::new(vec![
            InputItem::user("CASA のバージョンを表示してください。"),
            InputItem::function_call_output("call_1", "STDOUT:\n6.6.1\n\nSTDERR:\n"),
        ])
        .with_instructions("You are a CASA assistant.")
        .with_previous_response_id(Some("resp_0".into()))
        .with_tools(vec![ToolDefinition::new("exec_command", "Run a command")])
        .with_file_search(vec!["vs_abc".into()]);

        let api = build_api_request("gpt-4.1", &request);
        let json = serde_json::to_value(&api).unwrap();

        assert_eq!(json["model"], "gpt-4.1");
        assert_eq!(json["previous_response_id"], "resp_0");
        assert_eq!(json["input"][0]["role"], "user");
        assert_eq!(json["input"][1]["type"], "function_call_output");
        assert_eq!(json["input"][1]["call_id"], "call_1");

        let tools = json["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["name"], "exec_command");
        assert_eq!(tools[1]["type"], "file_search");
        assert_eq!(tools[1]["vector_store_ids"][0], "vs_abc");
    }

    #[test]
    fn test_request_skips_absent_fields() {
        let request = ResponseRequest::new(vec![InputItem::user("hi")]);
        let api = build_api_request("gpt-4.1", &request);
        let json = serde_json::to_value(&api).unwrap();

        assert!(json.get("previous_response_id").is_none());
        assert!(json.get("instructions").is_none());
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_response_parsing_text_and_calls() {
        let raw = serde_json::json!({
            "id": "resp_1",
            "model": "gpt-4.1",
            "output": [
                {
                    "type": "function_call",
                    "call_id": "call_1",
                    "name": "exec_command",
                    "arguments": "{\"container_name\":\"casa-agent-1a2b3c4d\",\"command\":\"ls\"}"
                },
                {
                    "type": "message",
                    "role": "assistant",
                    "content": [
                        { "type": "output_text", "text": "Listing the working directory." }
                    ]
                },
                { "type": "file_search_call", "queries": ["calibration"] }
            ],
            "usage": { "input_tokens": 120, "output_tokens": 30, "total_tokens": 150 }
        });

        let api: ApiResponse = serde_json::from_value(raw).unwrap();
        let response = parse_api_response(api);

        assert_eq!(response.id, "resp_1");
        assert_eq!(
            response.output_text.as_deref(),
            Some("Listing the working directory.")
        );
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "exec_command");
        assert_eq!(response.tool_calls[0].id, "call_1");
        assert_eq!(response.usage.total_tokens, 150);
    }

    #[test]
    fn test_response_parsing_no_text() {
        let raw = serde_json::json!({
            "id": "resp_2",
            "model": "gpt-4.1",
            "output": [
                {
                    "type": "function_call",
                    "call_id": "call_2",
                    "name": "write_file",
                    "arguments": "{}"
                }
            ]
        });

        let api: ApiResponse = serde_json::from_value(raw).unwrap();
        let response = parse_api_response(api);

        assert!(response.output_text.is_none());
        assert!(response.wants_tools());
        assert_eq!(response.usage.total_tokens, 0);
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Api {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "API error (500): boom");

        let err = ProviderError::RateLimited {
            retry_after: Some(30),
        };
        assert!(err.to_string().contains("retry after 30s"));
    }
}
