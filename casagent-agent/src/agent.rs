//! Agent implementation - orchestrates the model <-> tool loop

use casagent_error::{Error, ErrorKind, Result};
use casagent_runtime::{
    InputItem, ProviderError, ResponseProvider, ResponseRequest, ToolExecutor, UsageTracker,
};

/// Turn budget per user prompt
pub const DEFAULT_MAX_TURNS: usize = 50;

/// Configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model override; the provider default is used when unset
    pub model: Option<String>,
    /// Maximum provider round trips per user prompt
    pub max_turns: usize,
    /// Enable verbose logging
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_turns: DEFAULT_MAX_TURNS,
            verbose: false,
        }
    }
}

/// The agent orchestrator - owns the conversation cursor and the turn loop.
///
/// Generic over the provider and handed a `ToolExecutor` per call, so both
/// seams can be substituted in tests.
pub struct Agent<P: ResponseProvider> {
    provider: P,
    /// System prompt plus the generated operational suffix
    instructions: String,
    /// Vector stores for the hosted file_search tool; empty disables it
    file_search_stores: Vec<String>,
    /// Conversation cursor: id of the last response
    previous_response_id: Option<String>,
    config: AgentConfig,
    usage: UsageTracker,
}

impl<P: ResponseProvider> Agent<P> {
    pub fn new(provider: P, instructions: impl Into<String>) -> Self {
        Self::with_config(provider, instructions, AgentConfig::default())
    }

    pub fn with_config(
        provider: P,
        instructions: impl Into<String>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            instructions: instructions.into(),
            file_search_stores: Vec::new(),
            previous_response_id: None,
            config,
            usage: UsageTracker::new(),
        }
    }

    /// Enable the hosted document-search tool
    pub fn with_file_search(mut self, vector_store_ids: Vec<String>) -> Self {
        self.file_search_stores = vector_store_ids;
        self
    }

    /// The current conversation cursor
    pub fn previous_response_id(&self) -> Option<&str> {
        self.previous_response_id.as_deref()
    }

    /// Accumulated token usage
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Run one user prompt to completion.
    ///
    /// Tool calls returned by the model are executed strictly sequentially in
    /// response order; their outputs go back batched in one follow-up
    /// request. The cursor advances on every successful round trip, including
    /// the one right before a turn-limit error, so a later prompt can pick up
    /// where the budget ran out.
    pub async fn run_turn<E: ToolExecutor>(
        &mut self,
        input: &str,
        tools: &mut E,
    ) -> Result<String> {
        let definitions = tools.definitions();
        let mut items = vec![InputItem::user(input)];

        for turn in 0..self.config.max_turns {
            let mut request = ResponseRequest::new(std::mem::take(&mut items))
                .with_instructions(self.instructions.clone())
                .with_tools(definitions.clone())
                .with_file_search(self.file_search_stores.clone())
                .with_previous_response_id(self.previous_response_id.clone());
            if let Some(model) = &self.config.model {
                request = request.with_model(model.clone());
            }

            let response = self.provider.respond(request).await.map_err(|e| {
                let kind = match &e {
                    ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
                    ProviderError::AuthenticationFailed => ErrorKind::AuthenticationFailed,
                    ProviderError::Network(_) => ErrorKind::NetworkFailed,
                    ProviderError::Parse(_) => ErrorKind::ParseFailed,
                    _ => ErrorKind::InferenceFailed,
                };
                Error::new(kind, e.to_string())
                    .with_operation("agent::run_turn")
                    .with_context("turn", turn.to_string())
            })?;

            self.usage.track(&response.model, &response.usage);
            self.previous_response_id = Some(response.id.clone());

            if response.wants_tools() {
                if self.config.verbose {
                    tracing::debug!(
                        turn,
                        calls = response.tool_calls.len(),
                        "executing tool calls"
                    );
                }
                items = response
                    .tool_calls
                    .iter()
                    .map(|call| {
                        InputItem::function_call_output(call.id.clone(), tools.execute(call))
                    })
                    .collect();
                continue;
            }

            return Ok(response.output_text.unwrap_or_default());
        }

        Err(Error::turn_limit_exceeded(self.config.max_turns)
            .with_operation("agent::run_turn"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casagent_error::ErrorKind;
    use casagent_runtime::{
        ModelResponse, ProviderError, ToolCall, ToolDefinition, Usage,
    };
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedProvider {
        responses: Mutex<VecDeque<ModelResponse>>,
        requests: Mutex<Vec<ResponseRequest>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ModelResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl ResponseProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn default_model(&self) -> &str {
            "test-model"
        }

        async fn respond(
            &self,
            request: ResponseRequest,
        ) -> std::result::Result<ModelResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ProviderError::Other("script exhausted".into()))
        }
    }

    struct FailingProvider {
        error: Mutex<Option<ProviderError>>,
    }

    impl FailingProvider {
        fn new(error: ProviderError) -> Self {
            Self {
                error: Mutex::new(Some(error)),
            }
        }
    }

    impl ResponseProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn default_model(&self) -> &str {
            "test-model"
        }

        async fn respond(
            &self,
            _request: ResponseRequest,
        ) -> std::result::Result<ModelResponse, ProviderError> {
            Err(self
                .error
                .lock()
                .unwrap()
                .take()
                .expect("one failure per test"))
        }
    }

    struct RecordingTools {
        calls: Vec<String>,
    }

    impl RecordingTools {
        fn new() -> Self {
            Self { calls: Vec::new() }
        }
    }

    impl ToolExecutor for RecordingTools {
        fn definitions(&self) -> Vec<ToolDefinition> {
            vec![ToolDefinition::new("exec_command", "run")]
        }

        fn execute(&mut self, call: &ToolCall) -> String {
            self.calls.push(call.name.clone());
            format!("STDOUT:\nran {}\n\nSTDERR:\n", call.name)
        }
    }

    fn text_response(id: &str, text: &str) -> ModelResponse {
        ModelResponse {
            id: id.into(),
            model: "test-model".into(),
            output_text: Some(text.into()),
            tool_calls: vec![],
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
                total_tokens: 15,
            },
        }
    }

    fn tool_response(id: &str, calls: &[(&str, &str)]) -> ModelResponse {
        ModelResponse {
            id: id.into(),
            model: "test-model".into(),
            output_text: None,
            tool_calls: calls
                .iter()
                .map(|(call_id, name)| ToolCall {
                    id: (*call_id).into(),
                    name: (*name).into(),
                    arguments: "{}".into(),
                })
                .collect(),
            usage: Usage::default(),
        }
    }

    #[tokio::test]
    async fn test_plain_reply_updates_cursor() {
        let provider = ScriptedProvider::new(vec![text_response("resp_1", "CASA is 6.6.1")]);
        let mut agent = Agent::new(provider, "instructions");
        let mut tools = RecordingTools::new();

        let reply = agent.run_turn("version?", &mut tools).await.unwrap();
        assert_eq!(reply, "CASA is 6.6.1");
        assert_eq!(agent.previous_response_id(), Some("resp_1"));
        assert!(tools.calls.is_empty());
    }

    #[tokio::test]
    async fn test_tool_calls_execute_in_order_and_round_trip() {
        let provider = ScriptedProvider::new(vec![
            tool_response("resp_1", &[("call_a", "exec_command"), ("call_b", "exec_command")]),
            text_response("resp_2", "done"),
        ]);
        let mut agent = Agent::new(provider, "instructions");
        let mut tools = RecordingTools::new();

        let reply = agent.run_turn("list files", &mut tools).await.unwrap();
        assert_eq!(reply, "done");
        assert_eq!(tools.calls.len(), 2);
        assert_eq!(agent.previous_response_id(), Some("resp_2"));

        // Second request must thread the cursor and carry both outputs
        let requests = agent.provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].previous_response_id.as_deref(), Some("resp_1"));
        assert_eq!(requests[1].input.len(), 2);
        match &requests[1].input[0] {
            InputItem::FunctionCallOutput { call_id, output } => {
                assert_eq!(call_id, "call_a");
                assert!(output.contains("STDOUT:"));
            }
            other => panic!("unexpected item: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_turn_limit_exceeded_is_recoverable() {
        // Every response demands more tools; the budget must cut it off.
        let responses: Vec<ModelResponse> = (0..3)
            .map(|i| tool_response(&format!("resp_{}", i), &[("call", "exec_command")]))
            .collect();
        let provider = ScriptedProvider::new(responses);
        let config = AgentConfig {
            max_turns: 3,
            ..Default::default()
        };
        let mut agent = Agent::with_config(provider, "instructions", config);
        let mut tools = RecordingTools::new();

        let err = agent.run_turn("loop forever", &mut tools).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TurnLimitExceeded);
        assert!(err.is_retryable());
        // Cursor still advanced so "continue" can resume
        assert_eq!(agent.previous_response_id(), Some("resp_2"));
    }

    #[tokio::test]
    async fn test_provider_error_surfaces_as_inference_failed() {
        let provider = ScriptedProvider::new(vec![]);
        let mut agent = Agent::new(provider, "instructions");
        let mut tools = RecordingTools::new();

        let err = agent.run_turn("hello", &mut tools).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InferenceFailed);
    }

    #[tokio::test]
    async fn test_rate_limit_surfaces_as_retryable() {
        let provider = FailingProvider::new(ProviderError::RateLimited { retry_after: None });
        let mut agent = Agent::new(provider, "instructions");
        let mut tools = RecordingTools::new();

        let err = agent.run_turn("hello", &mut tools).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_auth_failure_is_permanent() {
        let provider = FailingProvider::new(ProviderError::AuthenticationFailed);
        let mut agent = Agent::new(provider, "instructions");
        let mut tools = RecordingTools::new();

        let err = agent.run_turn("hello", &mut tools).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_network_error_maps_to_network_failed() {
        let provider =
            FailingProvider::new(ProviderError::Network("connection refused".into()));
        let mut agent = Agent::new(provider, "instructions");
        let mut tools = RecordingTools::new();

        let err = agent.run_turn("hello", &mut tools).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkFailed);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_file_search_is_attached_to_requests() {
        let provider = ScriptedProvider::new(vec![text_response("resp_1", "ok")]);
        let mut agent =
            Agent::new(provider, "instructions").with_file_search(vec!["vs_1".into()]);
        let mut tools = RecordingTools::new();

        agent.run_turn("search docs", &mut tools).await.unwrap();
        let requests = agent.provider.requests.lock().unwrap();
        assert_eq!(requests[0].file_search_stores, vec!["vs_1".to_string()]);
    }

    #[tokio::test]
    async fn test_usage_accumulates() {
        let provider = ScriptedProvider::new(vec![
            tool_response("resp_1", &[("call_a", "exec_command")]),
            text_response("resp_2", "done"),
        ]);
        let mut agent = Agent::new(provider, "instructions");
        let mut tools = RecordingTools::new();

        agent.run_turn("go", &mut tools).await.unwrap();
        assert_eq!(agent.usage().total_calls, 2);
        assert_eq!(agent.usage().total_tokens(), 15);
    }
}
