//! # casagent runtime
//!
//! The machinery behind the interactive CASA assistant.
//!
//! ## Core Concepts
//! - **Session**: one podman container, exclusively owned, alive for the whole run
//! - **Bridge tools**: `exec_command` and `write_file`, the model's hands inside the container
//! - **Provider**: trait-based access to the OpenAI Responses API
//! - **Config**: `.env` + environment loading and system prompt assembly

pub mod config;
pub mod container;
pub mod provider;
pub mod tools;

pub use config::{load_dotenv, load_instructions, EnvConfig};
pub use container::{probe_version, ContainerSession, SessionSettings, CONTAINER_NAME_PREFIX};
pub use provider::{
    InputItem, ModelResponse, OpenAIProvider, ProviderConfig, ProviderError, ResponseProvider,
    ResponseRequest, ToolCall, ToolDefinition, Usage, UsageTracker,
};
pub use tools::{format_streams, ContainerTools, ToolExecutor};
