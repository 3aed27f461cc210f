//! # casagent-agent
//!
//! Turn orchestration: forwards a user prompt to the model, executes the tool
//! calls it requests against the session container, and returns the final
//! textual reply together with an updated conversation cursor.

mod agent;

pub use agent::{Agent, AgentConfig, DEFAULT_MAX_TURNS};
