//! Configuration: environment loading and system prompt assembly

use casagent_error::{Error, Result};
use std::path::Path;

/// Default container engine binary
pub const DEFAULT_ENGINE: &str = "podman";

/// Default container image for the session
pub const DEFAULT_IMAGE: &str = "casa-skeleton-python";

/// Default CASA installation directory on the host
pub const DEFAULT_CASA_DIR: &str = "/usr/local/casa/casa-6.6.1-17-pipeline-2024.1.0.8";

/// Default analysisUtils directory on the host
pub const DEFAULT_ANALYSIS_UTILS_DIR: &str = "/usr/local/casa/analysis_scripts";

/// Default system prompt file, read at startup
pub const DEFAULT_SYSTEM_PROMPT: &str = "systemPrompt.md";

/// Load environment variables from a .env file (KEY=VALUE lines).
///
/// Tries the current directory first, then the workspace root relative to
/// this crate. Existing environment variables are never overwritten.
pub fn load_dotenv() {
    let manifest_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let candidates = [
        std::path::PathBuf::from(".env"),
        manifest_dir.join("..").join(".env"),
    ];

    for path in &candidates {
        if let Ok(contents) = std::fs::read_to_string(path) {
            apply_dotenv(&contents);
            return;
        }
    }
}

fn apply_dotenv(contents: &str) {
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if std::env::var(key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }
}

/// Values picked up from the process environment after `load_dotenv`.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    /// API key for the model provider
    pub api_key: Option<String>,
    /// Vector store backing the document-search tool
    pub vector_store_id: Option<String>,
    /// X11 display to forward into the container
    pub display: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            vector_store_id: std::env::var("VECTOR_STORE_ID").ok(),
            display: std::env::var("DISPLAY").ok(),
        }
    }
}

/// Read the system prompt file and append the generated operational suffix.
///
/// The suffix tells the model which container to target and where the
/// toolchain lives inside it.
pub fn load_instructions(path: &Path, container_name: &str) -> Result<String> {
    let system_prompt = std::fs::read_to_string(path)
        .map_err(|e| Error::prompt_missing(path.display().to_string()).set_source(e))?;

    Ok(format!(
        "{}You can operate the command by calling exec_command and the container name is {}. \
         You can use common commands in this bash. The path of Python is `python`. \
         The path of CASA is `/opt/casa/bin/casa`. analysisUtils is `/opt/analysisUtils`.",
        system_prompt, container_name
    ))
}
