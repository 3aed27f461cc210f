//! Bridge tools: the model's hands inside the session container
//!
//! Two callbacks are exposed to the model: `exec_command` runs a shell
//! command, `write_file` writes or appends literal content to a file. Both
//! return formatted stdout/stderr text and never raise; failures of the
//! command inside the container are the model's to interpret.

use crate::container::ContainerSession;
use crate::provider::{ToolCall, ToolDefinition};
use serde::Deserialize;

/// Tool name the model uses to run shell commands
pub const EXEC_COMMAND: &str = "exec_command";

/// Tool name the model uses to write files
pub const WRITE_FILE: &str = "write_file";

/// Seam between the agent loop and whatever executes tool calls.
///
/// Implementations must not fail: any problem is folded into the returned
/// text so the model can react to it.
pub trait ToolExecutor {
    /// Definitions advertised to the model
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Execute one tool call, returning its textual result
    fn execute(&mut self, call: &ToolCall) -> String;
}

/// Fold captured stdout/stderr into the text handed back to the model.
pub fn format_streams(stdout: &str, stderr: &str) -> String {
    format!("STDOUT:\n{}\nSTDERR:\n{}", stdout, stderr)
}

/// Build the in-container argv for a file write.
///
/// Mode `"w"` truncates, `"a"` appends. The content travels over stdin to
/// `tee`, so the path is a plain argument and nothing is ever interpolated
/// into interpreter source.
pub fn write_file_argv(mode: &str, path: &str) -> Result<Vec<String>, String> {
    match mode {
        "w" => Ok(vec!["tee".into(), path.into()]),
        "a" => Ok(vec!["tee".into(), "-a".into(), path.into()]),
        other => Err(format!("invalid mode '{}': expected 'w' or 'a'", other)),
    }
}

#[derive(Debug, Deserialize)]
struct ExecCommandArgs {
    container_name: String,
    command: String,
}

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    container_name: String,
    mode: String,
    file_path: String,
    content: String,
}

/// The bridge tools bound to one session container.
///
/// The session is borrowed, not owned: its lifecycle belongs to the caller
/// (spec'd teardown on all exit paths stays in one place).
pub struct ContainerTools<'a> {
    session: &'a ContainerSession,
    /// Echo tool activity to the terminal, as the interactive loop expects
    pub echo: bool,
}

impl<'a> ContainerTools<'a> {
    pub fn new(session: &'a ContainerSession) -> Self {
        Self { session, echo: true }
    }

    fn exec_command(&self, args: ExecCommandArgs) -> String {
        if args.container_name != self.session.name() {
            tracing::warn!(
                requested = %args.container_name,
                session = %self.session.name(),
                "tool call targeted a different container; using the session container"
            );
        }

        if self.echo {
            println!("\n\tCommand: {}\n", args.command);
        }

        match self.session.exec_shell(&args.command) {
            Ok(output) => format_streams(
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            ),
            Err(e) => format!("Error executing command: {}", e),
        }
    }

    fn write_file(&self, args: WriteFileArgs) -> String {
        let mode_str = if args.mode == "w" { "write" } else { "append" };
        if self.echo {
            println!(
                "\n\tWrite to file \"{}\" as mode \"{}\"\nContent:\n{}\n",
                args.file_path, mode_str, args.content
            );
        }

        let argv = match write_file_argv(&args.mode, &args.file_path) {
            Ok(argv) => argv,
            Err(e) => return format!("Error executing command: {}", e),
        };

        match self.session.exec_with_stdin(&argv, &args.content) {
            // tee echoes the content back on stdout; suppress it so the model
            // sees an empty stdout on success, like a plain write would give
            Ok(output) if output.status.success() => {
                format_streams("", &String::from_utf8_lossy(&output.stderr))
            }
            Ok(output) => format_streams(
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            ),
            Err(e) => format!("Error executing command: {}", e),
        }
    }
}

impl ToolExecutor for ContainerTools<'_> {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![exec_command_definition(), write_file_definition()]
    }

    fn execute(&mut self, call: &ToolCall) -> String {
        match call.name.as_str() {
            EXEC_COMMAND => match call.parse_arguments::<ExecCommandArgs>() {
                Ok(args) => self.exec_command(args),
                Err(e) => format!("Error parsing arguments for {}: {}", EXEC_COMMAND, e),
            },
            WRITE_FILE => match call.parse_arguments::<WriteFileArgs>() {
                Ok(args) => self.write_file(args),
                Err(e) => format!("Error parsing arguments for {}: {}", WRITE_FILE, e),
            },
            other => format!("Error: unknown tool '{}'", other),
        }
    }
}

/// Schema for `exec_command`
pub fn exec_command_definition() -> ToolDefinition {
    ToolDefinition::new(EXEC_COMMAND, "Execute a shell command in the container.")
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "container_name": {
                    "type": "string",
                    "description": "The name of the container."
                },
                "command": {
                    "type": "string",
                    "description": "The command to execute."
                }
            },
            "required": ["container_name", "command"]
        }))
}

/// Schema for `write_file`
pub fn write_file_definition() -> ToolDefinition {
    ToolDefinition::new(WRITE_FILE, "Write to a file in the container.")
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "container_name": {
                    "type": "string",
                    "description": "The name of the container."
                },
                "mode": {
                    "type": "string",
                    "enum": ["w", "a"],
                    "description": "The mode of the file operation. \"w\" for write, \"a\" for append."
                },
                "file_path": {
                    "type": "string",
                    "description": "The path to the file."
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file."
                }
            },
            "required": ["container_name", "mode", "file_path", "content"]
        }))
}
