//! # casagent CLI
//!
//! Interactive CASA assistant. On startup it checks the container engine and
//! the CASA install, launches a long-lived idle container, and drops into a
//! `> ` prompt. Each prompt is forwarded to the model, which drives the
//! container through the exec/write bridge tools; the final reply is printed.
//!
//! Usage:
//!   casagent
//!   casagent --x11 --working-dir ./obs_2024
//!   casagent --model gpt-4.1 --max-turns 80
//!
//! Type `exit`, `quit` or `q` at the prompt to leave; the container is
//! stopped and removed on every exit path.

use casagent_agent::{Agent, AgentConfig, DEFAULT_MAX_TURNS};
use casagent_error::ErrorKind;
use casagent_runtime::{
    config, load_dotenv, load_instructions, ContainerSession, ContainerTools, EnvConfig,
    OpenAIProvider, ProviderConfig, ResponseProvider, SessionSettings,
};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "casagent")]
#[command(author, version, about = "Interactive CASA assistant backed by a podman container")]
struct Cli {
    /// Container engine binary
    #[arg(long, default_value = config::DEFAULT_ENGINE)]
    engine: String,

    /// Container image for the session
    #[arg(long, default_value = config::DEFAULT_IMAGE)]
    image: String,

    /// Host CASA installation directory (mounted read-only at /opt/casa)
    #[arg(long, default_value = config::DEFAULT_CASA_DIR)]
    casa_dir: PathBuf,

    /// Host analysisUtils directory (mounted read-only at /opt/analysisUtils)
    #[arg(long, default_value = config::DEFAULT_ANALYSIS_UTILS_DIR)]
    analysis_utils_dir: PathBuf,

    /// Host working directory (mounted read-write at /working)
    #[arg(long, default_value = ".")]
    working_dir: PathBuf,

    /// System prompt file read at startup
    #[arg(long, default_value = config::DEFAULT_SYSTEM_PROMPT)]
    system_prompt: PathBuf,

    /// Model to use (provider default when unset)
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum model round trips per prompt
    #[arg(long, default_value_t = DEFAULT_MAX_TURNS)]
    max_turns: usize,

    /// Forward the host X11 display into the container
    #[arg(long)]
    x11: bool,

    /// Enable verbose output (tool call tracing, usage summary)
    #[arg(short, long)]
    verbose: bool,

    /// Log filter directive (e.g. "casagent=debug")
    #[arg(long)]
    log_level: Option<String>,
}

/// Reserved tokens that terminate the interactive loop without a model call.
fn is_exit_command(input: &str) -> bool {
    matches!(
        input.trim().to_lowercase().as_str(),
        "exit" | "quit" | "q"
    )
}

async fn run_loop<P: ResponseProvider>(
    agent: &mut Agent<P>,
    session: &ContainerSession,
    verbose: bool,
) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Cannot initialize the prompt: {}", e);
            return;
        }
    };

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let prompt = line.trim();
                if prompt.is_empty() {
                    continue;
                }
                if is_exit_command(prompt) {
                    break;
                }
                let _ = rl.add_history_entry(prompt);

                let mut tools = ContainerTools::new(session);

                match agent.run_turn(prompt, &mut tools).await {
                    Ok(reply) => println!("Agent: {}", reply),
                    Err(e) if e.kind() == ErrorKind::TurnLimitExceeded => {
                        println!(
                            "The agent has exceeded the maximum number of turns.\n\
                             If you want to continue, please tell me."
                        );
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if verbose {
        let usage = agent.usage();
        println!(
            "\n{} model calls, {} tokens ({} in / {} out)",
            usage.total_calls,
            usage.total_tokens(),
            usage.total_input_tokens,
            usage.total_output_tokens
        );
    }
}

#[tokio::main]
async fn main() {
    // .env before anything else so the subscriber and provider see it
    load_dotenv();

    let cli = Cli::parse();

    let filter = match cli.log_level.as_deref() {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("casagent=info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let env = EnvConfig::from_env();

    let Some(api_key) = env.api_key.clone() else {
        eprintln!("OPENAI_API_KEY is not set (environment or .env).");
        std::process::exit(1);
    };

    let settings = SessionSettings {
        engine: cli.engine.clone(),
        image: cli.image.clone(),
        casa_dir: cli.casa_dir.clone(),
        analysis_utils_dir: cli.analysis_utils_dir.clone(),
        working_dir: cli.working_dir.clone(),
        x11: cli.x11,
    };

    // Fatal on any setup failure: probes run before the container is created,
    // so a failed probe leaves nothing behind.
    let mut session = match ContainerSession::launch(&settings, env.display.as_deref()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let instructions = match load_instructions(&cli.system_prompt, session.name()) {
        Ok(instructions) => instructions,
        Err(e) => {
            eprintln!("Startup failed: {}", e);
            session.close();
            std::process::exit(1);
        }
    };

    let provider = OpenAIProvider::new(ProviderConfig::openai(api_key));
    let agent_config = AgentConfig {
        model: cli.model.clone(),
        max_turns: cli.max_turns,
        verbose: cli.verbose,
    };
    let mut agent = Agent::with_config(provider, instructions, agent_config);
    if let Some(vector_store_id) = env.vector_store_id.clone() {
        agent = agent.with_file_search(vec![vector_store_id]);
    }

    tracing::info!(container = session.name(), "session ready");
    println!(
        "casagent v{} - container {} (type 'exit' to quit)",
        env!("CARGO_PKG_VERSION"),
        session.name()
    );

    run_loop(&mut agent, &session, cli.verbose).await;

    // Explicit teardown; Drop covers panics and early exits
    session.close();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_keywords_any_case() {
        for token in ["exit", "quit", "q", "EXIT", "Quit", "Q", "  exit  "] {
            assert!(is_exit_command(token), "{} should exit", token);
        }
    }

    #[test]
    fn test_non_exit_input() {
        for input in ["run casa", "exit now", "qq", "", "quit?"] {
            assert!(!is_exit_command(input), "{} should not exit", input);
        }
    }
}
