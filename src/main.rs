mod agent;
mod config;
mod llm;
mod protocol;
mod sandbox;
mod session;
mod skills;
mod supervisor;

use anyhow::{anyhow, bail, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Overrides, SandboxEnv};

fn print_help() {
    println!(
        "\
agentcell v{}

A local LLM agent whose tools run inside a supervised sandbox container.

USAGE:
    agentcell chat [OPTIONS]    Start a sandbox and chat with the agent
    agentcell serve             Run the agent side (inside the container)
    agentcell version           Print version and exit

CHAT OPTIONS:
    --config PATH          TOML configuration file [default: agentcell.toml]
    --model NAME           Ollama model to use
    --ollama-host URL      Ollama endpoint as seen from the container
    --workspace DIR        Host directory mounted into the sandbox
    --image IMAGE          Container image to run

OPTIONS:
    -h, --help       Print this help message and exit
    -V, --version    Print version and exit

ENVIRONMENT VARIABLES:
    Variables are referenced in the config file via ${{VAR_NAME}} syntax.

    RUST_LOG                   Log level filter for tracing, forwarded to
                               the sandbox (e.g. debug, agentcell=debug)
    OLLAMA_HOST                Ollama endpoint (serve)
    AGENTCELL_MODEL            Model name (serve)
    AGENTCELL_WORKSPACE        Workspace mount point (serve)
    AGENTCELL_KEEP_PREAMBLE    Keep the workspace preamble after a reset (serve)

EXAMPLES:
    agentcell chat                              # uses ./agentcell.toml if present
    agentcell chat --model qwen2.5 --workspace ~/scratch
    RUST_LOG=agentcell=debug agentcell chat     # with debug logging",
        env!("CARGO_PKG_VERSION"),
    );
}

enum Command {
    Chat {
        config_path: Option<String>,
        overrides: Overrides,
    },
    Serve,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some((command, rest)) = args.split_first() else {
        bail!("Missing command (try --help)");
    };

    match command.as_str() {
        "chat" => {
            let mut config_path = None;
            let mut overrides = Overrides::default();
            let mut rest = rest.iter();
            while let Some(flag) = rest.next() {
                let mut value = || {
                    rest.next()
                        .cloned()
                        .ok_or_else(|| anyhow!("Option {flag} needs a value"))
                };
                match flag.as_str() {
                    "--config" => config_path = Some(value()?),
                    "--model" => overrides.model = Some(value()?),
                    "--ollama-host" => overrides.ollama_host = Some(value()?),
                    "--workspace" => overrides.workspace = Some(value()?),
                    "--image" => overrides.image = Some(value()?),
                    other => bail!("Unknown option for chat: {other}"),
                }
            }
            Ok(Command::Chat {
                config_path,
                overrides,
            })
        }
        "serve" => match rest.first() {
            Some(extra) => bail!("serve takes no arguments (got {extra})"),
            None => Ok(Command::Serve),
        },
        other => bail!("Unknown command: {other} (try --help)"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Handle --help / --version before anything else
    for arg in &args {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("agentcell v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
    }
    if args.first().map(String::as_str) == Some("version") {
        println!("agentcell v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Logs go to stderr: stdout carries the protocol (serve) or the chat
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("agentcell=info")),
        )
        .init();

    match parse_args(&args)? {
        Command::Chat {
            config_path,
            overrides,
        } => {
            let mut config = Config::load_or_default(config_path.as_deref())?;
            config.apply(overrides);
            info!("LLM: ollama ({}) at {}", config.llm.model, config.llm.host);
            info!("Sandbox image: {} via {}", config.sandbox.image, config.sandbox.runtime);
            session::chat::run(config).await
        }
        Command::Serve => session::serve::run(SandboxEnv::from_env()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_chat_flags() {
        let parsed = parse_args(&args(&[
            "chat",
            "--config",
            "/etc/agentcell.toml",
            "--model",
            "qwen2.5",
            "--workspace",
            "/tmp/ws",
        ]))
        .unwrap();

        match parsed {
            Command::Chat {
                config_path,
                overrides,
            } => {
                assert_eq!(config_path.as_deref(), Some("/etc/agentcell.toml"));
                assert_eq!(overrides.model.as_deref(), Some("qwen2.5"));
                assert_eq!(overrides.workspace.as_deref(), Some("/tmp/ws"));
                assert!(overrides.image.is_none());
            }
            Command::Serve => panic!("expected chat"),
        }
    }

    #[test]
    fn test_parse_serve() {
        assert!(matches!(parse_args(&args(&["serve"])).unwrap(), Command::Serve));
        assert!(parse_args(&args(&["serve", "extra"])).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&args(&["launch"])).is_err());
        assert!(parse_args(&args(&["chat", "--model"])).is_err());
        assert!(parse_args(&args(&["chat", "--verbose"])).is_err());
    }
}
