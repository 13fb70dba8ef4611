use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::{Config, ENV_KEEP_PREAMBLE, ENV_MODEL, ENV_OLLAMA_HOST, ENV_WORKSPACE};

/// Everything needed to start one sandbox container.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfig {
    /// Container runtime program, e.g. `docker`
    pub runtime: String,
    pub image: String,
    /// Unique per launch: `agentcell-<8 hex>`
    pub container_name: String,
    /// Host directory bind-mounted as the workspace
    pub workspace: PathBuf,
    pub mount_point: String,
    pub ollama_host: String,
    pub model: String,
    pub keep_preamble_on_reset: bool,
    /// Forwarded as `RUST_LOG` when set
    pub log_filter: Option<String>,
}

impl LaunchConfig {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            runtime: config.sandbox.runtime.clone(),
            image: config.sandbox.image.clone(),
            container_name: new_container_name(),
            workspace: config.sandbox.workspace_path()?,
            mount_point: config.sandbox.mount_point.clone(),
            ollama_host: config.llm.host.clone(),
            model: config.llm.model.clone(),
            keep_preamble_on_reset: config.agent.keep_preamble_on_reset,
            log_filter: std::env::var("RUST_LOG").ok().filter(|v| !v.is_empty()),
        })
    }

    /// Arguments passed to the runtime program.
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            // Remove the container when it exits
            "--rm".to_string(),
            "--name".to_string(),
            self.container_name.clone(),
        ];

        let mut env = vec![
            format!("{ENV_OLLAMA_HOST}={}", self.ollama_host),
            format!("{ENV_MODEL}={}", self.model),
            format!("{ENV_WORKSPACE}={}", self.mount_point),
        ];
        if self.keep_preamble_on_reset {
            env.push(format!("{ENV_KEEP_PREAMBLE}=1"));
        }
        if let Some(ref filter) = self.log_filter {
            env.push(format!("RUST_LOG={filter}"));
        }
        for var in env {
            args.push("-e".to_string());
            args.push(var);
        }

        args.push("-v".to_string());
        args.push(format!("{}:{}", self.workspace.display(), self.mount_point));

        // Keep stdin attached for the protocol
        args.push("-i".to_string());
        args.push(self.image.clone());
        args
    }

    /// The runtime command with all three standard streams piped.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.runtime);
        command
            .args(self.run_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

fn new_container_name() -> String {
    format!("agentcell-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch_config() -> LaunchConfig {
        LaunchConfig {
            runtime: "docker".to_string(),
            image: "agentcell:dev".to_string(),
            container_name: "agentcell-0123abcd".to_string(),
            workspace: PathBuf::from("/home/me/agentcell_workspace"),
            mount_point: "/home/agentuser/workspace".to_string(),
            ollama_host: "http://host.docker.internal:11434".to_string(),
            model: "llama3.2".to_string(),
            keep_preamble_on_reset: false,
            log_filter: None,
        }
    }

    #[test]
    fn test_run_args() {
        assert_eq!(
            launch_config().run_args(),
            vec![
                "run",
                "--rm",
                "--name",
                "agentcell-0123abcd",
                "-e",
                "OLLAMA_HOST=http://host.docker.internal:11434",
                "-e",
                "AGENTCELL_MODEL=llama3.2",
                "-e",
                "AGENTCELL_WORKSPACE=/home/agentuser/workspace",
                "-v",
                "/home/me/agentcell_workspace:/home/agentuser/workspace",
                "-i",
                "agentcell:dev",
            ]
        );
    }

    #[test]
    fn test_optional_env() {
        let config = LaunchConfig {
            keep_preamble_on_reset: true,
            log_filter: Some("agentcell=debug".to_string()),
            ..launch_config()
        };
        let args = config.run_args();
        assert!(args.contains(&"AGENTCELL_KEEP_PREAMBLE=1".to_string()));
        assert!(args.contains(&"RUST_LOG=agentcell=debug".to_string()));
        // Image stays last.
        assert_eq!(args.last().unwrap(), "agentcell:dev");
    }

    #[test]
    fn test_single_mount() {
        let args = launch_config().run_args();
        assert_eq!(args.iter().filter(|a| *a == "-v").count(), 1);
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.sandbox.workspace = "/srv/ws".to_string();
        config.llm.model = "qwen2.5".to_string();

        let launch = LaunchConfig::from_config(&config).unwrap();
        assert_eq!(launch.runtime, "docker");
        assert_eq!(launch.workspace, PathBuf::from("/srv/ws"));
        assert_eq!(launch.model, "qwen2.5");
        assert!(launch.container_name.starts_with("agentcell-"));
        assert_eq!(launch.container_name.len(), "agentcell-".len() + 8);
        assert!(launch.container_name["agentcell-".len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_container_names_are_unique() {
        assert_ne!(new_container_name(), new_container_name());
    }
}
