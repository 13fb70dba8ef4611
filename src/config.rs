use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default host configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "agentcell.toml";

// Environment handed from the host to the sandbox child.
pub const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";
pub const ENV_MODEL: &str = "AGENTCELL_MODEL";
pub const ENV_WORKSPACE: &str = "AGENTCELL_WORKSPACE";
pub const ENV_KEEP_PREAMBLE: &str = "AGENTCELL_KEEP_PREAMBLE";

/// Host-side configuration (`agentcell.toml`).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LlmConfig {
    /// Ollama base URL as seen from inside the sandbox
    #[serde(default = "default_ollama_host")]
    pub host: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens_per_request: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SandboxConfig {
    #[serde(default = "default_image")]
    pub image: String,
    /// Container runtime program
    #[serde(default = "default_runtime")]
    pub runtime: String,
    /// Host directory bind-mounted into the sandbox. `~` is expanded.
    #[serde(default = "default_workspace")]
    pub workspace: String,
    #[serde(default = "default_mount_point")]
    pub mount_point: String,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct AgentConfig {
    /// Re-seed the context preamble after a conversation reset
    #[serde(default)]
    pub keep_preamble_on_reset: bool,
}

fn default_ollama_host() -> String {
    "http://host.docker.internal:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_image() -> String {
    "agentcell:dev".to_string()
}

fn default_runtime() -> String {
    "docker".to_string()
}

fn default_workspace() -> String {
    "~/agentcell_workspace".to_string()
}

fn default_mount_point() -> String {
    "/home/agentuser/workspace".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_model(),
            max_tokens_per_request: default_max_tokens(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            runtime: default_runtime(),
            workspace: default_workspace(),
            mount_point: default_mount_point(),
        }
    }
}

impl SandboxConfig {
    /// The workspace as an absolute host path, `~` expanded.
    pub fn workspace_path(&self) -> anyhow::Result<PathBuf> {
        let expanded = shellexpand::tilde(&self.workspace);
        let path = PathBuf::from(expanded.as_ref());
        if path.is_absolute() {
            Ok(path)
        } else {
            Ok(std::env::current_dir()?.join(path))
        }
    }
}

/// Values given on the `chat` command line. They win over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub model: Option<String>,
    pub ollama_host: Option<String>,
    pub workspace: Option<String>,
    pub image: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Expand environment variables like ${OLLAMA_HOST}
        let expanded = shellexpand::env(&content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Loads `path` when given (it must exist), else the default file when
    /// present, else built-in defaults.
    pub fn load_or_default(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(model) = overrides.model {
            self.llm.model = model;
        }
        if let Some(host) = overrides.ollama_host {
            self.llm.host = host;
        }
        if let Some(workspace) = overrides.workspace {
            self.sandbox.workspace = workspace;
        }
        if let Some(image) = overrides.image {
            self.sandbox.image = image;
        }
    }
}

/// Sandbox-side configuration, read from the environment the host set up.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxEnv {
    pub llm: LlmConfig,
    pub workspace: PathBuf,
    pub agent: AgentConfig,
}

impl SandboxEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup. Unset or
    /// blank variables fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            llm: LlmConfig {
                host: get(ENV_OLLAMA_HOST).unwrap_or_else(default_ollama_host),
                model: get(ENV_MODEL).unwrap_or_else(default_model),
                max_tokens_per_request: default_max_tokens(),
            },
            workspace: PathBuf::from(get(ENV_WORKSPACE).unwrap_or_else(default_mount_point)),
            agent: AgentConfig {
                keep_preamble_on_reset: get(ENV_KEEP_PREAMBLE)
                    .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                    .unwrap_or(false),
            },
        }
    }
}
