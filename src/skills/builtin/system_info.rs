use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::sandbox::ToolResult;
use crate::skills::{parse_args, Param, Skill, SkillContext};

const DF_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

/// Reports facts about the machine the agent runs on.
pub struct SystemInfoSkill;

#[async_trait]
impl Skill for SystemInfoSkill {
    fn name(&self) -> &'static str {
        "get_system_info"
    }

    fn description(&self) -> &'static str {
        "Report the operating system, CPU count, memory and disk usage of the machine \
         the agent runs on."
    }

    fn parameters(&self) -> &'static [Param] {
        &[]
    }

    async fn execute(&self, params: Value, context: &SkillContext) -> ToolResult<String> {
        let _: NoArgs = parse_args(params)?;

        let mut lines = Vec::new();
        lines.push(format!("OS: {}", os_name().await));
        lines.push(format!("Architecture: {}", std::env::consts::ARCH));
        if let Some(host) = read_trimmed("/proc/sys/kernel/hostname").await {
            lines.push(format!("Hostname: {host}"));
        }
        if let Some(kernel) = read_trimmed("/proc/sys/kernel/osrelease").await {
            lines.push(format!("Kernel: {kernel}"));
        }
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        lines.push(format!("CPUs: {cpus}"));
        lines.push(format!("Runtime: agentcell {}", env!("CARGO_PKG_VERSION")));
        lines.push(format!("Memory: {}", memory_summary().await));
        lines.push(format!("Disk ({}):\n{}", context.root.path().display(), disk_usage(context.root.path()).await));

        Ok(lines.join("\n"))
    }
}

async fn read_trimmed(path: &str) -> Option<String> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn os_name() -> String {
    let pretty = tokio::fs::read_to_string("/etc/os-release")
        .await
        .ok()
        .and_then(|content| parse_os_release(&content));
    match pretty {
        Some(name) => format!("{} ({name})", std::env::consts::OS),
        None => std::env::consts::OS.to_string(),
    }
}

fn parse_os_release(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|v| v.trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

async fn memory_summary() -> String {
    match tokio::fs::read_to_string("/proc/meminfo").await {
        Ok(content) => parse_meminfo(&content).unwrap_or_else(|| "unavailable".to_string()),
        Err(_) => "unavailable".to_string(),
    }
}

/// Formats `MemTotal`/`MemAvailable` (kB) from `/proc/meminfo`.
fn parse_meminfo(content: &str) -> Option<String> {
    let field = |name: &str| -> Option<u64> {
        content
            .lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|v| v.parse().ok())
    };
    let total = field("MemTotal")?;
    match field("MemAvailable") {
        Some(available) => Some(format!(
            "{} total, {} available",
            format_kib(total),
            format_kib(available)
        )),
        None => Some(format!("{} total", format_kib(total))),
    }
}

fn format_kib(kib: u64) -> String {
    let mib = kib as f64 / 1024.0;
    if mib >= 1024.0 {
        format!("{:.1} GiB", mib / 1024.0)
    } else {
        format!("{mib:.0} MiB")
    }
}

async fn disk_usage(path: &Path) -> String {
    let output = tokio::time::timeout(
        DF_TIMEOUT,
        Command::new("df").arg("-h").arg(path).kill_on_drop(true).output(),
    )
    .await;
    match output {
        Ok(Ok(out)) if out.status.success() => {
            String::from_utf8_lossy(&out.stdout).trim_end().to_string()
        }
        Ok(Ok(out)) => {
            debug!("df exited with {}", out.status);
            "unavailable".to_string()
        }
        Ok(Err(e)) => {
            debug!("df failed: {e}");
            "unavailable".to_string()
        }
        Err(_) => "unavailable (df timed out)".to_string(),
    }
}
