//! System operations: shell commands with a deadline, host information

use crate::params::{require_str, u64_or, Workspace};
use crate::registry::Operation;
use planchain_core::{OperationOutput, OperationSchema, ParamDef, ParamType, Params, Result};
use serde_json::json;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const CATEGORY: &str = "system_operations";
const MAX_TIMEOUT_SECS: u64 = 600;

pub struct ExecuteCommand {
    schema: OperationSchema,
    workspace: Workspace,
    default_timeout_secs: u64,
}

impl ExecuteCommand {
    pub fn new(workspace: Workspace, default_timeout_secs: u64) -> Self {
        Self {
            schema: OperationSchema::new(
                "execute_command",
                CATEGORY,
                "Run a shell command in the workspace and capture its output",
            )
            .param(ParamDef::required("command", ParamType::String, "Command line for bash -c"))
            .param(ParamDef::optional(
                "timeout",
                ParamType::Integer,
                "Deadline in seconds",
                default_timeout_secs,
            ))
            .returns("stdout, stderr, return_code")
            .example("execute_command('ls -la')"),
            workspace,
            default_timeout_secs,
        }
    }
}

#[async_trait::async_trait]
impl Operation for ExecuteCommand {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let command = require_str("execute_command", &params, "command")?;
        let timeout_secs =
            u64_or(&params, "timeout", self.default_timeout_secs).min(MAX_TIMEOUT_SECS);
        debug!(
            "execute_command: {}",
            command.chars().take(80).collect::<String>()
        );

        let mut cmd = Command::new("bash");
        cmd.arg("-c").arg(command).kill_on_drop(true);
        if !self.workspace.root().as_os_str().is_empty() {
            cmd.current_dir(self.workspace.root());
        }

        let deadline = Duration::from_secs(timeout_secs);
        let output = match tokio::time::timeout(deadline, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Ok(OperationOutput::failure(format!("Failed to execute: {}", e)))
            }
            Err(_) => {
                warn!("execute_command timed out after {}s", timeout_secs);
                return Ok(OperationOutput::failure(format!(
                    "Command timed out after {} seconds",
                    timeout_secs
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let return_code = output.status.code().unwrap_or(-1);

        // A non-zero exit is still a completed command; callers inspect return_code.
        Ok(OperationOutput::data(stdout.trim_end().to_string())
            .with("stdout", stdout)
            .with("stderr", stderr)
            .with("return_code", return_code))
    }
}

pub struct GetSystemInfo {
    schema: OperationSchema,
}

impl GetSystemInfo {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "get_system_info",
                CATEGORY,
                "Describe the host: OS, architecture, CPUs, working directory",
            )
            .returns("system_info"),
        }
    }
}

impl Default for GetSystemInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for GetSystemInfo {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, _params: Params) -> Result<OperationOutput> {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let info = json!({
            "system": std::env::consts::OS,
            "family": std::env::consts::FAMILY,
            "architecture": std::env::consts::ARCH,
            "cpu_count": cpu_count,
            "current_directory": cwd,
            "home_directory": dirs::home_dir().map(|p| p.display().to_string()),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        Ok(OperationOutput::ok().with("system_info", info))
    }
}
