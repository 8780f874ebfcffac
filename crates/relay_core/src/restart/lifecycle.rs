//! Stopping and starting the container that hosts the game server.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Stop/start of a named container. Implementations report failure through
/// [`LifecycleError`] and never panic on an unhealthy host.
#[async_trait]
pub trait ContainerLifecycle: Send + Sync {
    async fn stop(&self, container: &str) -> Result<(), LifecycleError>;
    async fn start(&self, container: &str) -> Result<(), LifecycleError>;
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not run [{command}]: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("[{command}] exited with {}{}", describe_code(.code), describe_stderr(.stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("[{command}] did not finish within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

fn describe_stderr(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Drives the container through the Docker command-line client:
/// `<executable> container stop|start <container>`.
#[derive(Debug, Clone)]
pub struct DockerCli {
    executable: String,
    timeout: Duration,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker", Duration::from_secs(120))
    }
}

impl DockerCli {
    pub fn new(executable: impl Into<String>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    async fn run(&self, action: &str, container: &str) -> Result<(), LifecycleError> {
        let command_line = format!("{} container {} {}", self.executable, action, container);
        debug!("Running {}", command_line);

        let child = Command::new(&self.executable)
            .args(["container", action, container])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LifecycleError::Launch {
                command: command_line.clone(),
                source,
            })?;

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(LifecycleError::Launch {
                    command: command_line,
                    source,
                })
            }
            Err(_) => {
                return Err(LifecycleError::TimedOut {
                    command: command_line,
                    timeout: self.timeout,
                })
            }
        };

        if output.status.success() {
            debug!("{} finished", command_line);
            Ok(())
        } else {
            Err(LifecycleError::Failed {
                command: command_line,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl ContainerLifecycle for DockerCli {
    async fn stop(&self, container: &str) -> Result<(), LifecycleError> {
        self.run("stop", container).await
    }

    async fn start(&self, container: &str) -> Result<(), LifecycleError> {
        self.run("start", container).await
    }
}
