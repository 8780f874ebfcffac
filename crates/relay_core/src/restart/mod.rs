//! The `restart-docker-server` workflow.
//!
//! A restart stops the game server's container, then starts it again. Only
//! one restart may run at a time across the whole relay; a second request
//! made while one is running is refused with the name of the user who
//! started the first.

mod guard;
mod lifecycle;

pub use guard::{RestartGuard, RestartPermit, RestartPhase, RestartState};
pub use lifecycle::{ContainerLifecycle, DockerCli, LifecycleError};

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RestartError {
    #[error("User [{holder}] is already running that command.")]
    AlreadyInProgress { holder: String },
}

/// How a restart that got past the guard ended.
#[derive(Debug)]
pub enum RestartOutcome {
    Restarted { initiated_by: String },
    /// The container is down and stays down.
    StartFailed(LifecycleError),
    StopFailed(LifecycleError),
}

impl RestartOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RestartOutcome::Restarted { .. })
    }

    /// Reply shown in chat.
    pub fn message(&self) -> String {
        match self {
            RestartOutcome::Restarted { initiated_by } => format!(
                "The Minecraft server was restarted per instruction of user [{initiated_by}]."
            ),
            RestartOutcome::StartFailed(e) => format!(
                "The Minecraft server was stopped but could not be started: {}.",
                diagnostic(e)
            ),
            RestartOutcome::StopFailed(e) => format!(
                "Something went wrong stopping the Minecraft server: {}.",
                diagnostic(e)
            ),
        }
    }
}

/// Error text without trailing punctuation, so the reply ends in exactly one
/// period.
fn diagnostic(error: &LifecycleError) -> String {
    error
        .to_string()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Runs restarts of one container under one [`RestartGuard`].
pub struct RestartOrchestrator {
    guard: Arc<RestartGuard>,
    lifecycle: Arc<dyn ContainerLifecycle>,
    container: String,
}

impl RestartOrchestrator {
    pub fn new(lifecycle: Arc<dyn ContainerLifecycle>, container: impl Into<String>) -> Self {
        Self {
            guard: RestartGuard::new(),
            lifecycle,
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn state(&self) -> RestartState {
        self.guard.snapshot()
    }

    /// Stops then starts the container on behalf of `user`.
    ///
    /// Returns `Err` only when another restart holds the guard; stop and
    /// start failures are reported through [`RestartOutcome`]. The guard is
    /// back to Idle when this returns, or if the future is dropped midway.
    pub async fn restart(&self, user: &str) -> Result<RestartOutcome, RestartError> {
        let permit = match self.guard.try_acquire(user) {
            Ok(permit) => permit,
            Err(e) => {
                warn!("[{}] asked for a restart while one is running: {}", user, e);
                return Err(e);
            }
        };

        info!(
            "Stopping container [{}] per instruction of user [{}]",
            self.container, user
        );
        if let Err(e) = self.lifecycle.stop(&self.container).await {
            error!("Failed to stop container [{}]: {}", self.container, e);
            return Ok(RestartOutcome::StopFailed(e));
        }
        info!("Container [{}] stopped", self.container);

        permit.begin_start();
        let outcome = match self.lifecycle.start(&self.container).await {
            Ok(()) => {
                info!(
                    "Container [{}] restarted per instruction of user [{}]",
                    self.container, user
                );
                RestartOutcome::Restarted {
                    initiated_by: user.to_string(),
                }
            }
            Err(e) => {
                error!(
                    "Container [{}] was stopped but failed to start: {}",
                    self.container, e
                );
                RestartOutcome::StartFailed(e)
            }
        };

        drop(permit);
        Ok(outcome)
    }
}
