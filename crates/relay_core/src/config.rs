//! Typed relay configuration, independent of the file format it came from.

use crate::auth::AuthorizationPolicy;
use rcon_protocol::RconConfig;
use std::time::Duration;

/// How the game server's container is restarted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartSettings {
    /// Container name or id passed to the container runtime
    pub container_name: String,
    /// Docker-compatible CLI (`docker`, `podman`, or a full path)
    pub executable: String,
    /// Upper bound for each of the stop and start steps
    pub timeout: Duration,
}

impl Default for RestartSettings {
    fn default() -> Self {
        Self {
            container_name: "minecraft".to_string(),
            executable: "docker".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Text that marks a chat line as a relay command, e.g. `!`
    pub command_prefix: String,
    pub rcon: RconConfig,
    pub restart: RestartSettings,
    pub policy: AuthorizationPolicy,
}

impl RelayConfig {
    /// Checks the values that would make the relay unusable at runtime.
    pub fn validate(&self) -> Result<(), String> {
        if self.command_prefix.trim().is_empty() {
            return Err("command_prefix must not be empty".to_string());
        }
        if self.command_prefix.chars().any(char::is_whitespace) {
            return Err("command_prefix must not contain whitespace".to_string());
        }

        if self.rcon.host.trim().is_empty() {
            return Err("RCON host must not be empty".to_string());
        }
        if self.rcon.port == 0 {
            return Err("RCON port cannot be 0".to_string());
        }
        if self.rcon.idle_window.is_zero() {
            return Err("RCON idle window must be greater than 0".to_string());
        }
        if self.rcon.read_timeout.is_zero() || self.rcon.connect_timeout.is_zero() {
            return Err("RCON timeouts must be greater than 0".to_string());
        }

        if self.restart.container_name.trim().is_empty() {
            return Err("restart container_name must not be empty".to_string());
        }
        if self.restart.executable.trim().is_empty() {
            return Err("restart executable must not be empty".to_string());
        }

        Ok(())
    }
}
