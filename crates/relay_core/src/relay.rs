//! Command dispatch: authorization, argument parsing and execution of one
//! chat command, ending in the text to reply with.

use crate::auth::{AuthorizationPolicy, Identity};
use crate::commands::{self, help_text, CommandError, RelayCommand};
use crate::config::RelayConfig;
use crate::restart::{DockerCli, RestartOrchestrator, RestartState};
use async_trait::async_trait;
use rcon_protocol::{sanitize, strip_formatting_codes, RconClient, RconResult};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Reply used when the server answered with nothing printable.
pub const NO_OUTPUT: &str = "The server returned no output.";

/// Runs a console command on the game server.
#[async_trait]
pub trait RemoteConsole: Send + Sync {
    async fn execute(&self, command: &str) -> RconResult<String>;
}

#[async_trait]
impl RemoteConsole for RconClient {
    async fn execute(&self, command: &str) -> RconResult<String> {
        RconClient::execute(self, command).await
    }
}

/// A command addressed to the relay by one chat user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub identity: Identity,
    pub name: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Builds an invocation from a raw chat line, or `None` when the line
    /// does not start with `prefix`.
    pub fn parse(identity: Identity, prefix: &str, text: &str) -> Option<Self> {
        let (name, args) = commands::parse_invocation(prefix, text)?;
        Some(Self {
            identity,
            name,
            args,
        })
    }
}

/// Handles invocations. Shared between concurrently running handlers; the
/// only mutable state is the restart guard inside the orchestrator.
pub struct CommandRelay {
    prefix: String,
    policy: AuthorizationPolicy,
    console: Arc<dyn RemoteConsole>,
    restart: RestartOrchestrator,
}

impl CommandRelay {
    pub fn new(
        prefix: impl Into<String>,
        policy: AuthorizationPolicy,
        console: Arc<dyn RemoteConsole>,
        restart: RestartOrchestrator,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            policy,
            console,
            restart,
        }
    }

    /// Wires the RCON client and the Docker CLI from a validated
    /// configuration.
    pub fn from_config(config: RelayConfig) -> Self {
        let lifecycle = DockerCli::new(config.restart.executable, config.restart.timeout);
        let restart = RestartOrchestrator::new(Arc::new(lifecycle), config.restart.container_name);
        Self::new(
            config.command_prefix,
            config.policy,
            Arc::new(RconClient::new(config.rcon)),
            restart,
        )
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn restart_state(&self) -> RestartState {
        self.restart.state()
    }

    /// Runs one invocation to completion and returns the reply text.
    ///
    /// The command is looked up and authorized, whitelist subcommands are
    /// authorized as well, and the arguments are parsed before anything is
    /// executed. Every invocation that gets that far is logged at `info`.
    ///
    /// # Returns
    ///
    /// The text to post back to the invoking user. Every failure, including
    /// a refusal, an RCON error or a failed restart, becomes a reply rather
    /// than an error.
    pub async fn handle(&self, invocation: &Invocation) -> String {
        match self.dispatch(invocation).await {
            Ok(reply) | Err(reply) => reply,
        }
    }

    async fn dispatch(&self, invocation: &Invocation) -> Result<String, String> {
        let identity = &invocation.identity;
        let Some(info) = commands::lookup(&invocation.name) else {
            debug!("[{}] tried unknown command [{}]", identity, invocation.name);
            return Err(self.explain(CommandError::Unknown(invocation.name.clone())));
        };

        if info.gated {
            self.policy
                .authorize(identity, info.name, false)
                .map_err(|denied| denied.to_string())?;
        }

        if info.name == "whitelist" {
            let sub = commands::whitelist_subcommand(&invocation.args)
                .map_err(|e| self.explain(e))?;
            self.policy
                .authorize(identity, &format!("whitelist {}", sub.name), true)
                .map_err(|denied| denied.to_string())?;
        }

        let command =
            RelayCommand::parse(&invocation.name, &invocation.args).map_err(|e| self.explain(e))?;

        info!("[{}] {}", identity, command.activity());
        Ok(self.execute(&command, identity).await)
    }

    async fn execute(&self, command: &RelayCommand, identity: &Identity) -> String {
        let Some(console_command) = command.rcon_command() else {
            return match command {
                RelayCommand::RestartDockerServer => {
                    match self.restart.restart(&identity.username).await {
                        Ok(outcome) => outcome.message(),
                        Err(refused) => refused.to_string(),
                    }
                }
                RelayCommand::Version => format!("mcrelay v{}", env!("CARGO_PKG_VERSION")),
                _ => help_text(&self.prefix),
            };
        };

        match (command, self.run_console(&console_command).await) {
            (_, Err(reply)) => reply,
            (RelayCommand::Say { message }, Ok(_)) => format!("Message [{message}] sent"),
            (RelayCommand::Tell { player, message }, Ok(_)) => {
                format!("Message [{message}] sent to player [{player}]")
            }
            (_, Ok(output)) => output,
        }
    }

    /// Runs `command` over RCON and returns the cleaned output, or the
    /// user-facing failure text.
    async fn run_console(&self, command: &str) -> Result<String, String> {
        match self.console.execute(command).await {
            Ok(raw) => {
                let cleaned = strip_formatting_codes(&sanitize(&raw));
                if cleaned.trim().is_empty() {
                    Ok(NO_OUTPUT.to_string())
                } else {
                    Ok(cleaned)
                }
            }
            Err(e) => {
                let reply = e.user_message();
                error!("{} ({})", reply, e);
                Err(reply)
            }
        }
    }

    fn explain(&self, error: CommandError) -> String {
        match error {
            CommandError::Unknown(name) => {
                format!("Unknown command [{}]. Try {}help.", name, self.prefix)
            }
            CommandError::MissingSubcommand | CommandError::WrongSubcommand(_) => format!(
                "{}\nSee {}help for the list of valid whitelist subcommands.",
                error, self.prefix
            ),
            CommandError::Usage(usage) => format!("Usage: {}{}", self.prefix, usage),
        }
    }
}
