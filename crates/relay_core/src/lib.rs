//! # Relay Core
//!
//! Everything between a chat message and the game server: who may run
//! which command, what each command means, how it is sent over RCON and how
//! the server's container is restarted.
//!
//! ## Modules
//!
//! * [`auth`] - authorization policy and decisions
//! * [`commands`] - command table, argument parsing and console rendering
//! * [`relay`] - [`CommandRelay`], the dispatch boundary
//! * [`restart`] - single-flight container restart
//! * [`gateway`] - trait implemented by chat platform adapters
//! * [`config`] - typed configuration consumed by [`CommandRelay::from_config`]

pub mod auth;
pub mod commands;
pub mod config;
pub mod gateway;
pub mod relay;
pub mod restart;

pub use auth::{AllowList, AuthorizationPolicy, Grant, Identity, PermissionDenied, PolicyError};
pub use commands::{RelayCommand, WhitelistAction, GATED_COMMANDS};
pub use config::{RelayConfig, RestartSettings};
pub use gateway::{ChatGateway, GatewayError};
pub use relay::{CommandRelay, Invocation, RemoteConsole};
pub use restart::{
    ContainerLifecycle, DockerCli, LifecycleError, RestartError, RestartGuard, RestartOrchestrator,
    RestartOutcome, RestartPhase, RestartState,
};

pub use rcon_protocol;
