//! The chat command surface: names, help, argument parsing and the console
//! command each one maps to.

mod parse;

pub use parse::{parse_invocation, split_arguments};

use thiserror::Error;

/// Static description of one command or subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    /// Whether the command has allow-lists of its own.
    pub gated: bool,
}

const fn gated(name: &'static str, usage: &'static str, help: &'static str) -> CommandInfo {
    CommandInfo {
        name,
        usage,
        help,
        gated: true,
    }
}

pub const COMMANDS: &[CommandInfo] = &[
    gated("list", "list", "List all online players"),
    gated(
        "say",
        "say <message>",
        "Send a message to every online player (surround the message with double quotes)",
    ),
    gated(
        "tell",
        "tell <player> <message>",
        "Send a private message to an online player (surround the message with double quotes)",
    ),
    gated(
        "whitelist",
        "whitelist <list|add|remove|on|off|reload>",
        "Whitelist commands",
    ),
    gated(
        "ban",
        "ban <player> [reason]",
        "Ban a player from the server (surround the reason in double quotes)",
    ),
    gated(
        "ban-ip",
        "ban-ip <address> [reason]",
        "Ban an IP address, or the address of a connected player, from the server",
    ),
    gated(
        "banlist",
        "banlist",
        "Display the list of banned players and IP addresses",
    ),
    gated(
        "kick",
        "kick <player> [reason]",
        "Kick a player off of the server (surround the reason in double quotes)",
    ),
    gated("pardon", "pardon <player>", "Pardon (unban) a player from the server"),
    gated(
        "pardon-ip",
        "pardon-ip <address>",
        "Pardon (unban) an IP address from the server",
    ),
    gated("op", "op <player>", "Grant OP status to a player"),
    gated("deop", "deop <player>", "Revoke OP status from a player"),
    gated(
        "restart-docker-server",
        "restart-docker-server",
        "Restart the Docker container running the Minecraft server",
    ),
    gated("version", "version", "Show the relay version"),
    CommandInfo {
        name: "help",
        usage: "help",
        help: "Show this message",
        gated: false,
    },
];

pub const WHITELIST_SUBCOMMANDS: &[CommandInfo] = &[
    gated("list", "whitelist list", "List players on the whitelist"),
    gated("add", "whitelist add <player>", "Add a player to the whitelist"),
    gated(
        "remove",
        "whitelist remove <player>",
        "Removes a player from the whitelist",
    ),
    gated("on", "whitelist on", "Turn the whitelist on"),
    gated("off", "whitelist off", "Turn the whitelist off"),
    gated("reload", "whitelist reload", "Reloads the whitelist"),
];

/// Top-level commands whose allow-lists must be present in the
/// configuration.
pub const GATED_COMMANDS: &[&str] = &[
    "list",
    "say",
    "tell",
    "whitelist",
    "ban",
    "ban-ip",
    "banlist",
    "kick",
    "pardon",
    "pardon-ip",
    "op",
    "deop",
    "restart-docker-server",
    "version",
];

pub fn lookup(name: &str) -> Option<&'static CommandInfo> {
    COMMANDS.iter().find(|info| info.name == name)
}

/// Resolves the whitelist subcommand named by the first argument.
pub fn whitelist_subcommand(args: &[String]) -> Result<&'static CommandInfo, CommandError> {
    let name = args.first().ok_or(CommandError::MissingSubcommand)?;
    WHITELIST_SUBCOMMANDS
        .iter()
        .find(|info| info.name == name.as_str())
        .ok_or_else(|| CommandError::WrongSubcommand(name.clone()))
}

/// One line per command, each prefixed for copy-paste.
pub fn help_text(prefix: &str) -> String {
    let mut text = String::from("Available commands:");
    for info in COMMANDS {
        text.push_str(&format!("\n{}{} - {}", prefix, info.usage, info.help));
    }
    for info in WHITELIST_SUBCOMMANDS {
        text.push_str(&format!("\n  {}{} - {}", prefix, info.usage, info.help));
    }
    text
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command [{0}].")]
    Unknown(String),

    #[error("Missing subcommand.")]
    MissingSubcommand,

    #[error("Wrong subcommand: {0}")]
    WrongSubcommand(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistAction {
    List,
    Add(String),
    Remove(String),
    On,
    Off,
    Reload,
}

/// A fully parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCommand {
    List,
    Say { message: String },
    Tell { player: String, message: String },
    Whitelist(WhitelistAction),
    Ban { player: String, reason: Option<String> },
    BanIp { address: String, reason: Option<String> },
    Banlist,
    Kick { player: String, reason: Option<String> },
    Pardon { player: String },
    PardonIp { address: String },
    Op { player: String },
    Deop { player: String },
    RestartDockerServer,
    Version,
    Help,
}

/// Words from `args` joined by single spaces, or `None` when there are none.
fn rest(args: &[String]) -> Option<String> {
    let joined = args.join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn after_first(args: &[String]) -> &[String] {
    args.get(1..).unwrap_or_default()
}

fn required(args: &[String], index: usize, usage: &'static str) -> Result<String, CommandError> {
    args.get(index)
        .filter(|word| !word.is_empty())
        .cloned()
        .ok_or(CommandError::Usage(usage))
}

fn with_reason(command: &str, target: &str, reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!("{command} {target} {reason}"),
        None => format!("{command} {target}"),
    }
}

impl RelayCommand {
    /// Parses `name` and its arguments. Extra trailing arguments to commands
    /// that take a fixed number are ignored.
    pub fn parse(name: &str, args: &[String]) -> Result<Self, CommandError> {
        let info = lookup(name).ok_or_else(|| CommandError::Unknown(name.to_string()))?;
        let usage = info.usage;

        let command = match info.name {
            "list" => RelayCommand::List,
            "say" => RelayCommand::Say {
                message: rest(args).ok_or(CommandError::Usage(usage))?,
            },
            "tell" => RelayCommand::Tell {
                player: required(args, 0, usage)?,
                message: rest(after_first(args)).ok_or(CommandError::Usage(usage))?,
            },
            "whitelist" => {
                let sub = whitelist_subcommand(args)?;
                RelayCommand::Whitelist(match sub.name {
                    "list" => WhitelistAction::List,
                    "add" => WhitelistAction::Add(required(args, 1, sub.usage)?),
                    "remove" => WhitelistAction::Remove(required(args, 1, sub.usage)?),
                    "on" => WhitelistAction::On,
                    "off" => WhitelistAction::Off,
                    _ => WhitelistAction::Reload,
                })
            }
            "ban" => RelayCommand::Ban {
                player: required(args, 0, usage)?,
                reason: rest(after_first(args)),
            },
            "ban-ip" => RelayCommand::BanIp {
                address: required(args, 0, usage)?,
                reason: rest(after_first(args)),
            },
            "banlist" => RelayCommand::Banlist,
            "kick" => RelayCommand::Kick {
                player: required(args, 0, usage)?,
                reason: rest(after_first(args)),
            },
            "pardon" => RelayCommand::Pardon {
                player: required(args, 0, usage)?,
            },
            "pardon-ip" => RelayCommand::PardonIp {
                address: required(args, 0, usage)?,
            },
            "op" => RelayCommand::Op {
                player: required(args, 0, usage)?,
            },
            "deop" => RelayCommand::Deop {
                player: required(args, 0, usage)?,
            },
            "restart-docker-server" => RelayCommand::RestartDockerServer,
            "version" => RelayCommand::Version,
            _ => RelayCommand::Help,
        };

        Ok(command)
    }

    /// The server console command this maps to, if any.
    pub fn rcon_command(&self) -> Option<String> {
        let command = match self {
            RelayCommand::List => "list".to_string(),
            RelayCommand::Say { message } => format!("say {message}"),
            RelayCommand::Tell { player, message } => format!("tell {player} {message}"),
            RelayCommand::Whitelist(action) => match action {
                WhitelistAction::List => "whitelist list".to_string(),
                WhitelistAction::Add(player) => format!("whitelist add {player}"),
                WhitelistAction::Remove(player) => format!("whitelist remove {player}"),
                WhitelistAction::On => "whitelist on".to_string(),
                WhitelistAction::Off => "whitelist off".to_string(),
                WhitelistAction::Reload => "whitelist reload".to_string(),
            },
            RelayCommand::Ban { player, reason } => with_reason("ban", player, reason),
            RelayCommand::BanIp { address, reason } => with_reason("ban-ip", address, reason),
            RelayCommand::Banlist => "banlist".to_string(),
            RelayCommand::Kick { player, reason } => with_reason("kick", player, reason),
            RelayCommand::Pardon { player } => format!("pardon {player}"),
            RelayCommand::PardonIp { address } => format!("pardon-ip {address}"),
            RelayCommand::Op { player } => format!("op {player}"),
            RelayCommand::Deop { player } => format!("deop {player}"),
            RelayCommand::RestartDockerServer | RelayCommand::Version | RelayCommand::Help => {
                return None
            }
        };
        Some(command)
    }

    /// What the invoking user is doing, for the audit log line
    /// `[user] is ...`.
    pub fn activity(&self) -> String {
        let because = |reason: &Option<String>| match reason {
            Some(reason) => format!(" because [{reason}]"),
            None => String::new(),
        };

        match self {
            RelayCommand::List => "is listing connected players".to_string(),
            RelayCommand::Say { message } => format!("is broadcasting message [{message}]"),
            RelayCommand::Tell { player, message } => {
                format!("is sending message [{message}] to player [{player}]")
            }
            RelayCommand::Whitelist(action) => match action {
                WhitelistAction::List => "is listing whitelisted players".to_string(),
                WhitelistAction::Add(player) => {
                    format!("is whitelisting Minecraft player [{player}]")
                }
                WhitelistAction::Remove(player) => {
                    format!("is removing Minecraft player [{player}] from the whitelist")
                }
                WhitelistAction::On => "is turning on the whitelist".to_string(),
                WhitelistAction::Off => "is turning off the whitelist".to_string(),
                WhitelistAction::Reload => "is reloading the whitelist".to_string(),
            },
            RelayCommand::Ban { player, reason } => {
                format!("is banning Minecraft player [{player}]{}", because(reason))
            }
            RelayCommand::BanIp { address, reason } => {
                format!("is banning IP address [{address}]{}", because(reason))
            }
            RelayCommand::Banlist => "is getting the banlist".to_string(),
            RelayCommand::Kick { player, reason } => {
                format!("is kicking Minecraft player [{player}]{}", because(reason))
            }
            RelayCommand::Pardon { player } => format!("is pardoning Minecraft player [{player}]"),
            RelayCommand::PardonIp { address } => format!("is pardoning IP address [{address}]"),
            RelayCommand::Op { player } => {
                format!("is granting OP status to Minecraft player [{player}]")
            }
            RelayCommand::Deop { player } => {
                format!("is revoking OP status from Minecraft player [{player}]")
            }
            RelayCommand::RestartDockerServer => {
                "is restarting the Minecraft server container".to_string()
            }
            RelayCommand::Version => "is checking the relay version".to_string(),
            RelayCommand::Help => "is reading the help".to_string(),
        }
    }
}
