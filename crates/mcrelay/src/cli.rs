//! Command-line interface handling for the relay.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
///
/// Everything except `--config` and `--check-config` overrides a value from
/// the configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Use only this configuration file on top of the built-in defaults
    pub config_path: Option<PathBuf>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Load and validate the configuration, then exit
    pub check_config: bool,
}

fn command() -> Command {
    Command::new("mcrelay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Relays chat commands to a Minecraft server over RCON")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file merged over the built-in defaults"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check-config")
                .long("check-config")
                .help("Validate the configuration and exit")
                .action(ArgAction::SetTrue),
        )
}

impl CliArgs {
    /// Parses command line arguments using clap.
    ///
    /// # Returns
    ///
    /// A `CliArgs` instance containing all parsed command-line options.
    ///
    /// # Exits
    ///
    /// Prints usage and exits the process on unknown flags, on `--help` and
    /// on `--version`, as clap does.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list, the first item being the binary
    /// name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches.get_one::<String>("config").map(PathBuf::from),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            check_config: matches.get_flag("check-config"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments() {
        let args = CliArgs::try_parse_from(["mcrelay"]).unwrap();
        assert_eq!(args, CliArgs::default());
    }

    #[test]
    fn test_all_arguments() {
        let args = CliArgs::try_parse_from([
            "mcrelay",
            "-c",
            "/srv/mcrelay.toml",
            "--log-level",
            "debug",
            "--json-logs",
            "--check-config",
        ])
        .unwrap();

        assert_eq!(args.config_path, Some(PathBuf::from("/srv/mcrelay.toml")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert!(args.check_config);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(CliArgs::try_parse_from(["mcrelay", "--daemon"]).is_err());
    }

    #[test]
    fn test_command_definition_is_consistent() {
        command().debug_assert();
    }
}
