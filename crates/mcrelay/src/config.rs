//! Configuration management for the relay binary.
//!
//! Configuration is layered. The built-in defaults (`defaults.toml`, compiled
//! into the binary) always come first; override files are merged on top of
//! them table by table, so an override only needs the keys it changes:
//!
//! * with `--config FILE`, only that file (it must exist);
//! * otherwise `/etc/mcrelay/mcrelay.toml` and then `~/mcrelay.toml`, each
//!   only if present.

use relay_core::rcon_protocol::RconConfig;
use relay_core::{AuthorizationPolicy, PolicyError, RelayConfig, RestartSettings, GATED_COMMANDS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Built-in defaults. Every required key is present here.
pub const DEFAULTS: &str = include_str!("../defaults.toml");

/// System-wide override file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/mcrelay/mcrelay.toml";

/// Per-user override file name, looked up in the home directory.
pub const USER_CONFIG_FILE: &str = "mcrelay.toml";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid TOML in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("configuration has an unexpected shape: {0}")]
    Shape(#[source] toml::de::Error),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("Configuration validation failed: {0}")]
    Invalid(String),
}

/// Application configuration as it appears in the TOML files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text that marks a chat line as a relay command
    pub command_prefix: String,
    pub rcon: RconSettings,
    pub restart: RestartFileSettings,
    /// Flat `admin_*` and `{command}_allowed_*` lists
    pub permissions: BTreeMap<String, Vec<String>>,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconSettings {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub idle_window_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartFileSettings {
    pub container_name: String,
    pub executable: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter, overridden by `RUST_LOG`
    pub level: String,
    /// JSON formatting
    pub json_format: bool,
    /// Also append logs to this file
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Merges `overlay` into `base`. Tables present in both are updated key by
/// key, one level deep; every other value is replaced.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(update)) => {
                existing.extend(update);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn parse_table(origin: &str, text: &str) -> Result<toml::Table, ConfigError> {
    text.parse::<toml::Table>().map_err(|source| ConfigError::Parse {
        origin: origin.to_string(),
        source,
    })
}

/// Override files to consider, in merge order, and whether each must exist.
pub fn override_paths(explicit: Option<&Path>) -> Vec<(PathBuf, bool)> {
    match explicit {
        Some(path) => vec![(path.to_path_buf(), true)],
        None => {
            let mut paths = vec![(PathBuf::from(SYSTEM_CONFIG_PATH), false)];
            if let Some(home) = dirs::home_dir() {
                paths.push((home.join(USER_CONFIG_FILE), false));
            }
            paths
        }
    }
}

impl AppConfig {
    /// Builds the configuration from the defaults plus `overrides`, given as
    /// `(origin, toml text)` pairs in merge order.
    pub fn from_layers<I>(overrides: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut merged = parse_table("built-in defaults", DEFAULTS)?;
        for (origin, text) in overrides {
            merge_tables(&mut merged, parse_table(&origin, &text)?);
        }

        Self::deserialize(toml::Value::Table(merged)).map_err(ConfigError::Shape)
    }

    /// Loads and merges the configuration files.
    ///
    /// # Arguments
    ///
    /// * `explicit` - File given with `--config`. When set, only that file is
    ///   merged over the defaults and it must exist. Otherwise the system and
    ///   per-user files are merged in that order when present.
    ///
    /// # Returns
    ///
    /// The merged configuration and the files that were actually merged.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] for a missing required file or any unreadable
    /// file, [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Shape`] when the merged values do not fit
    /// [`AppConfig`].
    pub async fn load(explicit: Option<&Path>) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut layers = Vec::new();
        let mut merged_from = Vec::new();

        for (path, required) in override_paths(explicit) {
            if !required && !path.exists() {
                continue;
            }
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
            layers.push((path.display().to_string(), text));
            merged_from.push(path);
        }

        Ok((Self::from_layers(layers)?, merged_from))
    }

    /// Checks the settings the relay itself does not look at. The rest is
    /// covered by [`RelayConfig::validate`] in [`AppConfig::to_relay_config`].
    pub fn validate(&self) -> Result<(), String> {
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {VALID_LOG_LEVELS:?}",
                &self.logging.level
            ));
        }

        if self.rcon.password.is_empty() {
            return Err("rcon.password must be set".to_string());
        }

        if let Some(path) = &self.logging.file_path {
            if path.trim().is_empty() {
                return Err("logging.file_path cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Converts the file representation into the typed relay configuration,
    /// validating both.
    pub fn to_relay_config(&self) -> Result<RelayConfig, ConfigError> {
        self.validate().map_err(ConfigError::Invalid)?;

        let policy =
            AuthorizationPolicy::from_flat(&self.permissions, GATED_COMMANDS.iter().copied())?;

        let config = RelayConfig {
            command_prefix: self.command_prefix.clone(),
            rcon: RconConfig {
                host: self.rcon.host.clone(),
                port: self.rcon.port,
                password: self.rcon.password.clone(),
                connect_timeout: Duration::from_millis(self.rcon.connect_timeout_ms),
                read_timeout: Duration::from_millis(self.rcon.read_timeout_ms),
                idle_window: Duration::from_millis(self.rcon.idle_window_ms),
            },
            restart: RestartSettings {
                container_name: self.restart.container_name.clone(),
                executable: self.restart.executable.clone(),
                timeout: Duration::from_secs(self.restart.timeout_secs),
            },
            policy,
        };

        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::Identity;
    use tempfile::NamedTempFile;

    fn with_password(extra: &str) -> Vec<(String, String)> {
        vec![(
            "test".to_string(),
            format!("[rcon]\npassword = \"s3cret\"\n{extra}"),
        )]
    }

    #[test]
    fn test_defaults_contain_every_required_key() {
        let config = AppConfig::from_layers(with_password("")).unwrap();

        assert_eq!(config.command_prefix, "!");
        assert_eq!(config.rcon.port, 25575);
        assert_eq!(config.restart.executable, "docker");
        assert_eq!(config.logging.level, "info");
        assert!(config.to_relay_config().is_ok());
    }

    #[test]
    fn test_defaults_alone_fail_validation_without_password() {
        let config = AppConfig::from_layers(Vec::new()).unwrap();
        assert!(matches!(
            config.to_relay_config(),
            Err(ConfigError::Invalid(message)) if message.contains("password")
        ));
    }

    #[test]
    fn test_override_updates_table_key_by_key() {
        let config = AppConfig::from_layers(vec![
            (
                "system".to_string(),
                "[rcon]\nhost = \"mc.internal\"\npassword = \"one\"\n".to_string(),
            ),
            (
                "user".to_string(),
                "[rcon]\npassword = \"two\"\n\n[permissions]\nkick_allowed_roles = [\"mod\"]\n"
                    .to_string(),
            ),
        ])
        .unwrap();

        assert_eq!(config.rcon.host, "mc.internal");
        assert_eq!(config.rcon.password, "two");
        assert_eq!(config.rcon.port, 25575);
        assert_eq!(config.permissions["kick_allowed_roles"], vec!["mod"]);
        assert!(config.permissions["ban_allowed_roles"].is_empty());
    }

    #[test]
    fn test_merge_replaces_non_table_values() {
        let mut base: toml::Table = "a = 1\n[t]\nx = 1\ny = 2\n".parse().unwrap();
        let overlay: toml::Table = "a = \"s\"\n[t]\ny = 3\n".parse().unwrap();
        merge_tables(&mut base, overlay);

        assert_eq!(base["a"].as_str(), Some("s"));
        assert_eq!(base["t"]["x"].as_integer(), Some(1));
        assert_eq!(base["t"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn test_permissions_reach_the_policy() {
        let config = AppConfig::from_layers(with_password(
            "\n[permissions]\nadmin_users = [\"alice\"]\n\"ban-ip_allowed_users\" = [\"bob\"]\n",
        ))
        .unwrap();
        let relay = config.to_relay_config().unwrap();

        assert!(relay.policy.is_admin(&Identity::new("alice")));
        assert!(relay
            .policy
            .authorize(&Identity::new("bob"), "ban-ip", false)
            .is_ok());
        assert!(relay
            .policy
            .authorize(&Identity::new("bob"), "ban", false)
            .is_err());
    }

    #[test]
    fn test_malformed_toml_names_its_origin() {
        let error = AppConfig::from_layers(vec![(
            "broken.toml".to_string(),
            "[rcon\nport = ".to_string(),
        )])
        .unwrap_err();

        assert!(matches!(&error, ConfigError::Parse { origin, .. } if origin == "broken.toml"));
    }

    #[test]
    fn test_wrong_value_type_is_a_shape_error() {
        let error = AppConfig::from_layers(with_password("port = \"not a number\"\n")).unwrap_err();
        assert!(matches!(error, ConfigError::Shape(_)));
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AppConfig::from_layers(with_password("")).unwrap();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid log level"));

        for level in VALID_LOG_LEVELS {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_relay_validation_is_applied() {
        let config = AppConfig::from_layers(with_password("port = 0\n")).unwrap();
        assert!(matches!(config.to_relay_config(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_explicit_path_is_the_only_override() {
        let explicit = PathBuf::from("/srv/mcrelay.toml");
        assert_eq!(override_paths(Some(&explicit)), vec![(explicit, true)]);

        let implicit = override_paths(None);
        assert_eq!(implicit[0], (PathBuf::from(SYSTEM_CONFIG_PATH), false));
        assert!(implicit.iter().all(|(_, required)| !required));
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(
            temp_file.path(),
            r#"
command_prefix = "mc!"

[rcon]
host = "10.0.0.5"
password = "from-file"
idle_window_ms = 400

[restart]
container_name = "survival"
executable = "podman"

[logging]
level = "debug"
json_format = true
"#,
        )
        .await
        .unwrap();

        let (config, merged) = AppConfig::load(Some(temp_file.path())).await.unwrap();

        assert_eq!(merged, vec![temp_file.path().to_path_buf()]);
        assert_eq!(config.command_prefix, "mc!");
        assert_eq!(config.rcon.host, "10.0.0.5");
        assert_eq!(config.rcon.read_timeout_ms, 10000);
        assert_eq!(config.restart.executable, "podman");
        assert_eq!(config.restart.timeout_secs, 120);
        assert!(config.logging.json_format);

        let relay = config.to_relay_config().unwrap();
        assert_eq!(relay.rcon.idle_window, Duration::from_millis(400));
        assert_eq!(relay.restart.container_name, "survival");
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");

        let error = AppConfig::load(Some(&missing)).await.unwrap_err();
        assert!(matches!(error, ConfigError::Read { path, .. } if path == missing));
    }
}
