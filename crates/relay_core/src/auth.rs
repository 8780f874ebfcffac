//! Per-user, per-command authorization.
//!
//! The policy is loaded once at startup and never changes during a run. A
//! decision is made fresh for every invocation, in this order:
//!
//! 1. `"ALL"` in `admin_users` or `admin_roles` grants everyone.
//! 2. A username listed in `admin_users` is granted.
//! 3. Any role listed in `admin_roles` is granted.
//! 4. A subcommand is granted once its enclosing group was.
//! 5. The command's own `{cmd}_allowed_users` / `{cmd}_allowed_roles` lists,
//!    again with `"ALL"` admitting everyone.
//!
//! Anything else is a [`PermissionDenied`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// List entry that admits every identity.
pub const WILDCARD: &str = "ALL";

/// Flat configuration key holding the admin usernames.
pub const ADMIN_USERS_KEY: &str = "admin_users";
/// Flat configuration key holding the admin roles.
pub const ADMIN_ROLES_KEY: &str = "admin_roles";

const ALLOWED_USERS_SUFFIX: &str = "_allowed_users";
const ALLOWED_ROLES_SUFFIX: &str = "_allowed_roles";

/// Configuration key for a command's user allow-list.
pub fn allowed_users_key(command: &str) -> String {
    format!("{command}{ALLOWED_USERS_SUFFIX}")
}

/// Configuration key for a command's role allow-list.
pub fn allowed_roles_key(command: &str) -> String {
    format!("{command}{ALLOWED_ROLES_SUFFIX}")
}

/// The caller behind one chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub roles: BTreeSet<String>,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// A set of usernames and a set of role names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    pub users: HashSet<String>,
    pub roles: HashSet<String>,
}

impl AllowList {
    pub fn new<U, R>(users: U, roles: R) -> Self
    where
        U: IntoIterator,
        U::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    fn is_wildcard(&self) -> bool {
        self.users.contains(WILDCARD) || self.roles.contains(WILDCARD)
    }

    fn lists_user(&self, username: &str) -> bool {
        self.users.contains(username)
    }

    fn lists_any_role(&self, roles: &BTreeSet<String>) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }
}

/// The rule that let an invocation through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    AdminWildcard,
    AdminUser,
    AdminRole,
    InheritedFromParent,
    CommandWildcard,
    CommandUser,
    CommandRole,
}

/// Recoverable refusal, shown to the caller and logged as a warning.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{username} does not have permission to run that command.")]
pub struct PermissionDenied {
    pub username: String,
    pub command: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("required permission key '{0}' is missing from the configuration")]
    MissingKey(String),
}

/// Immutable authorization policy.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    admins: AllowList,
    commands: HashMap<String, AllowList>,
}

impl AuthorizationPolicy {
    pub fn new(admins: AllowList) -> Self {
        Self {
            admins,
            commands: HashMap::new(),
        }
    }

    /// Adds or replaces the allow-lists of `command`.
    pub fn with_command(mut self, command: impl Into<String>, allowed: AllowList) -> Self {
        self.commands.insert(command.into(), allowed);
        self
    }

    /// Builds a policy from the flat key/value form used in configuration
    /// files.
    ///
    /// `admin_users`, `admin_roles` and both allow-list keys of every name in
    /// `gated_commands` must be present (they may be empty). Allow-lists of
    /// other commands are loaded too.
    pub fn from_flat<'a, I>(
        entries: &BTreeMap<String, Vec<String>>,
        gated_commands: I,
    ) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let required = |key: &str| {
            entries
                .get(key)
                .cloned()
                .ok_or_else(|| PolicyError::MissingKey(key.to_string()))
        };

        let admins = AllowList::new(required(ADMIN_USERS_KEY)?, required(ADMIN_ROLES_KEY)?);

        for command in gated_commands {
            required(&allowed_users_key(command))?;
            required(&allowed_roles_key(command))?;
        }

        let mut commands: HashMap<String, AllowList> = HashMap::new();
        for (key, values) in entries {
            if let Some(command) = key.strip_suffix(ALLOWED_USERS_SUFFIX) {
                commands
                    .entry(command.to_string())
                    .or_default()
                    .users
                    .extend(values.iter().cloned());
            } else if let Some(command) = key.strip_suffix(ALLOWED_ROLES_SUFFIX) {
                commands
                    .entry(command.to_string())
                    .or_default()
                    .roles
                    .extend(values.iter().cloned());
            }
        }

        Ok(Self { admins, commands })
    }

    /// Whether `identity` is covered by the admin rules alone.
    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.admin_grant(identity).is_some()
    }

    fn admin_grant(&self, identity: &Identity) -> Option<Grant> {
        if self.admins.is_wildcard() {
            Some(Grant::AdminWildcard)
        } else if self.admins.lists_user(&identity.username) {
            Some(Grant::AdminUser)
        } else if self.admins.lists_any_role(&identity.roles) {
            Some(Grant::AdminRole)
        } else {
            None
        }
    }

    /// Decides whether `identity` may run `command`.
    ///
    /// Admin rules are consulted first, then the parent grant, then the
    /// command's own allow-lists.
    ///
    /// # Arguments
    ///
    /// * `identity` - The caller, with the roles the chat platform reported
    /// * `command` - Command name, `"whitelist add"` style for subcommands
    /// * `invoked_as_subcommand` - Must only be true when the enclosing group
    ///   command was itself authorized for this invocation
    ///
    /// # Returns
    ///
    /// The [`Grant`] that admitted the caller, or [`PermissionDenied`]
    /// (already logged as a warning).
    ///
    /// # Example
    ///
    /// ```
    /// use relay_core::{AllowList, AuthorizationPolicy, Grant, Identity};
    ///
    /// let policy = AuthorizationPolicy::new(AllowList::new(["alice"], Vec::<String>::new()))
    ///     .with_command("kick", AllowList::new(Vec::<String>::new(), ["mod"]));
    ///
    /// let bob = Identity::new("bob").with_roles(["mod"]);
    /// assert_eq!(policy.authorize(&bob, "kick", false), Ok(Grant::CommandRole));
    /// assert!(policy.authorize(&bob, "ban", false).is_err());
    ///
    /// let alice = Identity::new("alice");
    /// assert_eq!(policy.authorize(&alice, "ban", false), Ok(Grant::AdminUser));
    /// ```
    pub fn authorize(
        &self,
        identity: &Identity,
        command: &str,
        invoked_as_subcommand: bool,
    ) -> Result<Grant, PermissionDenied> {
        let grant = self.admin_grant(identity).or_else(|| {
            if invoked_as_subcommand {
                return Some(Grant::InheritedFromParent);
            }

            let allowed = self.commands.get(command)?;
            if allowed.is_wildcard() {
                Some(Grant::CommandWildcard)
            } else if allowed.lists_user(&identity.username) {
                Some(Grant::CommandUser)
            } else if allowed.lists_any_role(&identity.roles) {
                Some(Grant::CommandRole)
            } else {
                None
            }
        });

        match grant {
            Some(grant) => {
                debug!("[{}] granted [{}] via {:?}", identity.username, command, grant);
                Ok(grant)
            }
            None => {
                warn!("{} does not have permission to run [{}]", identity.username, command);
                Err(PermissionDenied {
                    username: identity.username.clone(),
                    command: command.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMMANDS: [&str; 4] = ["list", "kick", "ban", "whitelist"];

    fn no_lists() -> Vec<String> {
        Vec::new()
    }

    fn flat(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        let mut entries = BTreeMap::new();
        entries.insert(ADMIN_USERS_KEY.to_string(), no_lists());
        entries.insert(ADMIN_ROLES_KEY.to_string(), no_lists());
        for command in COMMANDS {
            entries.insert(allowed_users_key(command), no_lists());
            entries.insert(allowed_roles_key(command), no_lists());
        }
        for (key, values) in pairs {
            entries.insert(key.to_string(), values.iter().map(|v| v.to_string()).collect());
        }
        entries
    }

    fn policy(pairs: &[(&str, &[&str])]) -> AuthorizationPolicy {
        AuthorizationPolicy::from_flat(&flat(pairs), COMMANDS).expect("complete policy")
    }

    #[test]
    fn test_admin_wildcard_grants_everything() {
        let policy = policy(&[("admin_users", &["ALL"])]);
        let alice = Identity::new("alice");

        for command in COMMANDS {
            assert_eq!(policy.authorize(&alice, command, false), Ok(Grant::AdminWildcard));
        }
    }

    #[test]
    fn test_admin_role_wildcard_grants_everything() {
        let policy = policy(&[("admin_roles", &["ALL"])]);
        assert_eq!(
            policy.authorize(&Identity::new("nobody"), "ban", false),
            Ok(Grant::AdminWildcard)
        );
    }

    #[test]
    fn test_admin_user_and_role() {
        let policy = policy(&[("admin_users", &["carol"]), ("admin_roles", &["ops"])]);

        assert_eq!(
            policy.authorize(&Identity::new("carol"), "kick", false),
            Ok(Grant::AdminUser)
        );
        assert_eq!(
            policy.authorize(&Identity::new("dave").with_roles(["ops"]), "kick", false),
            Ok(Grant::AdminRole)
        );
        assert!(policy.is_admin(&Identity::new("carol")));
        assert!(!policy.is_admin(&Identity::new("erin").with_roles(["mod"])));
    }

    #[test]
    fn test_admin_override_ignores_command_lists() {
        let policy = policy(&[("admin_users", &["alice"]), ("kick_allowed_users", &["bob"])]);
        assert_eq!(
            policy.authorize(&Identity::new("alice"), "kick", false),
            Ok(Grant::AdminUser)
        );
    }

    #[test]
    fn test_command_role_grants_only_that_command() {
        let policy = policy(&[("kick_allowed_roles", &["mod"])]);
        let bob = Identity::new("bob").with_roles(["mod"]);

        assert_eq!(policy.authorize(&bob, "kick", false), Ok(Grant::CommandRole));
        assert_eq!(
            policy.authorize(&bob, "ban", false),
            Err(PermissionDenied {
                username: "bob".to_string(),
                command: "ban".to_string(),
            })
        );
    }

    #[test]
    fn test_command_user_and_wildcards() {
        let policy = policy(&[
            ("ban_allowed_users", &["frank"]),
            ("list_allowed_users", &["ALL"]),
            ("whitelist_allowed_roles", &["ALL"]),
        ]);

        assert_eq!(
            policy.authorize(&Identity::new("frank"), "ban", false),
            Ok(Grant::CommandUser)
        );
        assert_eq!(
            policy.authorize(&Identity::new("anyone"), "list", false),
            Ok(Grant::CommandWildcard)
        );
        assert_eq!(
            policy.authorize(&Identity::new("anyone"), "whitelist", false),
            Ok(Grant::CommandWildcard)
        );
    }

    #[test]
    fn test_role_listed_only_in_users_list_is_not_a_role_match() {
        let policy = policy(&[("kick_allowed_users", &["mod"])]);
        let bob = Identity::new("bob").with_roles(["mod"]);
        assert!(policy.authorize(&bob, "kick", false).is_err());
    }

    #[test]
    fn test_subcommand_inherits_parent_grant() {
        let policy = policy(&[("whitelist_allowed_users", &["gina"])]);
        let gina = Identity::new("gina");

        assert!(policy.authorize(&gina, "whitelist", false).is_ok());
        assert_eq!(
            policy.authorize(&gina, "whitelist add", true),
            Ok(Grant::InheritedFromParent)
        );
        assert!(policy.authorize(&gina, "whitelist add", false).is_err());
    }

    #[test]
    fn test_unknown_command_is_denied_for_non_admins() {
        let policy = policy(&[]);
        assert!(policy.authorize(&Identity::new("hank"), "stop", false).is_err());
    }

    #[test]
    fn test_denial_message() {
        let denied = policy(&[])
            .authorize(&Identity::new("ivan"), "ban", false)
            .unwrap_err();
        assert_eq!(denied.to_string(), "ivan does not have permission to run that command.");
        assert_eq!(denied.command, "ban");
    }

    #[test]
    fn test_missing_keys_are_reported() {
        let mut entries = flat(&[]);
        entries.remove("kick_allowed_roles");
        assert_eq!(
            AuthorizationPolicy::from_flat(&entries, COMMANDS).unwrap_err(),
            PolicyError::MissingKey("kick_allowed_roles".to_string())
        );

        let mut entries = flat(&[]);
        entries.remove(ADMIN_USERS_KEY);
        assert_eq!(
            AuthorizationPolicy::from_flat(&entries, COMMANDS).unwrap_err(),
            PolicyError::MissingKey("admin_users".to_string())
        );
    }

    #[test]
    fn test_hyphenated_command_keys() {
        let mut entries = flat(&[]);
        entries.insert(allowed_users_key("ban-ip"), vec!["judy".to_string()]);
        entries.insert(allowed_roles_key("ban-ip"), Vec::new());
        let policy = AuthorizationPolicy::from_flat(&entries, ["ban-ip"]).unwrap();

        assert_eq!(
            policy.authorize(&Identity::new("judy"), "ban-ip", false),
            Ok(Grant::CommandUser)
        );
    }

    #[test]
    fn test_builder_matches_flat_form() {
        let policy = AuthorizationPolicy::new(AllowList::default())
            .with_command("kick", AllowList::new(Vec::<String>::new(), ["mod"]));
        let bob = Identity::new("bob").with_roles(["mod"]);

        assert_eq!(policy.authorize(&bob, "kick", false), Ok(Grant::CommandRole));
        assert!(policy.authorize(&bob, "ban", false).is_err());
    }
}
