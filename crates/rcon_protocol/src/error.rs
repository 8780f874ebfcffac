//! Error types for RCON sessions.

use crate::packet::PacketError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong while running a command over RCON.
#[derive(Debug, Error)]
pub enum RconError {
    /// The endpoint refused the connection, or dropped it before the login
    /// handshake finished.
    #[error("RCON server at {addr} is unreachable: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The server rejected the shared secret.
    #[error("RCON authentication failed")]
    AuthenticationFailed,

    /// Socket failure after a successful login.
    #[error("RCON connection error: {0}")]
    Connection(#[from] io::Error),

    /// The server never answered within the read timeout.
    #[error("no response from RCON server within {0:?}")]
    Timeout(Duration),

    #[error("RCON protocol error: {0}")]
    Protocol(#[from] PacketError),
}

impl RconError {
    /// True for every failure that is about the transport rather than the
    /// credentials or a command refused locally for its size.
    pub fn is_connection_failure(&self) -> bool {
        !matches!(
            self,
            RconError::AuthenticationFailed
                | RconError::Protocol(PacketError::BodyTooLarge { .. })
        )
    }

    /// Text shown to the user who triggered the command.
    pub fn user_message(&self) -> String {
        match self {
            RconError::Unreachable { .. } => "The RCON server is unreachable.".to_string(),
            RconError::AuthenticationFailed => {
                "RCON authentication failed. Please check your RCON password in your config."
                    .to_string()
            }
            RconError::Protocol(PacketError::BodyTooLarge { len, max }) => {
                format!("Command is too long ({len} bytes, max {max}).")
            }
            other => format!("Lost connection to the RCON server: {other}"),
        }
    }
}

pub type RconResult<T> = Result<T, RconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_is_not_a_connection_failure() {
        assert!(!RconError::AuthenticationFailed.is_connection_failure());
        assert!(RconError::Timeout(Duration::from_secs(1)).is_connection_failure());
        assert!(RconError::Unreachable {
            addr: "127.0.0.1:25575".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        }
        .is_connection_failure());
    }

    #[test]
    fn test_user_messages() {
        let unreachable = RconError::Unreachable {
            addr: "mc:25575".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionReset),
        };
        assert_eq!(unreachable.user_message(), "The RCON server is unreachable.");
        assert!(RconError::AuthenticationFailed
            .user_message()
            .contains("check your RCON password"));
        assert!(RconError::Connection(io::Error::from(io::ErrorKind::BrokenPipe))
            .user_message()
            .starts_with("Lost connection to the RCON server"));
    }

    #[test]
    fn test_oversized_command_is_not_a_lost_connection() {
        let error = RconError::Protocol(PacketError::BodyTooLarge { len: 2000, max: 1446 });
        assert!(!error.is_connection_failure());
        assert_eq!(error.user_message(), "Command is too long (2000 bytes, max 1446).");

        let malformed = RconError::Protocol(PacketError::InvalidLength(3));
        assert!(malformed.is_connection_failure());
    }
}
