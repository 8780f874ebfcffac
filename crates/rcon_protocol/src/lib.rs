//! # RCON Protocol
//!
//! Client side of the Source/Minecraft remote console protocol: a
//! length-prefixed binary request/response protocol over TCP with a
//! shared-secret login.
//!
//! ## Modules
//!
//! * [`packet`] - wire framing for single packets
//! * [`client`] - connection, login, command execution and response reassembly
//! * [`sanitize`] - stripping terminal escape sequences from console output
//!
//! ## Example
//!
//! ```no_run
//! use rcon_protocol::{sanitize, RconClient, RconConfig};
//!
//! # async fn run() -> Result<(), rcon_protocol::RconError> {
//! let client = RconClient::new(RconConfig {
//!     host: "127.0.0.1".to_string(),
//!     port: 25575,
//!     password: "secret".to_string(),
//!     ..Default::default()
//! });
//!
//! let players = client.execute("list").await?;
//! println!("{}", sanitize(&players));
//! # Ok(())
//! # }
//! ```
//!
//! The protocol itself is unauthenticated beyond the shared secret and
//! unencrypted; run it over trusted networks only.

pub mod client;
pub mod error;
pub mod packet;
pub mod sanitize;

pub use client::{RconClient, RconConfig};
pub use error::{RconError, RconResult};
pub use packet::{Direction, Packet, PacketError, PacketType};
pub use sanitize::{sanitize, strip_formatting_codes};
