//! RCON packet framing.
//!
//! Every packet on the wire is laid out as little-endian fields:
//!
//! ```text
//! length: i32 | id: i32 | type: i32 | body bytes | 0x00 | 0x00
//! ```
//!
//! `length` counts everything after itself, so it is always
//! `4 + 4 + body.len() + 2`. The same numeric type value (2) means
//! `EXECCOMMAND` when sent by the client and `AUTH_RESPONSE` when sent by the
//! server, which is why decoding needs to know the direction of travel.

use thiserror::Error;

/// Login request carrying the shared secret.
pub const SERVERDATA_AUTH: i32 = 3;
/// Server reply to a login request.
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
/// Console command sent by the client.
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
/// Server reply carrying (part of) a command's output.
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Id the server answers a rejected login with.
pub const AUTH_FAILURE_ID: i32 = -1;

/// Largest command body a Minecraft server accepts from a client.
pub const MAX_COMMAND_BODY: usize = 1446;

/// Upper bound accepted for an inbound `length` field.
pub const MAX_PACKET_LENGTH: usize = 1 << 20;

const LENGTH_FIELD: usize = 4;
const HEADER_LEN: usize = 8;
const TERMINATOR_LEN: usize = 2;

/// Smallest legal `length` value: id, type and the two terminators.
pub const MIN_PACKET_LENGTH: usize = HEADER_LEN + TERMINATOR_LEN;

/// Errors raised while encoding or decoding packets.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet body of {len} bytes exceeds the {max} byte limit")]
    BodyTooLarge { len: usize, max: usize },

    #[error("invalid packet length field: {0}")]
    InvalidLength(i32),

    #[error("unknown packet type {0}")]
    UnknownType(i32),
}

/// Which side of the connection produced a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// Logical packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Auth,
    AuthResponse,
    ExecCommand,
    ResponseValue,
}

impl PacketType {
    /// Numeric value written on the wire.
    pub fn as_i32(self) -> i32 {
        match self {
            PacketType::Auth => SERVERDATA_AUTH,
            PacketType::AuthResponse => SERVERDATA_AUTH_RESPONSE,
            PacketType::ExecCommand => SERVERDATA_EXECCOMMAND,
            PacketType::ResponseValue => SERVERDATA_RESPONSE_VALUE,
        }
    }

    /// Interprets a raw type value according to who sent it.
    pub fn from_wire(raw: i32, direction: Direction) -> Result<Self, PacketError> {
        match (direction, raw) {
            (Direction::ClientToServer, SERVERDATA_AUTH) => Ok(PacketType::Auth),
            (Direction::ClientToServer, SERVERDATA_EXECCOMMAND) => Ok(PacketType::ExecCommand),
            (Direction::ServerToClient, SERVERDATA_AUTH_RESPONSE) => Ok(PacketType::AuthResponse),
            (Direction::ServerToClient, SERVERDATA_RESPONSE_VALUE) => Ok(PacketType::ResponseValue),
            (_, other) => Err(PacketError::UnknownType(other)),
        }
    }
}

/// A single RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: PacketType,
    pub body: Vec<u8>,
}

impl Packet {
    pub fn new(id: i32, kind: PacketType, body: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Login packet carrying `password`.
    pub fn auth(id: i32, password: &str) -> Self {
        Self::new(id, PacketType::Auth, password.as_bytes())
    }

    /// Command packet, rejected locally if the server would refuse its size.
    pub fn command(id: i32, command: &str) -> Result<Self, PacketError> {
        if command.len() > MAX_COMMAND_BODY {
            return Err(PacketError::BodyTooLarge {
                len: command.len(),
                max: MAX_COMMAND_BODY,
            });
        }
        Ok(Self::new(id, PacketType::ExecCommand, command.as_bytes()))
    }

    /// Value of the length prefix for this packet.
    pub fn length(&self) -> usize {
        HEADER_LEN + self.body.len() + TERMINATOR_LEN
    }

    /// Serializes the packet, length prefix included.
    pub fn encode(&self) -> Vec<u8> {
        let length = self.length();
        let mut buffer = Vec::with_capacity(LENGTH_FIELD + length);

        buffer.extend_from_slice(&(length as i32).to_le_bytes());
        buffer.extend_from_slice(&self.id.to_le_bytes());
        buffer.extend_from_slice(&self.kind.as_i32().to_le_bytes());
        buffer.extend_from_slice(&self.body);
        buffer.extend_from_slice(&[0, 0]);

        buffer
    }

    /// Attempts to decode one packet from the front of `data`.
    ///
    /// Returns `Ok(None)` when `data` does not yet hold a complete packet,
    /// otherwise the packet and the number of bytes it occupied. Servers that
    /// omit the trailing null bytes are tolerated as long as the length field
    /// agrees with what was sent.
    pub fn decode(data: &[u8], direction: Direction) -> Result<Option<(Self, usize)>, PacketError> {
        if data.len() < LENGTH_FIELD {
            return Ok(None);
        }

        let raw_length = read_i32(data, 0);
        let length = usize::try_from(raw_length).map_err(|_| PacketError::InvalidLength(raw_length))?;
        if !(MIN_PACKET_LENGTH..=MAX_PACKET_LENGTH).contains(&length) {
            return Err(PacketError::InvalidLength(raw_length));
        }

        let total = LENGTH_FIELD + length;
        if data.len() < total {
            return Ok(None);
        }

        let id = read_i32(data, LENGTH_FIELD);
        let kind = PacketType::from_wire(read_i32(data, LENGTH_FIELD + 4), direction)?;

        let mut body = &data[LENGTH_FIELD + HEADER_LEN..total];
        for _ in 0..TERMINATOR_LEN {
            if let Some((&0, rest)) = body.split_last() {
                body = rest;
            }
        }

        Ok(Some((Self::new(id, kind, body), total)))
    }
}

fn read_i32(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
