//! Async RCON client.
//!
//! Every call to [`RconClient::execute`] opens a fresh TCP connection, logs in,
//! runs exactly one command and tears the connection down again. Nothing is
//! pooled or retried.
//!
//! The protocol has no end-of-response marker, so a response that spans
//! several packets is reassembled by reading until the line stays quiet for
//! [`RconConfig::idle_window`]. A link slower than that window can cut a
//! response short; raise the window for such servers.

use crate::error::{RconError, RconResult};
use crate::packet::{Direction, Packet, PacketError, PacketType, MAX_COMMAND_BODY};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

const READ_CHUNK: usize = 4096;

/// Connection parameters for an RCON endpoint.
#[derive(Debug, Clone)]
pub struct RconConfig {
    /// Host name or IP address of the game server
    pub host: String,
    /// RCON port (25575 for a stock Minecraft server)
    pub port: u16,
    /// Shared secret configured on the server
    pub password: String,
    /// How long to wait for the TCP handshake
    pub connect_timeout: Duration,
    /// How long to wait for the first packet of any reply
    pub read_timeout: Duration,
    /// Quiet period that ends a multi-packet response
    pub idle_window: Duration,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 25575,
            password: String::new(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            idle_window: Duration::from_millis(150),
        }
    }
}

impl RconConfig {
    /// `host:port` string used to connect and to label log lines.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Runs single commands against one RCON endpoint.
///
/// Cloning is cheap; clones share the configuration but never a socket.
#[derive(Debug, Clone)]
pub struct RconClient {
    config: Arc<RconConfig>,
}

impl RconClient {
    pub fn new(config: RconConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RconConfig {
        &self.config
    }

    /// Connects, authenticates, runs `command` and returns the reassembled
    /// response text.
    ///
    /// The command string is sent as-is, including an empty one. The
    /// connection is closed before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// * [`RconError::Protocol`] with `BodyTooLarge` when `command` is longer
    ///   than [`MAX_COMMAND_BODY`]; nothing is sent in that case
    /// * [`RconError::Unreachable`] when the connection or the login
    ///   handshake fails at the socket level
    /// * [`RconError::AuthenticationFailed`] when the password is rejected
    /// * [`RconError::Timeout`] when no reply arrives within the read timeout
    /// * [`RconError::Connection`] for socket errors after login
    pub async fn execute(&self, command: &str) -> RconResult<String> {
        if command.len() > MAX_COMMAND_BODY {
            return Err(RconError::Protocol(PacketError::BodyTooLarge {
                len: command.len(),
                max: MAX_COMMAND_BODY,
            }));
        }

        let mut connection = RconConnection::connect(&self.config).await?;

        let result = match connection.login(&self.config.password).await {
            Ok(()) => connection.command(command).await,
            Err(e) => Err(e),
        };

        connection.close().await;
        result
    }
}

/// One authenticated-or-authenticating TCP session.
struct RconConnection {
    stream: TcpStream,
    addr: String,
    buffer: Vec<u8>,
    next_id: i32,
    read_timeout: Duration,
    idle_window: Duration,
}

impl RconConnection {
    async fn connect(config: &RconConfig) -> RconResult<Self> {
        let addr = config.endpoint();
        debug!("Connecting to RCON endpoint {}", addr);

        let stream = match timeout(config.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(RconError::Unreachable { addr, source }),
            Err(_) => {
                return Err(RconError::Unreachable {
                    addr,
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                })
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY on {}: {}", addr, e);
        }

        Ok(Self {
            stream,
            addr,
            buffer: Vec::with_capacity(READ_CHUNK),
            next_id: 1,
            read_timeout: config.read_timeout,
            idle_window: config.idle_window,
        })
    }

    fn allocate_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = if id == i32::MAX { 1 } else { id + 1 };
        id
    }

    fn unreachable(&self, source: io::Error) -> RconError {
        RconError::Unreachable {
            addr: self.addr.clone(),
            source,
        }
    }

    async fn send(&mut self, packet: &Packet) -> io::Result<()> {
        trace!(id = packet.id, kind = ?packet.kind, len = packet.body.len(), "sending packet");
        self.stream.write_all(&packet.encode()).await?;
        self.stream.flush().await
    }

    /// Reads the next packet, or `None` once the server has closed the stream.
    ///
    /// Bytes are only moved into the buffer after a completed `read`, so the
    /// future can be dropped by a timeout without losing partial packets.
    async fn read_packet(&mut self) -> RconResult<Option<Packet>> {
        loop {
            if let Some((packet, used)) = Packet::decode(&self.buffer, Direction::ServerToClient)? {
                self.buffer.drain(..used);
                trace!(id = packet.id, kind = ?packet.kind, len = packet.body.len(), "received packet");
                return Ok(Some(packet));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let read = self.stream.read(&mut chunk).await?;
            if read == 0 {
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }

    /// Performs the login handshake. Any socket trouble here, including the
    /// server hanging up, is reported as [`RconError::Unreachable`].
    async fn login(&mut self, password: &str) -> RconResult<()> {
        let id = self.allocate_id();
        if let Err(e) = self.send(&Packet::auth(id, password)).await {
            return Err(self.unreachable(e));
        }

        loop {
            let packet = match timeout(self.read_timeout, self.read_packet()).await {
                Err(_) => return Err(RconError::Timeout(self.read_timeout)),
                Ok(Err(RconError::Connection(source))) => return Err(self.unreachable(source)),
                Ok(Err(other)) => return Err(other),
                Ok(Ok(None)) => {
                    return Err(self.unreachable(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "connection closed during login",
                    )))
                }
                Ok(Ok(Some(packet))) => packet,
            };

            match packet.kind {
                PacketType::AuthResponse if packet.id == id => {
                    debug!("Authenticated with RCON endpoint {}", self.addr);
                    return Ok(());
                }
                PacketType::AuthResponse => {
                    debug!(
                        "RCON login rejected by {} (request id {}, response id {})",
                        self.addr, id, packet.id
                    );
                    return Err(RconError::AuthenticationFailed);
                }
                // Source-engine servers send an empty RESPONSE_VALUE ahead of
                // the AUTH_RESPONSE.
                _ => trace!("ignoring packet {} while waiting for login reply", packet.id),
            }
        }
    }

    /// Waits for the next reply packet carrying `id`, skipping strays.
    async fn next_response(&mut self, id: i32) -> RconResult<Option<Packet>> {
        loop {
            match self.read_packet().await? {
                Some(packet) if packet.id == id => return Ok(Some(packet)),
                Some(packet) => trace!("skipping packet {} (expected {})", packet.id, id),
                None => return Ok(None),
            }
        }
    }

    /// Sends `command` and concatenates every reply packet until the idle
    /// window elapses.
    async fn command(&mut self, command: &str) -> RconResult<String> {
        let id = self.allocate_id();
        let packet = Packet::command(id, command)?;
        self.send(&packet).await?;

        let mut body = match timeout(self.read_timeout, self.next_response(id)).await {
            Err(_) => return Err(RconError::Timeout(self.read_timeout)),
            Ok(result) => match result? {
                Some(first) => first.body,
                None => {
                    return Err(RconError::Connection(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed before a response arrived",
                    )))
                }
            },
        };
        let mut packets = 1usize;

        loop {
            match timeout(self.idle_window, self.next_response(id)).await {
                Err(_) => break,
                Ok(Ok(Some(next))) => {
                    packets += 1;
                    body.extend_from_slice(&next.body);
                }
                Ok(Ok(None)) => break,
                Ok(Err(e)) => return Err(e),
            }
        }

        debug!(
            "RCON command answered by {} with {} bytes in {} packet(s)",
            self.addr,
            body.len(),
            packets
        );
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Shuts the write half down and drops the socket.
    async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            trace!("RCON connection to {} already closed: {}", self.addr, e);
        }
    }
}
