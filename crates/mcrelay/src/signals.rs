//! Termination signals that end the run loop.
//!
//! Handlers are installed before the relay starts accepting commands, so a
//! platform that cannot deliver signals is reported at startup instead of
//! when the operator first tries to stop the relay.

use std::fmt;
use std::io;
use tracing::info;

/// Which termination request arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT, or Ctrl+C on Windows
    Interrupt,
    /// SIGTERM, as sent by service managers
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Registered listeners for the signals that stop the relay.
///
/// # Platform Support
///
/// * **Unix platforms**: SIGINT and SIGTERM
/// * **Windows**: Ctrl+C, reported as [`ShutdownSignal::Interrupt`]
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Registers the signal listeners. Must be called inside a Tokio runtime.
    ///
    /// # Returns
    ///
    /// The installed listeners, or the I/O error raised by the platform when
    /// a handler could not be registered.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut signals = ShutdownSignals::install()?;
    /// // Serve until the operator stops the relay...
    /// let received = signals.recv().await;
    /// println!("stopping after {received}");
    /// ```
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Waits for the next termination signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> ShutdownSignal {
        let received = tokio::select! {
            _ = self.interrupt.recv() => ShutdownSignal::Interrupt,
            _ = self.terminate.recv() => ShutdownSignal::Terminate,
        };
        info!("Received {}", received);
        received
    }

    /// Waits for the next termination signal. A Ctrl+C listener that fails
    /// never resolves.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> ShutdownSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Ctrl+C listener failed: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C");
        ShutdownSignal::Interrupt
    }
}
