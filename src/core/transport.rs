//! Transport contract
//!
//! A transport owns the network connection and the remote shell channel.
//! All operations take `&self` so the reader thread and the key dispatcher
//! can share one handle behind an `Arc`.

use std::fmt;
use std::io;
use thiserror::Error;

pub const DEFAULT_PORT: &str = "22";

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to dial {addr}: {source}")]
    DialFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("failed to open shell channel: {0}")]
    ChannelFailed(String),

    #[error("pty request failed: {0}")]
    PtyFailed(String),

    #[error("failed to read from session: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write to session: {0}")]
    Write(#[source] io::Error),

    #[error("failed to resize remote pty: {0}")]
    Resize(String),

    #[error("session is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Outcome of a single read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// `n` bytes were written into the buffer
    Data(usize),
    /// Nothing available yet
    Pending,
    /// The remote side closed the stream
    Eof,
}

/// Remote host address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: String,
}

impl Target {
    /// Build a target, falling back to port 22 when `port` is blank
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        let port = port.into();
        let port = if port.trim().is_empty() {
            DEFAULT_PORT.to_string()
        } else {
            port.trim().to_string()
        };
        Self {
            host: host.into().trim().to_string(),
            port,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Password credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Terminal geometry in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
}

impl Default for Geometry {
    fn default() -> Self {
        Self { cols: 80, rows: 40 }
    }
}

/// Byte-level access to a remote shell
pub trait Transport: Send + Sync {
    /// Send bytes to the shell's input stream
    fn write(&self, bytes: &[u8]) -> Result<()>;

    /// Read the next available output chunk
    fn read(&self, buf: &mut [u8]) -> Result<ReadStatus>;

    /// Tell the remote pty about a geometry change
    fn resize(&self, geometry: Geometry) -> Result<()>;

    /// Close input then the channel; a second call is a no-op
    fn close(&self) -> Result<()>;
}
