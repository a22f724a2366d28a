//! SSH transport
//!
//! Opens a password-authenticated SSH session with a pty-backed shell using
//! libssh2. Once the shell is running the session is switched to
//! non-blocking mode, so a read that finds nothing returns at once instead
//! of holding the channel while a keystroke waits to be written.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use ssh2::{Channel, ErrorCode, PtyModeOpcode, PtyModes, Session};
use tracing::{debug, info, warn};

use super::transport::{
    Credentials, Geometry, ReadStatus, Result, Target, Transport, TransportError,
};

/// libssh2's "would block" return code
const LIBSSH2_ERROR_EAGAIN: i32 = -37;

const RETRY_INTERVAL: Duration = Duration::from_millis(2);

/// How long a keystroke write or resize may wait on a full channel before
/// it is dropped
const INTERACTIVE_DEADLINE: Duration = Duration::from_millis(100);

/// Connection settings that are not credentials
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// TERM value requested for the pty
    pub term: String,
    /// Dial and handshake timeout
    pub timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            term: "xterm-256color".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct SshTransport {
    session: Session,
    channel: Mutex<Channel>,
    closed: AtomicBool,
}

impl SshTransport {
    /// Dial, authenticate, allocate a pty and start a shell
    pub fn open(
        target: &Target,
        credentials: &Credentials,
        geometry: Geometry,
        options: &SshOptions,
    ) -> Result<Self> {
        let addr = target.addr();
        info!(%addr, user = %credentials.username, "connecting");

        let tcp = dial(&addr, options.timeout)?;

        let mut session = Session::new()
            .map_err(|e| TransportError::AuthFailed(format!("ssh init: {}", e)))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(options.timeout.as_millis().min(u32::MAX as u128) as u32);
        session
            .handshake()
            .map_err(|e| TransportError::AuthFailed(format!("handshake: {}", e)))?;

        session
            .userauth_password(&credentials.username, &credentials.password)
            .map_err(|e| TransportError::AuthFailed(e.message().to_string()))?;
        if !session.authenticated() {
            return Err(TransportError::AuthFailed(
                "server rejected the credentials".to_string(),
            ));
        }
        debug!("authenticated");

        let mut channel = session
            .channel_session()
            .map_err(|e| TransportError::ChannelFailed(e.to_string()))?;

        let mut modes = PtyModes::new();
        modes.set_boolean(PtyModeOpcode::ECHO, true);
        modes.set_u32(PtyModeOpcode::TTY_OP_ISPEED, 14400);
        modes.set_u32(PtyModeOpcode::TTY_OP_OSPEED, 14400);
        channel
            .request_pty(
                &options.term,
                Some(modes),
                Some((geometry.cols as u32, geometry.rows as u32, 0, 0)),
            )
            .map_err(|e| TransportError::PtyFailed(e.to_string()))?;

        channel
            .shell()
            .map_err(|e| TransportError::ChannelFailed(e.to_string()))?;

        session.set_blocking(false);
        info!(%addr, cols = geometry.cols, rows = geometry.rows, "shell started");

        Ok(Self {
            session,
            channel: Mutex::new(channel),
            closed: AtomicBool::new(false),
        })
    }

    fn lock_channel(&self) -> Result<MutexGuard<'_, Channel>> {
        self.channel.lock().map_err(|_| TransportError::Closed)
    }
}

fn dial(addr: &str, timeout: Duration) -> Result<TcpStream> {
    let dial_failed = |source: io::Error| TransportError::DialFailed {
        addr: addr.to_string(),
        source,
    };

    let mut last_error = io::Error::new(io::ErrorKind::NotFound, "address did not resolve");
    for sock_addr in addr.to_socket_addrs().map_err(dial_failed)? {
        match TcpStream::connect_timeout(&sock_addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%sock_addr, error = %e, "dial attempt failed");
                last_error = e;
            }
        }
    }
    Err(dial_failed(last_error))
}

/// Write all of `bytes` through `write_some`, retrying on would-block until
/// `limit` has passed
fn write_with_deadline<F>(bytes: &[u8], limit: Duration, mut write_some: F) -> Result<()>
where
    F: FnMut(&[u8]) -> Result<usize>,
{
    let deadline = Instant::now() + limit;
    let mut written = 0;
    while written < bytes.len() {
        match write_some(&bytes[written..]) {
            Ok(0) => return Err(TransportError::Write(io::ErrorKind::WriteZero.into())),
            Ok(n) => written += n,
            Err(TransportError::Write(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    warn!(dropped = bytes.len() - written, "channel full, dropping input");
                    return Err(TransportError::Write(io::ErrorKind::TimedOut.into()));
                }
                thread::sleep(RETRY_INTERVAL);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn would_block(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::Session(LIBSSH2_ERROR_EAGAIN))
}

/// Read one stream; `None` when it had nothing to give
fn read_stream(stream: &mut impl Read, buf: &mut [u8]) -> Result<Option<usize>> {
    match stream.read(buf) {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(n)),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(TransportError::Read(e)),
    }
}

impl Transport for SshTransport {
    fn write(&self, bytes: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        write_with_deadline(bytes, INTERACTIVE_DEADLINE, |chunk| {
            self.lock_channel()?.write(chunk).map_err(TransportError::Write)
        })
    }

    fn read(&self, buf: &mut [u8]) -> Result<ReadStatus> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(ReadStatus::Eof);
        }

        let mut channel = self.lock_channel()?;
        if let Some(n) = read_stream(&mut *channel, buf)? {
            return Ok(ReadStatus::Data(n));
        }
        // stderr only once stdout has nothing
        if let Some(n) = read_stream(&mut channel.stderr(), buf)? {
            return Ok(ReadStatus::Data(n));
        }

        if channel.eof() {
            Ok(ReadStatus::Eof)
        } else {
            Ok(ReadStatus::Pending)
        }
    }

    fn resize(&self, geometry: Geometry) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let deadline = Instant::now() + INTERACTIVE_DEADLINE;
        loop {
            let result = self.lock_channel()?.request_pty_size(
                geometry.cols as u32,
                geometry.rows as u32,
                None,
                None,
            );
            match result {
                Ok(()) => return Ok(()),
                Err(e) if would_block(&e) && Instant::now() < deadline => {
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(TransportError::Resize(e.to_string())),
            }
        }
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut channel = self.lock_channel()?;
        if let Err(e) = channel.send_eof() {
            if !would_block(&e) {
                warn!(error = %e, "failed to send eof");
            }
        }
        if let Err(e) = channel.close() {
            if !would_block(&e) {
                warn!(error = %e, "failed to close channel");
            }
        }
        drop(channel);

        if let Err(e) = self.session.disconnect(None, "session closed", None) {
            debug!(error = %e, "disconnect");
        }
        info!("ssh session closed");
        Ok(())
    }
}

impl Drop for SshTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_would_block_detection() {
        let eagain = ssh2::Error::from_errno(ErrorCode::Session(LIBSSH2_ERROR_EAGAIN));
        assert!(would_block(&eagain));

        let other = ssh2::Error::from_errno(ErrorCode::Session(-18));
        assert!(!would_block(&other));
    }

    #[test]
    fn test_blocked_write_gives_up_quickly() {
        let started = Instant::now();
        let result = write_with_deadline(b"ls\n", INTERACTIVE_DEADLINE, |_| {
            Err(TransportError::Write(io::ErrorKind::WouldBlock.into()))
        });

        match result {
            Err(TransportError::Write(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_partial_writes_complete() {
        let mut sent = Vec::new();
        let mut blocked_once = false;
        let result = write_with_deadline(b"hello", INTERACTIVE_DEADLINE, |chunk| {
            if !blocked_once {
                blocked_once = true;
                return Err(TransportError::Write(io::ErrorKind::WouldBlock.into()));
            }
            sent.extend_from_slice(&chunk[..2.min(chunk.len())]);
            Ok(2.min(chunk.len()))
        });

        assert!(result.is_ok());
        assert_eq!(sent, b"hello");
    }

    #[test]
    fn test_refused_connection_is_dial_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = Target::new("127.0.0.1", port.to_string());
        let creds = Credentials {
            username: "nobody".to_string(),
            password: String::new(),
        };
        let options = SshOptions {
            timeout: Duration::from_secs(2),
            ..SshOptions::default()
        };

        match SshTransport::open(&target, &creds, Geometry::default(), &options) {
            Err(TransportError::DialFailed { addr, .. }) => {
                assert_eq!(addr, format!("127.0.0.1:{}", port));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("connected to a closed port"),
        }
    }
}
