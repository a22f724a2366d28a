//! Session management
//!
//! A session is one live remote-shell attachment. It owns the transport and
//! the reader thread that pumps output into the application's event queue.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::transport::{Geometry, ReadStatus, Transport};

const READ_BUFFER_SIZE: usize = 4096;

/// Delay before polling again when nothing was available
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Events produced by a session's reader thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A chunk of remote output
    Output { id: u64, data: Vec<u8> },
    /// The read loop stopped; `error` is `None` on EOF or close
    Ended { id: u64, error: Option<String> },
}

impl SessionEvent {
    pub fn session_id(&self) -> u64 {
        match self {
            SessionEvent::Output { id, .. } | SessionEvent::Ended { id, .. } => *id,
        }
    }
}

/// A remote shell session
pub struct Session {
    id: u64,
    transport: Arc<dyn Transport>,
    geometry: Geometry,
    reader_thread: Option<JoinHandle<()>>,
    closed: bool,
}

impl Session {
    pub fn new(id: u64, transport: Arc<dyn Transport>, geometry: Geometry) -> Self {
        Self {
            id,
            transport,
            geometry,
            reader_thread: None,
            closed: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Spawn the reader thread, forwarding events into `tx`
    pub fn start_reader<E>(&mut self, tx: Sender<E>)
    where
        E: From<SessionEvent> + Send + 'static,
    {
        if self.reader_thread.is_some() {
            return;
        }

        let id = self.id;
        let transport = self.transport.clone();
        let reader_thread = thread::spawn(move || {
            let mut buffer = vec![0u8; READ_BUFFER_SIZE];

            let error = loop {
                match transport.read(&mut buffer) {
                    Ok(ReadStatus::Data(n)) => {
                        let event = SessionEvent::Output {
                            id,
                            data: buffer[..n].to_vec(),
                        };
                        if tx.send(event.into()).is_err() {
                            // Receiver gone, nobody left to report to
                            return;
                        }
                    }
                    Ok(ReadStatus::Pending) => thread::sleep(POLL_INTERVAL),
                    Ok(ReadStatus::Eof) => break None,
                    Err(e) => break Some(e.to_string()),
                }
            };

            debug!(session = id, ?error, "reader stopped");
            let _ = tx.send(SessionEvent::Ended { id, error }.into());
        });

        self.reader_thread = Some(reader_thread);
    }

    /// Send bytes to the remote shell
    pub fn write(&self, data: &[u8]) -> super::transport::Result<()> {
        self.transport.write(data)
    }

    /// Resize the remote pty
    pub fn resize(&mut self, geometry: Geometry) -> super::transport::Result<()> {
        self.geometry = geometry;
        self.transport.resize(geometry)
    }

    /// Close the transport and wait for the reader to notice
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.transport.close() {
            warn!(session = self.id, error = %e, "close failed");
        }
        if let Some(handle) = self.reader_thread.take() {
            let _ = handle.join();
        }
        info!(session = self.id, "session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
