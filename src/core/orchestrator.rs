//! Session orchestration
//!
//! Single owner of all mutable session state. Remote output and key events
//! arrive through the same event queue and are applied here one at a time,
//! so the classifier and the line editor never run concurrently.

use tracing::{debug, info, warn};

use super::classifier::{Display, Mode, OutputClassifier, DEFAULT_RAW_LIMIT};
use super::input::{InputLine, LineAction};
use super::keys::{self, Key};
use super::scrollback::DEFAULT_MAX_LINES;
use super::session::{Session, SessionEvent};
use super::transport::Geometry;

/// Lifecycle of the orchestrator's session slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// No session yet
    Idle,
    /// A session is attached and reading
    Active,
    /// The last session ended; carries the read error if there was one
    Ended(Option<String>),
}

/// Plain-data view of what should be on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Disconnected,
    Line {
        lines: Vec<String>,
        input: String,
        cursor: usize,
        scroll: usize,
    },
    Raw {
        output: String,
    },
}

/// Sizing of per-session buffers
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub scrollback_lines: usize,
    pub raw_buffer_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            scrollback_lines: DEFAULT_MAX_LINES,
            raw_buffer_bytes: DEFAULT_RAW_LIMIT,
        }
    }
}

pub struct Orchestrator {
    session: Option<Session>,
    classifier: OutputClassifier,
    input: InputLine,
    geometry: Geometry,
    status: Status,
    limits: Limits,
}

impl Orchestrator {
    pub fn new(limits: Limits, geometry: Geometry) -> Self {
        Self {
            session: None,
            classifier: OutputClassifier::new(limits.scrollback_lines, limits.raw_buffer_bytes),
            input: InputLine::new(),
            geometry,
            status: Status::Idle,
            limits,
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn mode(&self) -> Mode {
        self.classifier.mode()
    }

    /// Take ownership of a freshly opened session, replacing any previous one
    pub fn attach(&mut self, session: Session) {
        self.close();
        info!(session = session.id(), "session attached");

        self.classifier =
            OutputClassifier::new(self.limits.scrollback_lines, self.limits.raw_buffer_bytes);
        self.input.clear();
        self.session = Some(session);
        self.status = Status::Active;

        // The view may have been resized while the session was being opened
        let geometry = self.geometry;
        if let Some(session) = &mut self.session {
            if session.geometry() != geometry {
                if let Err(e) = session.resize(geometry) {
                    warn!(error = %e, "initial resize failed");
                }
            }
        }
    }

    /// Apply an event from the reader thread
    pub fn handle_event(&mut self, event: SessionEvent) {
        let current = self.session.as_ref().map(Session::id);
        if current != Some(event.session_id()) {
            debug!(session = event.session_id(), "dropping event from stale session");
            return;
        }

        match event {
            SessionEvent::Output { data, .. } => {
                self.classifier.feed(&data, self.input.text());
            }
            SessionEvent::Ended { error, .. } => {
                match &error {
                    Some(e) => warn!(error = %e, "session terminated"),
                    None => info!("remote closed the session"),
                }
                if let Some(mut session) = self.session.take() {
                    session.close();
                }
                self.status = Status::Ended(error);
            }
        }
    }

    /// Dispatch a key to the line editor or the raw translator
    pub fn handle_key(&mut self, key: Key) {
        if self.session.is_none() {
            return;
        }

        match self.classifier.mode() {
            Mode::Raw => {
                if let Some(bytes) = keys::raw_bytes(key) {
                    self.send(&bytes);
                }
            }
            Mode::Line => match self.input.apply(key) {
                LineAction::None => {}
                LineAction::Send(bytes) => self.send(&bytes),
                LineAction::Scroll(delta) => self.classifier.scroll_by(delta),
            },
        }
    }

    /// Best-effort write; failures are logged and otherwise ignored
    fn send(&self, bytes: &[u8]) {
        if let Some(session) = &self.session {
            if let Err(e) = session.write(bytes) {
                warn!(error = %e, len = bytes.len(), "send failed");
            }
        }
    }

    /// Record the new view geometry and forward it to the remote pty
    pub fn resize(&mut self, geometry: Geometry) {
        self.geometry = geometry;
        if let Some(session) = &mut self.session {
            if let Err(e) = session.resize(geometry) {
                warn!(error = %e, "resize failed");
            }
        }
    }

    /// Build the render snapshot for `visible_rows` rows of scrollback
    pub fn snapshot(&self, visible_rows: usize) -> Snapshot {
        if self.session.is_none() {
            return Snapshot::Disconnected;
        }

        match self.classifier.display() {
            Display::Line(view) => Snapshot::Line {
                lines: view.visible(visible_rows),
                input: self.input.text().to_string(),
                cursor: self.input.cursor(),
                scroll: view.scroll(),
            },
            Display::Raw(raw) => Snapshot::Raw {
                output: raw.output().to_string(),
            },
        }
    }

    /// Close the active session, if any
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
            self.status = Status::Ended(None);
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::tests::ScriptedTransport;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn attached() -> (Orchestrator, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::default());
        let mut orch = Orchestrator::new(Limits::default(), Geometry::default());
        orch.attach(Session::new(1, transport.clone(), Geometry::default()));
        (orch, transport)
    }

    fn output(orch: &mut Orchestrator, data: &[u8]) {
        orch.handle_event(SessionEvent::Output {
            id: 1,
            data: data.to_vec(),
        });
    }

    fn type_str(orch: &mut Orchestrator, text: &str) {
        for ch in text.chars() {
            orch.handle_key(Key::Char(ch));
        }
    }

    #[test]
    fn test_enter_transmits_line() {
        let (mut orch, transport) = attached();
        type_str(&mut orch, "pwd");
        orch.handle_key(Key::Enter);

        assert_eq!(transport.written(), b"pwd\n");
        match orch.snapshot(10) {
            Snapshot::Line { input, cursor, .. } => {
                assert_eq!(input, "");
                assert_eq!(cursor, 0);
            }
            other => panic!("unexpected snapshot: {:?}", other),
        }
    }

    #[test]
    fn test_ctrl_c_in_line_mode() {
        let (mut orch, transport) = attached();
        type_str(&mut orch, "sleep 100");
        orch.handle_key(Key::Ctrl('c'));

        assert_eq!(transport.written(), vec![0x03]);
        assert!(matches!(
            orch.snapshot(10),
            Snapshot::Line { ref input, cursor: 0, .. } if input.is_empty()
        ));
    }

    #[test]
    fn test_local_echo_suppressed_while_typing() {
        let (mut orch, _transport) = attached();
        type_str(&mut orch, "ls -la");
        output(&mut orch, b"ls -la\r\ntotal 24\r\nuser@host:~$ ");

        match orch.snapshot(10) {
            Snapshot::Line { lines, input, .. } => {
                assert_eq!(lines, vec!["total 24"]);
                assert_eq!(input, "ls -la");
            }
            other => panic!("unexpected snapshot: {:?}", other),
        }
    }

    #[test]
    fn test_raw_mode_keys_bypass_editor() {
        let (mut orch, transport) = attached();
        output(&mut orch, b"\x1b[?1049h\x1b[Hvim");
        assert_eq!(orch.mode(), Mode::Raw);

        orch.handle_key(Key::Char('i'));
        orch.handle_key(Key::Esc);
        orch.handle_key(Key::Enter);
        assert_eq!(transport.written(), b"i\x1b\r");

        assert_eq!(
            orch.snapshot(10),
            Snapshot::Raw {
                output: "\x1b[?1049h\x1b[Hvim".to_string()
            }
        );
    }

    #[test]
    fn test_page_keys_scroll_locally() {
        let (mut orch, transport) = attached();
        output(&mut orch, b"1\n2\n3\n4\n");

        orch.handle_key(Key::PageUp);
        match orch.snapshot(2) {
            Snapshot::Line { lines, scroll, .. } => {
                assert_eq!(scroll, 1);
                assert_eq!(lines, vec!["2", "3"]);
            }
            other => panic!("unexpected snapshot: {:?}", other),
        }
        assert!(transport.written().is_empty());
    }

    #[test]
    fn test_write_failure_is_not_fatal() {
        let (mut orch, transport) = attached();
        transport.fail_writes.store(true, Ordering::SeqCst);
        type_str(&mut orch, "ls");
        orch.handle_key(Key::Enter);

        assert!(orch.is_active());
        assert_eq!(orch.status(), &Status::Active);
    }

    #[test]
    fn test_resize_forwarded() {
        let (mut orch, transport) = attached();
        let geometry = Geometry { cols: 120, rows: 30 };
        orch.resize(geometry);
        assert_eq!(*transport.resizes.lock().unwrap(), vec![geometry]);
    }

    #[test]
    fn test_resize_failure_is_not_fatal() {
        let (mut orch, transport) = attached();
        transport.fail_resizes.store(true, Ordering::SeqCst);
        orch.resize(Geometry { cols: 120, rows: 30 });

        assert!(orch.is_active());
        assert_eq!(orch.status(), &Status::Active);
        assert!(transport.resizes.lock().unwrap().is_empty());

        type_str(&mut orch, "ls");
        orch.handle_key(Key::Enter);
        assert_eq!(transport.written(), b"ls\n");
    }

    #[test]
    fn test_initial_resize_failure_keeps_session() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.fail_resizes.store(true, Ordering::SeqCst);
        let mut orch = Orchestrator::new(Limits::default(), Geometry { cols: 100, rows: 50 });
        orch.attach(Session::new(1, transport.clone(), Geometry::default()));

        assert!(orch.is_active());
        assert_eq!(orch.status(), &Status::Active);
        assert!(matches!(orch.snapshot(10), Snapshot::Line { .. }));
    }

    #[test]
    fn test_ended_event_detaches() {
        let (mut orch, transport) = attached();
        orch.handle_event(SessionEvent::Ended {
            id: 1,
            error: Some("connection reset".to_string()),
        });

        assert!(!orch.is_active());
        assert_eq!(orch.status(), &Status::Ended(Some("connection reset".to_string())));
        assert_eq!(orch.snapshot(10), Snapshot::Disconnected);
        assert!(transport.closed.load(Ordering::SeqCst));

        orch.handle_key(Key::Enter);
        assert!(transport.written().is_empty());
    }

    #[test]
    fn test_stale_events_ignored() {
        let (mut orch, _transport) = attached();
        orch.handle_event(SessionEvent::Output {
            id: 99,
            data: b"ghost\n".to_vec(),
        });
        orch.handle_event(SessionEvent::Ended { id: 99, error: None });

        assert!(orch.is_active());
        match orch.snapshot(10) {
            Snapshot::Line { lines, .. } => assert!(lines.is_empty()),
            other => panic!("unexpected snapshot: {:?}", other),
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut orch, transport) = attached();
        orch.close();
        orch.close();

        assert_eq!(transport.close_calls.load(Ordering::SeqCst), 1);
        assert_eq!(orch.status(), &Status::Ended(None));
    }

    #[test]
    fn test_attach_resizes_to_current_view() {
        let transport = Arc::new(ScriptedTransport::default());
        let view = Geometry { cols: 100, rows: 50 };
        let mut orch = Orchestrator::new(Limits::default(), view);
        orch.attach(Session::new(1, transport.clone(), Geometry::default()));

        assert_eq!(*transport.resizes.lock().unwrap(), vec![view]);
    }
}
