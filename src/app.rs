//! Application loop
//!
//! Every input reaches the app through one queue: terminal events from the
//! input thread, connection results from the connect thread and output from
//! the session reader. Events are applied one at a time, then the screen is
//! redrawn once per drained batch.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::orchestrator::{Orchestrator, Status};
use crate::core::session::{Session, SessionEvent};
use crate::core::ssh::SshTransport;
use crate::core::transport::{Geometry, Transport, TransportError};
use crate::ui::login::FormAction;
use crate::ui::{visible_rows, KeyMapper, LoginForm, Renderer};

/// Everything the app reacts to
pub enum AppEvent {
    /// Keyboard or resize event from the terminal
    Input(Event),
    /// Result of a connection attempt
    Connected(Result<Arc<dyn Transport>, TransportError>),
    /// Output or termination from the session reader
    Session(SessionEvent),
}

impl From<SessionEvent> for AppEvent {
    fn from(event: SessionEvent) -> Self {
        AppEvent::Session(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Terminal,
}

pub struct App {
    config: Config,
    screen: Screen,
    login: LoginForm,
    orchestrator: Orchestrator,
    renderer: Renderer,
    size: (u16, u16),
    title: String,
    next_session_id: u64,
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
    quit: bool,
}

impl App {
    pub fn new(config: Config, size: (u16, u16)) -> Self {
        let (tx, rx) = mpsc::channel();
        let geometry = Geometry {
            cols: size.0,
            rows: size.1,
        };
        Self {
            login: LoginForm::new(&config),
            orchestrator: Orchestrator::new(config.limits(), geometry),
            config,
            screen: Screen::Login,
            renderer: Renderer::new(),
            size,
            title: String::new(),
            next_session_id: 1,
            tx,
            rx,
            quit: false,
        }
    }

    /// Run until quit; the terminal must already be initialized
    pub fn run(&mut self) -> anyhow::Result<()> {
        spawn_input_thread(self.tx.clone());
        self.render()?;

        while !self.quit {
            let Ok(event) = self.rx.recv() else {
                break;
            };
            self.handle(event);
            while !self.quit {
                match self.rx.try_recv() {
                    Ok(event) => self.handle(event),
                    Err(_) => break,
                }
            }
            if !self.quit {
                self.render()?;
            }
        }

        self.orchestrator.close();
        info!("exiting");
        Ok(())
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    fn render(&mut self) -> anyhow::Result<()> {
        match self.screen {
            Screen::Login => self.renderer.render_login(&self.login, self.size)?,
            Screen::Terminal => {
                let snapshot = self.orchestrator.snapshot(visible_rows(self.size.1));
                self.renderer
                    .render_session(&snapshot, &self.title, self.size)?;
            }
        }
        Ok(())
    }

    fn handle(&mut self, event: AppEvent) {
        match event {
            AppEvent::Input(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.handle_key(key)
            }
            AppEvent::Input(Event::Resize(cols, rows)) => {
                self.size = (cols, rows);
                self.orchestrator.resize(Geometry { cols, rows });
                self.renderer.invalidate();
            }
            AppEvent::Input(_) => {}
            AppEvent::Connected(Ok(transport)) => self.attach(transport),
            AppEvent::Connected(Err(e)) => {
                error!(error = %e, "connection failed");
                self.login.set_error(e.to_string());
            }
            AppEvent::Session(event) => {
                let before = self.orchestrator.mode();
                self.orchestrator.handle_event(event);
                if self.orchestrator.mode() != before {
                    debug!(mode = ?self.orchestrator.mode(), "display mode changed");
                    self.renderer.invalidate();
                }
                if self.screen == Screen::Terminal && !self.orchestrator.is_active() {
                    let message = match self.orchestrator.status() {
                        Status::Ended(Some(e)) => format!("session ended: {}", e),
                        _ => "session closed".to_string(),
                    };
                    self.login.reset(Some(message));
                    self.screen = Screen::Login;
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if KeyMapper::is_quit(&key) {
            self.quit = true;
            return;
        }

        match self.screen {
            Screen::Login => match self.login.handle_key(&key) {
                FormAction::None => {}
                FormAction::Quit => self.quit = true,
                FormAction::Submit(target, credentials) => {
                    self.title = format!("{}@{}", credentials.username, target.addr());
                    let geometry = self.geometry();
                    let options = self.config.ssh_options();
                    let tx = self.tx.clone();
                    thread::spawn(move || {
                        let result = SshTransport::open(&target, &credentials, geometry, &options)
                            .map(|t| Arc::new(t) as Arc<dyn Transport>);
                        let _ = tx.send(AppEvent::Connected(result));
                    });
                }
            },
            Screen::Terminal => {
                if let Some(key) = KeyMapper::map(&key) {
                    self.orchestrator.handle_key(key);
                }
            }
        }
    }

    fn geometry(&self) -> Geometry {
        Geometry {
            cols: self.size.0,
            rows: self.size.1,
        }
    }

    fn attach(&mut self, transport: Arc<dyn Transport>) {
        let id = self.next_session_id;
        self.next_session_id += 1;

        let mut session = Session::new(id, transport, self.geometry());
        session.start_reader(self.tx.clone());
        self.orchestrator.attach(session);
        self.screen = Screen::Terminal;
        info!(session = id, title = %self.title, "session ready");
    }
}

/// Forward terminal events into the app queue
fn spawn_input_thread(tx: Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::read() {
            Ok(event) => {
                if tx.send(AppEvent::Input(event)).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "terminal input failed");
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::tests::ScriptedTransport;
    use crossterm::event::{KeyCode, KeyModifiers};
    use std::sync::atomic::Ordering;

    fn key(code: KeyCode, mods: KeyModifiers) -> AppEvent {
        AppEvent::Input(Event::Key(KeyEvent::new(code, mods)))
    }

    fn connected_app() -> (App, Arc<ScriptedTransport>) {
        let mut app = App::new(Config::default(), (80, 24));
        let transport = Arc::new(ScriptedTransport::default());
        app.handle(AppEvent::Connected(Ok(transport.clone())));
        (app, transport)
    }

    #[test]
    fn test_connect_failure_shown_on_form() {
        let mut app = App::new(Config::default(), (80, 24));
        app.handle(AppEvent::Connected(Err(TransportError::AuthFailed(
            "bad password".to_string(),
        ))));

        assert_eq!(app.screen, Screen::Login);
        assert_eq!(app.login.error(), Some("authentication failed: bad password"));
    }

    #[test]
    fn test_keys_reach_session() {
        let (mut app, transport) = connected_app();
        assert_eq!(app.screen, Screen::Terminal);

        app.handle(key(KeyCode::Char('l'), KeyModifiers::NONE));
        app.handle(key(KeyCode::Char('s'), KeyModifiers::NONE));
        app.handle(key(KeyCode::Enter, KeyModifiers::NONE));
        assert_eq!(transport.written(), b"ls\n");
    }

    #[test]
    fn test_resize_forwarded() {
        let (mut app, transport) = connected_app();
        app.handle(AppEvent::Input(Event::Resize(132, 43)));

        assert_eq!(app.size, (132, 43));
        assert_eq!(
            *transport.resizes.lock().unwrap(),
            vec![Geometry { cols: 132, rows: 43 }]
        );
    }

    #[test]
    fn test_session_end_returns_to_login() {
        let (mut app, transport) = connected_app();
        app.handle(AppEvent::Session(SessionEvent::Ended {
            id: 1,
            error: None,
        }));

        assert_eq!(app.screen, Screen::Login);
        assert_eq!(app.login.error(), Some("session closed"));
        assert!(transport.closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_quit_chord() {
        let (mut app, _transport) = connected_app();
        app.handle(key(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert!(app.quit);
    }

    #[test]
    fn test_escape_quits_from_login() {
        let mut app = App::new(Config::default(), (80, 24));
        app.handle(key(KeyCode::Esc, KeyModifiers::NONE));
        assert!(app.quit);
    }
}
