//! Login form
//!
//! Collects host, port, user and password before a session is opened.
//! Connection errors come back here and are shown inline so the user can
//! correct the credentials and try again.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::config::Config;
use crate::core::transport::{Credentials, Target};

const HOST: usize = 0;
const PORT: usize = 1;
const USER: usize = 2;
const PASS: usize = 3;

/// A single text field
#[derive(Debug, Clone)]
pub struct Field {
    pub label: &'static str,
    pub value: String,
    pub placeholder: &'static str,
    pub char_limit: usize,
    pub masked: bool,
}

impl Field {
    fn new(label: &'static str, placeholder: &'static str, char_limit: usize) -> Self {
        Self {
            label,
            value: String::new(),
            placeholder,
            char_limit,
            masked: false,
        }
    }

    /// Text as it should appear on screen
    pub fn display_value(&self) -> String {
        if self.masked {
            "•".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }
}

/// Result of a key press on the form
#[derive(Debug)]
pub enum FormAction {
    None,
    Submit(Target, Credentials),
    Quit,
}

pub struct LoginForm {
    fields: [Field; 4],
    focus: usize,
    error: Option<String>,
    connecting: bool,
}

impl LoginForm {
    pub fn new(config: &Config) -> Self {
        let mut fields = [
            Field::new("Host", "192.168.1.100", 100),
            Field::new("Port", "22", 5),
            Field::new("User", "username", 50),
            Field::new("Pass", "password", 100),
        ];
        fields[PASS].masked = true;
        fields[HOST].value = config.host.clone().unwrap_or_default();
        fields[PORT].value = config.port.clone().unwrap_or_default();
        fields[USER].value = config.user.clone().unwrap_or_default();

        // Start on the first field still missing a value
        let focus = fields
            .iter()
            .position(|f| f.value.is_empty())
            .unwrap_or(PASS);

        Self {
            fields,
            focus,
            error: None,
            connecting: false,
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    /// Connection attempt failed; show why and allow another try
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.connecting = false;
    }

    /// Back from a finished session; the password is not kept
    pub fn reset(&mut self, message: Option<String>) {
        self.fields[PASS].value.clear();
        self.focus = PASS;
        self.connecting = false;
        self.error = message;
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> FormAction {
        if self.connecting {
            return match event.code {
                KeyCode::Esc => FormAction::Quit,
                _ => FormAction::None,
            };
        }

        match event.code {
            KeyCode::Esc => return FormAction::Quit,
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                return FormAction::Quit;
            }
            KeyCode::Tab | KeyCode::Down => self.move_focus(1),
            KeyCode::BackTab | KeyCode::Up => self.move_focus(-1),
            KeyCode::Enter => return self.submit(),
            KeyCode::Backspace => {
                self.fields[self.focus].value.pop();
            }
            KeyCode::Char(ch) if !event.modifiers.contains(KeyModifiers::CONTROL) => {
                let field = &mut self.fields[self.focus];
                if field.value.chars().count() < field.char_limit {
                    field.value.push(ch);
                }
            }
            _ => {}
        }
        FormAction::None
    }

    fn move_focus(&mut self, delta: isize) {
        let len = self.fields.len() as isize;
        self.focus = (self.focus as isize + delta).rem_euclid(len) as usize;
    }

    fn submit(&mut self) -> FormAction {
        if self.fields[HOST].value.trim().is_empty() {
            self.error = Some("host is required".to_string());
            self.focus = HOST;
            return FormAction::None;
        }
        if self.fields[USER].value.trim().is_empty() {
            self.error = Some("user is required".to_string());
            self.focus = USER;
            return FormAction::None;
        }

        self.connecting = true;
        self.error = None;

        let target = Target::new(self.fields[HOST].value.clone(), self.fields[PORT].value.clone());
        let credentials = Credentials {
            username: self.fields[USER].value.trim().to_string(),
            password: self.fields[PASS].value.clone(),
        };
        FormAction::Submit(target, credentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(form: &mut LoginForm, code: KeyCode) -> FormAction {
        form.handle_key(&KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(form: &mut LoginForm, text: &str) {
        for ch in text.chars() {
            press(form, KeyCode::Char(ch));
        }
    }

    #[test]
    fn test_submit_with_default_port() {
        let mut form = LoginForm::new(&Config::default());
        type_str(&mut form, "example.org");
        press(&mut form, KeyCode::Tab);
        press(&mut form, KeyCode::Tab);
        type_str(&mut form, "alice");
        press(&mut form, KeyCode::Tab);
        type_str(&mut form, "secret");

        match press(&mut form, KeyCode::Enter) {
            FormAction::Submit(target, creds) => {
                assert_eq!(target.addr(), "example.org:22");
                assert_eq!(creds.username, "alice");
                assert_eq!(creds.password, "secret");
            }
            other => panic!("unexpected action: {:?}", other),
        }
        assert!(form.is_connecting());
    }

    #[test]
    fn test_missing_host_is_reported() {
        let mut form = LoginForm::new(&Config::default());
        assert!(matches!(press(&mut form, KeyCode::Enter), FormAction::None));
        assert_eq!(form.error(), Some("host is required"));
        assert!(!form.is_connecting());
    }

    #[test]
    fn test_focus_wraps() {
        let mut form = LoginForm::new(&Config::default());
        assert_eq!(form.focus(), 0);
        press(&mut form, KeyCode::Up);
        assert_eq!(form.focus(), 3);
        press(&mut form, KeyCode::Down);
        assert_eq!(form.focus(), 0);
    }

    #[test]
    fn test_prefilled_from_config() {
        let config = Config {
            host: Some("10.0.0.1".to_string()),
            user: Some("root".to_string()),
            ..Config::default()
        };
        let form = LoginForm::new(&config);
        assert_eq!(form.fields()[0].value, "10.0.0.1");
        assert_eq!(form.focus(), 1);
    }

    #[test]
    fn test_password_masked_and_cleared_on_reset() {
        let mut form = LoginForm::new(&Config::default());
        form.focus = PASS;
        type_str(&mut form, "abc");
        assert_eq!(form.fields()[PASS].display_value(), "•••");

        form.set_error("authentication failed");
        assert!(!form.is_connecting());

        form.reset(Some("session ended".to_string()));
        assert!(form.fields()[PASS].value.is_empty());
        assert_eq!(form.error(), Some("session ended"));
    }

    #[test]
    fn test_char_limit() {
        let mut form = LoginForm::new(&Config::default());
        form.focus = PORT;
        type_str(&mut form, "2222222");
        assert_eq!(form.fields()[PORT].value, "22222");
    }
}
