//! Key mapping for session input
//!
//! Converts crossterm key events into the session engine's `Key` model.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::core::keys::Key;

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const CTRL = 0b01;
        const ALT  = 0b10;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Key mapper for converting key events to engine keys
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent; `None` for keys the engine does not handle
    pub fn map(event: &KeyEvent) -> Option<Key> {
        let mods = Modifiers::from(event.modifiers);

        match event.code {
            KeyCode::Char(ch) => Self::map_char(ch, mods),
            KeyCode::Enter => Some(Key::Enter),
            KeyCode::Backspace => Some(Key::Backspace),
            KeyCode::Delete => Some(Key::Delete),
            KeyCode::Tab => Some(Key::Tab),
            KeyCode::Esc => Some(Key::Esc),
            KeyCode::Up => Some(Key::Up),
            KeyCode::Down => Some(Key::Down),
            KeyCode::Left => Some(Key::Left),
            KeyCode::Right => Some(Key::Right),
            KeyCode::Home => Some(Key::Home),
            KeyCode::End => Some(Key::End),
            KeyCode::PageUp => Some(Key::PageUp),
            KeyCode::PageDown => Some(Key::PageDown),
            _ => None,
        }
    }

    fn map_char(ch: char, mods: Modifiers) -> Option<Key> {
        if mods.contains(Modifiers::ALT) {
            return None;
        }
        if mods.contains(Modifiers::CTRL) {
            return ch
                .is_ascii_alphabetic()
                .then(|| Key::Ctrl(ch.to_ascii_lowercase()));
        }
        Some(Key::Char(ch))
    }

    /// Whether the event is the application quit chord (Ctrl+Q)
    pub fn is_quit(event: &KeyEvent) -> bool {
        let mods = Modifiers::from(event.modifiers);
        mods.contains(Modifiers::CTRL)
            && matches!(event.code, KeyCode::Char('q') | KeyCode::Char('Q'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn test_char_keys() {
        let event = key_event(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(Key::Char('a')));

        let event = key_event(KeyCode::Char('A'), KeyModifiers::SHIFT);
        assert_eq!(KeyMapper::map(&event), Some(Key::Char('A')));

        let event = key_event(KeyCode::Char('C'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), Some(Key::Ctrl('c')));

        let event = key_event(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(KeyMapper::map(&event), None);
    }

    #[test]
    fn test_modifiers_from_crossterm() {
        let mods = Modifiers::from(KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        assert_eq!(mods, Modifiers::CTRL);
        assert_eq!(Modifiers::from(KeyModifiers::ALT), Modifiers::ALT);
    }

    #[test]
    fn test_special_keys() {
        let event = key_event(KeyCode::PageUp, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), Some(Key::PageUp));

        let event = key_event(KeyCode::F(5), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), None);
    }

    #[test]
    fn test_quit_chord() {
        assert!(KeyMapper::is_quit(&key_event(KeyCode::Char('q'), KeyModifiers::CONTROL)));
        assert!(!KeyMapper::is_quit(&key_event(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(!KeyMapper::is_quit(&key_event(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }
}
