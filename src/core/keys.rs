//! Key events and raw-mode translation
//!
//! `Key` is the session engine's view of a keystroke, independent of the
//! terminal library that produced it. In raw mode every key is turned
//! straight into the byte sequence a VT-style application expects.

/// A recognized keystroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Printable character
    Char(char),
    /// Ctrl + character (stored lowercase)
    Ctrl(char),
    Enter,
    Backspace,
    Delete,
    Tab,
    Esc,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
}

pub const CURSOR_UP: &[u8] = b"\x1b[A";
pub const CURSOR_DOWN: &[u8] = b"\x1b[B";
pub const INTERRUPT: u8 = 0x03;
pub const END_OF_TRANSMISSION: u8 = 0x04;

/// Map a key to the bytes sent to a full-screen application
pub fn raw_bytes(key: Key) -> Option<Vec<u8>> {
    let bytes = match key {
        Key::Char(ch) => ch.to_string().into_bytes(),
        Key::Ctrl(ch) => vec![ctrl_code(ch)?],
        Key::Enter => vec![0x0D],
        Key::Backspace => vec![0x7F],
        Key::Tab => vec![0x09],
        Key::Esc => vec![0x1B],
        Key::Up => CURSOR_UP.to_vec(),
        Key::Down => CURSOR_DOWN.to_vec(),
        Key::Right => b"\x1b[C".to_vec(),
        Key::Left => b"\x1b[D".to_vec(),
        Key::Home => b"\x1b[H".to_vec(),
        Key::End => b"\x1b[F".to_vec(),
        Key::Delete => tilde_key(3),
        Key::PageUp => tilde_key(5),
        Key::PageDown => tilde_key(6),
    };
    Some(bytes)
}

/// Ctrl + letter = control character
fn ctrl_code(ch: char) -> Option<u8> {
    if ch.is_ascii_alphabetic() {
        Some((ch.to_ascii_lowercase() as u8) - b'a' + 1)
    } else {
        None
    }
}

fn tilde_key(code: u8) -> Vec<u8> {
    format!("\x1b[{}~", code).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_keys() {
        assert_eq!(raw_bytes(Key::Ctrl('c')), Some(vec![0x03]));
        assert_eq!(raw_bytes(Key::Ctrl('d')), Some(vec![0x04]));
        assert_eq!(raw_bytes(Key::Ctrl('x')), Some(vec![0x18]));
        assert_eq!(raw_bytes(Key::Ctrl('o')), Some(vec![0x0F]));
        assert_eq!(raw_bytes(Key::Ctrl('w')), Some(vec![0x17]));
        assert_eq!(raw_bytes(Key::Ctrl('k')), Some(vec![0x0B]));
        assert_eq!(raw_bytes(Key::Ctrl('u')), Some(vec![0x15]));
        assert_eq!(raw_bytes(Key::Ctrl('1')), None);
    }

    #[test]
    fn test_navigation_keys() {
        assert_eq!(raw_bytes(Key::Left), Some(b"\x1b[D".to_vec()));
        assert_eq!(raw_bytes(Key::End), Some(b"\x1b[F".to_vec()));
        assert_eq!(raw_bytes(Key::Delete), Some(b"\x1b[3~".to_vec()));
        assert_eq!(raw_bytes(Key::PageDown), Some(b"\x1b[6~".to_vec()));
    }

    #[test]
    fn test_editing_keys() {
        assert_eq!(raw_bytes(Key::Enter), Some(vec![b'\r']));
        assert_eq!(raw_bytes(Key::Backspace), Some(vec![0x7F]));
        assert_eq!(raw_bytes(Key::Char('é')), Some("é".as_bytes().to_vec()));
    }
}
