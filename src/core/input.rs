//! Local input line editing
//!
//! In line mode keystrokes edit a pending line locally; nothing reaches the
//! remote shell until Enter, Ctrl+C or Ctrl+D. The cursor counts characters,
//! not bytes, and always stays within `0..=len`.

use super::keys::{Key, CURSOR_DOWN, CURSOR_UP, END_OF_TRANSMISSION, INTERRUPT};

/// What the session should do after an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    /// Purely local edit
    None,
    /// Bytes to transmit
    Send(Vec<u8>),
    /// Move the scroll position (positive = towards older lines)
    Scroll(i32),
}

/// The pending input line and its cursor
#[derive(Debug, Clone, Default)]
pub struct InputLine {
    text: String,
    cursor: usize,
}

impl InputLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Byte offset of the character at `index`
    fn byte_offset(&self, index: usize) -> usize {
        self.text
            .char_indices()
            .nth(index)
            .map(|(offset, _)| offset)
            .unwrap_or(self.text.len())
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    fn insert(&mut self, ch: char) {
        let at = self.byte_offset(self.cursor);
        self.text.insert(at, ch);
        self.cursor += 1;
    }

    fn remove_at(&mut self, index: usize) {
        let at = self.byte_offset(index);
        self.text.remove(at);
    }

    /// Apply one key to the line
    pub fn apply(&mut self, key: Key) -> LineAction {
        match key {
            Key::Char(ch) => self.insert(ch),
            Key::Tab => self.insert('\t'),
            Key::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.remove_at(self.cursor);
                }
            }
            Key::Delete => {
                if self.cursor < self.char_len() {
                    self.remove_at(self.cursor);
                }
            }
            Key::Left => self.cursor = self.cursor.saturating_sub(1),
            Key::Right => self.cursor = (self.cursor + 1).min(self.char_len()),
            Key::Home => self.cursor = 0,
            Key::End => self.cursor = self.char_len(),
            Key::Enter => {
                let mut bytes = std::mem::take(&mut self.text).into_bytes();
                bytes.push(b'\n');
                self.cursor = 0;
                return LineAction::Send(bytes);
            }
            Key::Up => return LineAction::Send(CURSOR_UP.to_vec()),
            Key::Down => return LineAction::Send(CURSOR_DOWN.to_vec()),
            Key::Ctrl('c') => {
                self.clear();
                return LineAction::Send(vec![INTERRUPT]);
            }
            Key::Ctrl('d') => return LineAction::Send(vec![END_OF_TRANSMISSION]),
            Key::PageUp => return LineAction::Scroll(1),
            Key::PageDown => return LineAction::Scroll(-1),
            Key::Ctrl(_) | Key::Esc => {}
        }
        LineAction::None
    }
}
