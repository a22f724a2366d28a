//! Bounded scrollback for line-mode output
//!
//! An ordered log of display lines. The capacity bound is enforced here, on
//! every append, so no producer can grow the history past it.

use std::collections::VecDeque;

/// Default number of retained lines
pub const DEFAULT_MAX_LINES: usize = 10_000;

/// Append-only line history with FIFO eviction
#[derive(Debug, Clone)]
pub struct Scrollback {
    lines: VecDeque<String>,
    max_lines: usize,
}

impl Default for Scrollback {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

impl Scrollback {
    /// Create an empty scrollback holding at most `max_lines` lines
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
        }
    }

    /// Append a line, dropping the oldest ones once over capacity
    pub fn append(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Up to `count` lines starting at `start`, oldest first
    pub fn window(&self, start: usize, count: usize) -> Vec<String> {
        self.lines.iter().skip(start).take(count).cloned().collect()
    }
}
