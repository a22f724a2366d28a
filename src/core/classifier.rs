//! Output classification
//!
//! Decides whether remote output is line-structured shell text or the
//! stream of a full-screen application, and keeps the state for whichever
//! display is active.
//!
//! # States
//!
//! ```text
//!            enter sequence
//!   Line ─────────────────────▶ Raw
//!    ▲                           │
//!    └───────────────────────────┘
//!            leave sequence
//! ```
//!
//! Detection is a plain substring match, not a VT parser. A short lookback
//! of the previous chunk is kept so a sequence split across two reads is
//! still seen.

use super::scrollback::{Scrollback, DEFAULT_MAX_LINES};

/// Alternate screen / application keypad enable
const ENTER_SEQUENCES: [&str; 3] = ["\x1b[?1049h", "\x1b[?47h", "\x1b[?1h\x1b="];

/// Alternate screen / application keypad disable
const LEAVE_SEQUENCES: [&str; 3] = ["\x1b[?1049l", "\x1b[?47l", "\x1b[?1l\x1b>"];

/// Longest first, so the combined forms are removed before the bare one
const CLEAR_SEQUENCES: [&str; 3] = ["\x1b[H\x1b[2J", "\x1b[2J\x1b[H", "\x1b[2J"];

const PROMPT_TERMINATORS: [char; 3] = ['$', '#', '>'];

/// Bytes of the previous chunk kept for split-sequence detection
const LOOKBACK: usize = 7;

/// Default bound on the raw accumulator
pub const DEFAULT_RAW_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Line,
    Raw,
}

/// Line mode state: scrollback plus the scroll position into it
#[derive(Debug, Clone)]
pub struct LineView {
    scrollback: Scrollback,
    scroll: usize,
}

impl LineView {
    fn new(max_lines: usize) -> Self {
        Self {
            scrollback: Scrollback::new(max_lines),
            scroll: 0,
        }
    }

    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    /// Lines back from the bottom, `0..=len`
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let target = self.scroll as i64 + delta as i64;
        self.scroll = target.clamp(0, self.scrollback.len() as i64) as usize;
    }

    /// The `rows` lines visible at the current scroll position
    pub fn visible(&self, rows: usize) -> Vec<String> {
        let start = self.scrollback.len().saturating_sub(rows + self.scroll);
        self.scrollback.window(start, rows)
    }

    fn ingest(&mut self, text: &str, pending_input: &str) {
        let mut text = text.replace("\r\n", "\n").replace('\r', "\n");

        for seq in LEAVE_SEQUENCES {
            text = text.replace(seq, "");
        }

        if CLEAR_SEQUENCES.iter().any(|seq| text.contains(seq)) {
            self.scrollback.clear();
            self.scroll = 0;
            for seq in CLEAR_SEQUENCES {
                text = text.replace(seq, "");
            }
        }

        for line in text.split('\n') {
            if is_suppressed(line, pending_input) {
                continue;
            }
            self.scrollback.append(line);
        }
        self.scroll = self.scroll.min(self.scrollback.len());
    }
}

/// Echo suppression: blank lines, prompts and the echoed pending input
fn is_suppressed(line: &str, pending_input: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.ends_with(&PROMPT_TERMINATORS[..]) {
        return true;
    }
    !pending_input.is_empty() && line.contains(pending_input)
}

/// Raw mode state: everything received since the application took over
#[derive(Debug, Clone)]
pub struct RawView {
    output: String,
    limit: usize,
    /// Line history suspended while the application runs
    parked: LineView,
}

impl RawView {
    pub fn output(&self) -> &str {
        &self.output
    }

    fn push(&mut self, text: &str) {
        self.output.push_str(text);
        if self.output.len() > self.limit {
            let mut cut = self.output.len() - self.limit;
            while !self.output.is_char_boundary(cut) {
                cut += 1;
            }
            self.output.drain(..cut);
        }
    }
}

/// Display state keyed by mode
#[derive(Debug, Clone)]
pub enum Display {
    Line(LineView),
    Raw(RawView),
}

/// Classifies output chunks and routes them to the active display
pub struct OutputClassifier {
    display: Display,
    raw_limit: usize,
    lookback: Vec<u8>,
    utf8_carry: Vec<u8>,
    /// Line-mode text ending in an unfinished control sequence
    line_tail: String,
}

impl Default for OutputClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES, DEFAULT_RAW_LIMIT)
    }
}

impl OutputClassifier {
    pub fn new(max_lines: usize, raw_limit: usize) -> Self {
        Self {
            display: Display::Line(LineView::new(max_lines)),
            raw_limit: raw_limit.max(1),
            lookback: Vec::with_capacity(LOOKBACK),
            utf8_carry: Vec::new(),
            line_tail: String::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        match self.display {
            Display::Line(_) => Mode::Line,
            Display::Raw(_) => Mode::Raw,
        }
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    /// Adjust the line-mode scroll position; ignored in raw mode
    pub fn scroll_by(&mut self, delta: i32) {
        if let Display::Line(view) = &mut self.display {
            view.scroll_by(delta);
        }
    }

    /// Classify one chunk of remote output
    pub fn feed(&mut self, bytes: &[u8], pending_input: &str) {
        let entered = self.scan(bytes, &ENTER_SEQUENCES);
        let left = self.scan(bytes, &LEAVE_SEQUENCES);
        self.remember(bytes);
        let mut text = self.decode(bytes);
        if !self.line_tail.is_empty() {
            text.insert_str(0, &std::mem::take(&mut self.line_tail));
        }

        if entered && self.mode() == Mode::Line {
            let split = ENTER_SEQUENCES
                .iter()
                .filter_map(|seq| text.find(seq))
                .min()
                .unwrap_or(0);
            self.enter_raw(&text, split, pending_input);
            if !left {
                return;
            }
        }

        if left && self.mode() == Mode::Raw {
            self.leave_raw();
            return;
        }

        match &mut self.display {
            Display::Raw(raw) => raw.push(&text),
            Display::Line(view) => {
                let keep = unfinished_sequence_len(&text);
                self.line_tail = text.split_off(text.len() - keep);
                view.ingest(&text, pending_input);
            }
        }
    }

    fn enter_raw(&mut self, text: &str, split: usize, pending_input: &str) {
        let placeholder = Display::Line(LineView::new(1));
        let mut parked = match std::mem::replace(&mut self.display, placeholder) {
            Display::Line(view) => view,
            raw @ Display::Raw(_) => {
                self.display = raw;
                return;
            }
        };
        parked.ingest(&text[..split], pending_input);
        tracing::debug!("entering raw mode");

        let mut raw = RawView {
            output: String::new(),
            limit: self.raw_limit,
            parked,
        };
        raw.push(&text[split..]);
        self.display = Display::Raw(raw);
    }

    fn leave_raw(&mut self) {
        let placeholder = Display::Line(LineView::new(1));
        if let Display::Raw(raw) = std::mem::replace(&mut self.display, placeholder) {
            tracing::debug!(discarded = raw.output.len(), "leaving raw mode");
            self.display = Display::Line(raw.parked);
        }
    }

    /// Whether any of `sequences` ends inside `bytes`, counting matches that
    /// start in the lookback of the previous chunk
    fn scan(&self, bytes: &[u8], sequences: &[&str]) -> bool {
        let mut window = self.lookback.clone();
        window.extend_from_slice(bytes);
        let carried = self.lookback.len();

        sequences.iter().map(|seq| seq.as_bytes()).any(|seq| {
            window
                .windows(seq.len())
                .enumerate()
                .any(|(start, candidate)| candidate == seq && start + seq.len() > carried)
        })
    }

    fn remember(&mut self, bytes: &[u8]) {
        self.lookback.extend_from_slice(bytes);
        let excess = self.lookback.len().saturating_sub(LOOKBACK);
        self.lookback.drain(..excess);
    }

    /// Decode to text, holding back an incomplete trailing UTF-8 sequence
    fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.utf8_carry);
        buf.extend_from_slice(bytes);
        let keep = incomplete_utf8_tail(&buf);
        self.utf8_carry = buf.split_off(buf.len() - keep);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Length of a trailing prefix of a mode or clear sequence still missing its
/// end; 0 when the text ends in a complete one
fn unfinished_sequence_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let all = || {
        ENTER_SEQUENCES
            .iter()
            .chain(LEAVE_SEQUENCES.iter())
            .chain(CLEAR_SEQUENCES.iter())
            .map(|seq| seq.as_bytes())
    };
    if all().any(|seq| bytes.ends_with(seq)) {
        return 0;
    }
    all()
        .flat_map(|seq| (1..seq.len()).filter(move |&n| bytes.ends_with(&seq[..n])))
        .max()
        .unwrap_or(0)
}

/// Length of a truncated multi-byte sequence at the end of `buf`
fn incomplete_utf8_tail(buf: &[u8]) -> usize {
    for back in 1..=buf.len().min(3) {
        let b = buf[buf.len() - back];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let seq_len = if b & 0xE0 == 0xC0 {
            2
        } else if b & 0xF0 == 0xE0 {
            3
        } else if b & 0xF8 == 0xF0 {
            4
        } else {
            1
        };
        return if seq_len > back { back } else { 0 };
    }
    0
}
