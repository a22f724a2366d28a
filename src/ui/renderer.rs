//! Terminal renderer using crossterm
//!
//! Draws the login form and session snapshots. Line mode is redrawn in full
//! on every frame; raw mode replays the application's own output, writing
//! only what is new since the previous frame.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{
        Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor,
        SetForegroundColor,
    },
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::orchestrator::Snapshot;
use crate::ui::login::LoginForm;

/// Rows taken by the header, the spacer and the prompt
const CHROME_ROWS: u16 = 4;

const HEADER_BG: Color = Color::AnsiValue(62);
const HEADER_FG: Color = Color::AnsiValue(230);
const PROMPT_FG: Color = Color::AnsiValue(86);
const MUTED_FG: Color = Color::AnsiValue(240);
const ERROR_FG: Color = Color::AnsiValue(196);

const FORM_WIDTH: u16 = 52;

/// Number of scrollback rows that fit in a terminal of `height` rows
pub fn visible_rows(height: u16) -> usize {
    height.saturating_sub(CHROME_ROWS).max(1) as usize
}

/// Remove escape sequences and control characters from a line of output
pub fn visible_text(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\x1b' => match chars.next() {
                // CSI: parameters until a final byte
                Some('[') => {
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                // OSC: until BEL or ST
                Some(']') => {
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\t' => out.push_str("    "),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Truncate `text` to at most `width` display columns
fn fit_width(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Pad `text` with spaces to exactly `width` columns
fn pad_width(text: &str, width: usize) -> String {
    let mut out = fit_width(text, width);
    let used = out.width();
    out.extend(std::iter::repeat(' ').take(width.saturating_sub(used)));
    out
}

/// Terminal renderer
pub struct Renderer {
    initialized: bool,
    /// Raw output already on screen
    raw_shadow: String,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            initialized: false,
            raw_shadow: String::new(),
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Clear(ClearType::All), MoveTo(0, 0))?;
        self.initialized = true;
        Ok(())
    }

    /// Restore the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset), Show);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        terminal::disable_raw_mode()
    }

    /// Forget what raw output is on screen; the next raw frame replays it all
    pub fn invalidate(&mut self) {
        self.raw_shadow.clear();
    }

    pub fn render_login(&mut self, form: &LoginForm, size: (u16, u16)) -> io::Result<()> {
        self.invalidate();
        let (cols, rows) = size;
        let stdout = io::stdout();
        let mut out = io::BufWriter::new(stdout.lock());

        queue!(out, Hide, ResetColor, Clear(ClearType::All))?;

        let width = FORM_WIDTH.min(cols);
        let inner = width.saturating_sub(4) as usize;
        let height: u16 = 14;
        let left = cols.saturating_sub(width) / 2;
        let top = rows.saturating_sub(height) / 2;

        let mut row = top;
        queue!(
            out,
            MoveTo(left, row),
            SetBackgroundColor(HEADER_BG),
            SetForegroundColor(HEADER_FG),
            SetAttribute(Attribute::Bold),
            Print(pad_width(" sshline", width as usize)),
            SetAttribute(Attribute::Reset),
            ResetColor
        )?;
        row += 2;

        let mut cursor_pos = None;
        for (i, field) in form.fields().iter().enumerate() {
            let focused = i == form.focus();
            let label = format!("{}: ", field.label);
            let value = field.display_value();

            queue!(out, MoveTo(left + 2, row))?;
            if focused {
                queue!(out, SetForegroundColor(PROMPT_FG), SetAttribute(Attribute::Bold))?;
            }
            queue!(out, Print(&label), SetAttribute(Attribute::Reset), ResetColor)?;

            let room = inner.saturating_sub(label.width());
            if value.is_empty() {
                queue!(
                    out,
                    SetForegroundColor(MUTED_FG),
                    Print(fit_width(field.placeholder, room)),
                    ResetColor
                )?;
            } else {
                queue!(out, Print(fit_width(&value, room)))?;
            }

            if focused {
                let col = left + 2 + label.width() as u16 + value.width().min(room) as u16;
                cursor_pos = Some((col, row));
            }
            row += 2;
        }

        if form.is_connecting() {
            queue!(
                out,
                MoveTo(left + 2, row),
                SetForegroundColor(PROMPT_FG),
                Print("Connecting..."),
                ResetColor
            )?;
        } else if let Some(error) = form.error() {
            queue!(
                out,
                MoveTo(left + 2, row),
                SetForegroundColor(ERROR_FG),
                Print(fit_width(&format!("Error: {}", error), inner)),
                ResetColor
            )?;
        }
        row += 2;

        queue!(
            out,
            MoveTo(left + 2, row),
            SetForegroundColor(MUTED_FG),
            Print(fit_width("Tab: next field • Enter: connect • Esc: quit", inner)),
            ResetColor
        )?;

        match cursor_pos {
            Some((col, row)) if !form.is_connecting() => queue!(out, MoveTo(col, row), Show)?,
            _ => {}
        }
        out.flush()
    }

    pub fn render_session(
        &mut self,
        snapshot: &Snapshot,
        title: &str,
        size: (u16, u16),
    ) -> io::Result<()> {
        match snapshot {
            Snapshot::Line {
                lines,
                input,
                cursor,
                scroll,
            } => {
                self.invalidate();
                self.render_line(lines, input, *cursor, *scroll, title, size)
            }
            Snapshot::Raw { output } => self.render_raw(output),
            Snapshot::Disconnected => {
                self.invalidate();
                let stdout = io::stdout();
                let mut out = io::BufWriter::new(stdout.lock());
                queue!(out, Hide, Clear(ClearType::All), MoveTo(0, 0), Print("No active session"))?;
                out.flush()
            }
        }
    }

    fn render_line(
        &mut self,
        lines: &[String],
        input: &str,
        cursor: usize,
        scroll: usize,
        title: &str,
        size: (u16, u16),
    ) -> io::Result<()> {
        let (cols, rows) = size;
        let width = cols as usize;
        let stdout = io::stdout();
        let mut out = io::BufWriter::with_capacity(65536, stdout.lock());

        queue!(out, Hide, ResetColor, Clear(ClearType::All), MoveTo(0, 0))?;

        let mut header = format!(" {} (Ctrl+C: interrupt, Ctrl+D: exit, Ctrl+Q: quit)", title);
        if scroll > 0 {
            header.push_str(&format!(" [↑ {} lines]", scroll));
        }
        queue!(
            out,
            SetBackgroundColor(HEADER_BG),
            SetForegroundColor(HEADER_FG),
            Print(pad_width(&header, width)),
            ResetColor
        )?;

        for (i, line) in lines.iter().take(visible_rows(rows)).enumerate() {
            queue!(
                out,
                MoveTo(0, 1 + i as u16),
                Print(fit_width(&visible_text(line), width))
            )?;
        }

        // Prompt on the last row, leaving a blank row above it
        let prompt_row = rows.saturating_sub(1);
        queue!(
            out,
            MoveTo(0, prompt_row),
            SetForegroundColor(PROMPT_FG),
            SetAttribute(Attribute::Bold),
            Print("$ "),
            SetAttribute(Attribute::Reset),
            ResetColor
        )?;

        let shown: Vec<char> = input.chars().map(|c| if c == '\t' { ' ' } else { c }).collect();
        let room = width.saturating_sub(3);
        let mut start = 0;
        while shown[start..cursor.min(shown.len())]
            .iter()
            .map(|c| c.width().unwrap_or(0))
            .sum::<usize>()
            > room
        {
            start += 1;
        }
        let visible: String = shown[start..].iter().collect();
        let before: String = shown[start..cursor.min(shown.len())].iter().collect();
        queue!(
            out,
            Print(fit_width(&visible, room)),
            MoveTo(2 + before.width() as u16, prompt_row),
            Show
        )?;

        out.flush()
    }

    fn render_raw(&mut self, output: &str) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = io::BufWriter::with_capacity(65536, stdout.lock());

        if !self.raw_shadow.is_empty() && output.starts_with(self.raw_shadow.as_str()) {
            let fresh = &output[self.raw_shadow.len()..];
            if fresh.is_empty() {
                return Ok(());
            }
            out.write_all(fresh.as_bytes())?;
        } else {
            queue!(out, ResetColor, Clear(ClearType::All), MoveTo(0, 0), Show)?;
            out.write_all(output.as_bytes())?;
        }
        self.raw_shadow.clear();
        self.raw_shadow.push_str(output);
        out.flush()
    }
}
