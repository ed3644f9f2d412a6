// SPDX-License-Identifier: GPL-3.0-only

//! Terminal user interface
//!
//! Renders frames with Unicode half-block characters for double vertical
//! resolution. Panes are laid out side by side in the order their labels are
//! first shown, with a status bar on the bottom line.
//!
//! [`TerminalSession`] owns raw mode and the alternate screen; the renderer,
//! selector and poller all assume one is alive.

use crate::backends::{Frame, InputPoller, Region, RegionSelector, Renderer};
use crate::constants::{ESC_KEY, timing::SELECTOR_STEP};
use crate::errors::{AppError, AppResult};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Widget},
};
use std::io::{self, Stdout, stdout};
use std::time::Duration;
use tracing::{debug, info, warn};

type Backend = CrosstermBackend<Stdout>;

fn terminal_error(err: io::Error) -> AppError {
    AppError::Terminal(err.to_string())
}

/// Raw mode plus alternate screen, restored on drop
pub struct TerminalSession {
    _private: (),
}

impl TerminalSession {
    pub fn enter() -> AppResult<Self> {
        enable_raw_mode().map_err(terminal_error)?;
        if let Err(e) = execute!(stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(terminal_error(e));
        }
        debug!("Entered terminal session");
        Ok(Self { _private: () })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!(error = %e, "Failed to disable raw mode");
        }
        if let Err(e) = execute!(stdout(), LeaveAlternateScreen, crossterm::cursor::Show) {
            warn!(error = %e, "Failed to leave alternate screen");
        }
        debug!("Terminal restored");
    }
}

fn new_terminal() -> AppResult<Terminal<Backend>> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout())).map_err(terminal_error)?;
    terminal.clear().map_err(terminal_error)?;
    Ok(terminal)
}

/// Labelled panes plus a status bar
pub struct TerminalRenderer {
    terminal: Terminal<Backend>,
    panes: Vec<(String, Frame)>,
    status: String,
    needs_clear: bool,
}

impl TerminalRenderer {
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            terminal: new_terminal()?,
            panes: Vec::new(),
            status: String::new(),
            needs_clear: true,
        })
    }

    fn draw(&mut self) -> AppResult<()> {
        // Something else (the selector) may have drawn since our last frame
        if self.needs_clear {
            self.terminal.clear().map_err(terminal_error)?;
            self.needs_clear = false;
        }

        let panes = &self.panes;
        let status = &self.status;
        self.terminal
            .draw(|f| {
                let [main, bar] =
                    Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(f.area());

                let count = panes.len().max(1) as u32;
                let areas = Layout::horizontal((0..count).map(|_| Constraint::Ratio(1, count)))
                    .split(main);

                for ((label, frame), area) in panes.iter().zip(areas.iter()) {
                    let block = Block::bordered().title(label.as_str());
                    let inner = block.inner(*area);
                    f.render_widget(block, *area);
                    f.render_widget(FrameWidget { frame: Some(frame) }, inner);
                }
                if panes.is_empty() {
                    f.render_widget(FrameWidget { frame: None }, main);
                }

                f.render_widget(StatusBar { message: status }, bar);
            })
            .map_err(terminal_error)?;
        Ok(())
    }
}

impl Renderer for TerminalRenderer {
    fn show(&mut self, label: &str, frame: &Frame) -> AppResult<()> {
        match self.panes.iter_mut().find(|(l, _)| l == label) {
            Some((_, slot)) => *slot = frame.clone(),
            None => self.panes.push((label.to_string(), frame.clone())),
        }
        self.draw()
    }

    fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
        if let Err(e) = self.draw() {
            debug!(error = %e, "Failed to redraw status");
        }
    }
}

/// Map a key press to the pipeline's key code
///
/// Esc, `q` and Ctrl+C all map to [`ESC_KEY`]; other ASCII characters map to
/// themselves.
pub fn key_code(key: &KeyEvent) -> Option<u8> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => Some(ESC_KEY),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(ESC_KEY),
        KeyCode::Char(c) if c.is_ascii() => Some(c as u8),
        _ => None,
    }
}

/// Reads key presses from the terminal
#[derive(Default)]
pub struct TerminalPoller;

impl InputPoller for TerminalPoller {
    fn poll_key(&mut self, timeout: Duration) -> AppResult<Option<u8>> {
        if !event::poll(timeout).map_err(terminal_error)? {
            return Ok(None);
        }
        match event::read().map_err(terminal_error)? {
            Event::Key(key) => Ok(key_code(&key)),
            _ => Ok(None),
        }
    }
}

/// What a key press does to the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAction {
    Move(i64, i64),
    Resize(i64),
    Confirm,
    Cancel,
}

impl SelectAction {
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let step = SELECTOR_STEP as i64;
        let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
            1
        } else {
            step
        };
        match key.code {
            KeyCode::Left => Some(Self::Move(-step, 0)),
            KeyCode::Right => Some(Self::Move(step, 0)),
            KeyCode::Up => Some(Self::Move(0, -step)),
            KeyCode::Down => Some(Self::Move(0, step)),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Self::Resize(2)),
            KeyCode::Char('-') => Some(Self::Resize(-2)),
            KeyCode::Enter | KeyCode::Char(' ') => Some(Self::Confirm),
            KeyCode::Esc | KeyCode::Char('q') => Some(Self::Cancel),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Self::Cancel)
            }
            _ => None,
        }
    }

    /// New region after this action, kept inside a `width`x`height` frame
    pub fn apply(&self, region: Region, width: u32, height: u32) -> Region {
        match *self {
            Self::Move(dx, dy) => region.offset_within(dx, dy, width, height),
            Self::Resize(delta) => region.resize_within(delta, width, height),
            Self::Confirm | Self::Cancel => region,
        }
    }
}

/// Interactive region selection on the first frame
///
/// Arrow keys move the box (Shift for single pixels), `+`/`-` resize it,
/// Enter confirms and Esc cancels.
pub struct TerminalSelector {
    initial: Region,
}

impl TerminalSelector {
    pub fn new(initial: Region) -> Self {
        Self { initial }
    }
}

impl RegionSelector for TerminalSelector {
    fn select(&mut self, frame: &Frame) -> AppResult<Region> {
        let (width, height) = (frame.width(), frame.height());
        let mut region = self.initial.clamp_to(width, height);
        if region.is_empty() {
            region = Region::new(0, 0, width.min(64), height.min(64));
        }

        let mut terminal = new_terminal()?;
        loop {
            let mut preview = frame.clone();
            preview.outline_region(region, [0, 255, 0]);
            let message = format!(
                "Select object {} | arrows move, +/- resize, Enter confirm, Esc cancel",
                region
            );

            terminal
                .draw(|f| {
                    let [main, bar] = Layout::vertical([Constraint::Min(1), Constraint::Length(1)])
                        .areas(f.area());
                    let block = Block::bordered().title("Select region");
                    let inner = block.inner(main);
                    f.render_widget(block, main);
                    f.render_widget(
                        FrameWidget {
                            frame: Some(&preview),
                        },
                        inner,
                    );
                    f.render_widget(StatusBar { message: &message }, bar);
                })
                .map_err(terminal_error)?;

            let Event::Key(key) = event::read().map_err(terminal_error)? else {
                continue;
            };
            match SelectAction::from_key(&key) {
                Some(SelectAction::Confirm) => {
                    info!(region = %region, "Region confirmed");
                    return Ok(region);
                }
                Some(SelectAction::Cancel) => return Err(AppError::Cancelled),
                Some(action) => region = action.apply(region, width, height),
                None => {}
            }
        }
    }
}

/// Widget that renders a frame using half-block characters
struct FrameWidget<'a> {
    frame: Option<&'a Frame>,
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame else {
            let msg = "Waiting for frames...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        let Some((display_width, display_height)) =
            fit(frame.width(), frame.height(), area.width, area.height)
        else {
            return;
        };

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width() as f64 / display_width as f64;
        let y_scale = frame.height() as f64 / (display_height as f64 * 2.0);

        // Upper half (▀) is the fg colour, lower half the bg colour
        for ty in 0..display_height {
            for tx in 0..display_width {
                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(sample_pixel(frame, src_x, src_y_top));
                    cell.set_bg(sample_pixel(frame, src_x, src_y_bottom));
                }
            }
        }
    }
}

/// Largest `(cols, rows)` showing a `width`x`height` image at its aspect
/// ratio in a `cols`x`rows` cell area, two pixels per cell vertically
fn fit(width: u32, height: u32, cols: u16, rows: u16) -> Option<(u16, u16)> {
    if width == 0 || height == 0 || cols == 0 || rows == 0 {
        return None;
    }
    let aspect = width as f64 / height as f64;
    let term_width = cols as f64;
    let term_height = rows as f64 * 2.0;

    let (w, h) = if term_width / term_height > aspect {
        (term_height * aspect, term_height)
    } else {
        (term_width, term_width / aspect)
    };
    let (w, h) = ((w as u16).clamp(1, cols), ((h / 2.0) as u16).clamp(1, rows));
    Some((w, h))
}

fn sample_pixel(frame: &Frame, x: u32, y: u32) -> Color {
    let x = x.min(frame.width() - 1);
    let y = y.min(frame.height() - 1);
    let [r, g, b] = frame.image.get_pixel(x, y).0;
    Color::Rgb(r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_key_codes() {
        assert_eq!(key_code(&press(KeyCode::Esc, KeyModifiers::NONE)), Some(ESC_KEY));
        assert_eq!(key_code(&press(KeyCode::Char('q'), KeyModifiers::NONE)), Some(ESC_KEY));
        assert_eq!(
            key_code(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(ESC_KEY)
        );
        assert_eq!(key_code(&press(KeyCode::Char('p'), KeyModifiers::NONE)), Some(b'p'));
        assert_eq!(key_code(&press(KeyCode::Left, KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_select_actions() {
        let region = Region::new(10, 10, 20, 20);
        let right = SelectAction::from_key(&press(KeyCode::Right, KeyModifiers::NONE)).unwrap();
        assert_eq!(right.apply(region, 100, 100).x, 10 + SELECTOR_STEP);

        let fine = SelectAction::from_key(&press(KeyCode::Up, KeyModifiers::SHIFT)).unwrap();
        assert_eq!(fine.apply(region, 100, 100).y, 9);

        let grow = SelectAction::from_key(&press(KeyCode::Char('+'), KeyModifiers::NONE)).unwrap();
        assert_eq!(grow.apply(region, 100, 100), Region::new(8, 8, 24, 24));

        assert_eq!(
            SelectAction::from_key(&press(KeyCode::Enter, KeyModifiers::NONE)),
            Some(SelectAction::Confirm)
        );
        assert_eq!(
            SelectAction::from_key(&press(KeyCode::Esc, KeyModifiers::NONE)),
            Some(SelectAction::Cancel)
        );
    }

    #[test]
    fn test_fit_keeps_aspect() {
        // 640x480 in 80x24 cells: height bound, 48 pixel rows
        assert_eq!(fit(640, 480, 80, 24), Some((64, 24)));
        assert_eq!(fit(640, 480, 0, 24), None);
    }

    #[test]
    fn test_frame_widget_renders_colours() {
        let frame = Frame::new(RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])), 0);
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        FrameWidget {
            frame: Some(&frame),
        }
        .render(area, &mut buf);

        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(10, 20, 30));
    }

    #[test]
    fn test_status_bar_truncates() {
        let area = Rect::new(0, 0, 5, 1);
        let mut buf = Buffer::empty(area);
        StatusBar {
            message: "hello world",
        }
        .render(area, &mut buf);
        assert_eq!(buf[(4, 0)].symbol(), "o");
    }
}
