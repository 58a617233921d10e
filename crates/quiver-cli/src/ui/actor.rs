//! UI Actor - Single-threaded event processing
//!
//! Install workers run concurrently but the terminal is strictly serial, so
//! every UI update is sent over a channel to one thread that owns stdout.
//! That thread is the only owner of the slot state; nothing here needs a lock.
//!
//! The same loop drives the "working" animation: it wakes up on a fixed tick,
//! adds a dot to every working line whose completion signal has not fired
//! yet, and drops the animation as soon as the signal arrives.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crossterm::style::{Color, Stylize};
use crossterm::tty::IsTty;
use quiver_core::ops::format_size;
use quiver_core::{Level, Slot};
use tokio::sync::oneshot;

use super::engine::SlotFrame;
use super::theme::Theme;

const TICK: Duration = Duration::from_millis(100);

/// Events that can be sent to the UI actor
#[derive(Debug)]
pub enum UiEvent {
    /// Reserve one row per package argument.
    Reserve { rows: usize },
    Prefix { slot: Slot, prefix: String },
    Status { slot: Slot, level: Level, msg: String },
    /// Animate `msg` until `done` resolves.
    Working {
        slot: Slot,
        msg: String,
        done: oneshot::Receiver<()>,
    },
    Downloading {
        slot: Slot,
        current: u64,
        total: Option<u64>,
    },
    Info(String),
    Warning(String),
    /// Release the rows and print anything held back while they were live.
    Finish,
    /// Acknowledge once every earlier event has been rendered.
    Sync(oneshot::Sender<()>),
    Shutdown,
}

/// Handle to the UI actor thread
#[derive(Debug)]
pub struct UiActor {
    sender: mpsc::Sender<UiEvent>,
    _handle: thread::JoinHandle<()>,
}

impl UiActor {
    /// Spawn a new UI actor thread
    pub fn spawn() -> Self {
        let interactive = std::io::stdout().is_tty();
        let (sender, receiver) = mpsc::channel();
        let handle = thread::spawn(move || run_event_loop(&receiver, interactive));
        Self {
            sender,
            _handle: handle,
        }
    }

    pub fn sender(&self) -> mpsc::Sender<UiEvent> {
        self.sender.clone()
    }
}

impl Drop for UiActor {
    fn drop(&mut self) {
        let _ = self.sender.send(UiEvent::Shutdown);
    }
}

fn run_event_loop(receiver: &mpsc::Receiver<UiEvent>, interactive: bool) {
    let mut board = SlotBoard::new(Theme::default(), interactive);
    loop {
        match receiver.recv_timeout(TICK) {
            Ok(UiEvent::Reserve { rows }) => board.reserve(rows),
            Ok(UiEvent::Prefix { slot, prefix }) => board.set_prefix(slot, prefix),
            Ok(UiEvent::Status { slot, level, msg }) => board.status(slot, level, msg),
            Ok(UiEvent::Working { slot, msg, done }) => board.working(slot, msg, done),
            Ok(UiEvent::Downloading {
                slot,
                current,
                total,
            }) => board.downloading(slot, current, total),
            Ok(UiEvent::Info(msg)) => board.message(Notice::Info, msg),
            Ok(UiEvent::Warning(msg)) => board.message(Notice::Warning, msg),
            Ok(UiEvent::Finish) => board.finish(),
            Ok(UiEvent::Sync(tx)) => {
                let _ = tx.send(());
            }
            Ok(UiEvent::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                board.finish();
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => board.tick(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notice {
    Info,
    Warning,
}

#[derive(Debug)]
struct SlotLine {
    prefix: String,
    level: Level,
    text: String,
    working: Option<oneshot::Receiver<()>>,
    dots: usize,
    progress: Option<(u64, Option<u64>)>,
}

impl Default for SlotLine {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            level: Level::Info,
            text: String::new(),
            working: None,
            dots: 0,
            progress: None,
        }
    }
}

impl SlotLine {
    fn suffix(&self) -> String {
        let mut out = ".".repeat(self.dots);
        match self.progress {
            Some((current, Some(total))) if total > 0 => {
                let pct = current.saturating_mul(100) / total;
                out.push_str(&format!(
                    " {pct:>3}% ({} / {})",
                    format_size(current),
                    format_size(total)
                ));
            }
            Some((current, _)) => out.push_str(&format!(" ({})", format_size(current))),
            None => {}
        }
        out
    }
}

/// Slot state plus the terminal frame it is drawn into.
struct SlotBoard {
    theme: Theme,
    interactive: bool,
    lines: Vec<SlotLine>,
    frame: Option<SlotFrame>,
    held: Vec<(Notice, String)>,
    ticks: usize,
}

impl SlotBoard {
    fn new(theme: Theme, interactive: bool) -> Self {
        Self {
            theme,
            interactive,
            lines: Vec::new(),
            frame: None,
            held: Vec::new(),
            ticks: 0,
        }
    }

    fn reserve(&mut self, rows: usize) {
        self.finish();
        self.lines = (0..rows).map(|_| SlotLine::default()).collect();
        if self.interactive && rows > 0 {
            self.frame = Some(SlotFrame::new(u16::try_from(rows).unwrap_or(u16::MAX)));
        }
    }

    fn line(&mut self, slot: Slot) -> &mut SlotLine {
        if slot >= self.lines.len() {
            self.lines.resize_with(slot + 1, SlotLine::default);
        }
        &mut self.lines[slot]
    }

    fn set_prefix(&mut self, slot: Slot, prefix: String) {
        self.line(slot).prefix = prefix;
        self.render(slot);
    }

    fn status(&mut self, slot: Slot, level: Level, msg: String) {
        let line = self.line(slot);
        line.level = level;
        line.text = msg;
        line.working = None;
        line.dots = 0;
        line.progress = None;
        self.render(slot);
        if !self.is_framed(slot) {
            self.print_plain(slot, "");
        }
    }

    fn working(&mut self, slot: Slot, msg: String, done: oneshot::Receiver<()>) {
        let line = self.line(slot);
        line.level = Level::Info;
        line.text = msg;
        line.working = Some(done);
        line.dots = 0;
        line.progress = None;
        self.render(slot);
        if !self.is_framed(slot) {
            self.print_plain(slot, "...");
        }
    }

    fn downloading(&mut self, slot: Slot, current: u64, total: Option<u64>) {
        self.line(slot).progress = Some((current, total));
        self.render(slot);
    }

    /// Advance every working animation and retire the finished ones.
    fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
        let step = self.ticks % self.theme.ticks_per_dot.max(1) == 0;
        let max_dots = self.theme.max_dots.max(1);

        let mut dirty = Vec::new();
        for (slot, line) in self.lines.iter_mut().enumerate() {
            let Some(done) = line.working.as_mut() else {
                continue;
            };
            match done.try_recv() {
                Err(oneshot::error::TryRecvError::Empty) => {
                    if step {
                        line.dots = line.dots % max_dots + 1;
                        dirty.push(slot);
                    }
                }
                Ok(()) | Err(oneshot::error::TryRecvError::Closed) => {
                    line.working = None;
                    line.dots = 0;
                    dirty.push(slot);
                }
            }
        }
        for slot in dirty {
            self.render(slot);
        }
    }

    fn is_framed(&self, slot: Slot) -> bool {
        self.frame
            .as_ref()
            .is_some_and(|f| slot < usize::from(f.rows()))
    }

    fn render(&mut self, slot: Slot) {
        if !self.is_framed(slot) {
            return;
        }
        let width = crossterm::terminal::size()
            .map(|(w, _)| usize::from(w))
            .unwrap_or(80)
            .saturating_sub(1);
        let prefix_width = self.lines.iter().map(|l| l.prefix.len()).max().unwrap_or(0);

        let line = &self.lines[slot];
        let color = self.theme.color(line.level);
        let icon = format!("{} ", self.theme.icon(line.level));
        let prefix = format!("{:<prefix_width$}  ", line.prefix);
        let suffix = line.suffix();
        let segments = [
            (icon.as_str(), color),
            (prefix.as_str(), self.theme.colors.prefix),
            (line.text.as_str(), color),
            (suffix.as_str(), self.theme.colors.muted),
        ];

        if let Some(frame) = self.frame.as_mut() {
            let row = u16::try_from(slot).unwrap_or(u16::MAX);
            let _ = frame.draw(row, &segments, width);
            let _ = frame.flush();
        }
    }

    fn print_plain(&self, slot: Slot, suffix: &str) {
        let line = &self.lines[slot];
        if line.prefix.is_empty() {
            println!("{}{suffix}", line.text);
        } else {
            println!("{}: {}{suffix}", line.prefix, line.text);
        }
    }

    fn message(&mut self, notice: Notice, msg: String) {
        if self.frame.as_ref().is_some_and(SlotFrame::is_anchored) {
            self.held.push((notice, msg));
        } else {
            self.print_message(notice, &msg);
        }
    }

    fn print_message(&self, notice: Notice, msg: &str) {
        let (icon, color) = match notice {
            Notice::Info => (self.theme.icons.info, self.theme.colors.info),
            Notice::Warning => (self.theme.icons.warning, self.theme.colors.warning),
        };
        if self.interactive {
            println!("{} {}", icon.with(color), msg.with(color_or_reset(color)));
        } else {
            println!("{icon} {msg}");
        }
    }

    fn finish(&mut self) {
        if let Some(mut frame) = self.frame.take() {
            let _ = frame.finish();
        }
        for (notice, msg) in std::mem::take(&mut self.held) {
            self.print_message(notice, &msg);
        }
    }
}

fn color_or_reset(color: Color) -> Color {
    if color == Color::White {
        Color::Reset
    } else {
        color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> SlotBoard {
        SlotBoard::new(Theme::default(), false)
    }

    #[test]
    fn test_working_line_stops_on_signal() {
        let mut board = board();
        board.reserve(1);
        let (tx, rx) = oneshot::channel();
        board.working(0, "Downloading".to_string(), rx);

        for _ in 0..board.theme.ticks_per_dot {
            board.tick();
        }
        assert!(board.lines[0].working.is_some());
        assert_eq!(board.lines[0].dots, 1);

        tx.send(()).unwrap();
        board.tick();
        assert!(board.lines[0].working.is_none());
        assert_eq!(board.lines[0].dots, 0);
    }

    #[test]
    fn test_dropped_sender_counts_as_done() {
        let mut board = board();
        let (tx, rx) = oneshot::channel::<()>();
        board.working(2, "Installing".to_string(), rx);
        drop(tx);
        board.tick();
        assert_eq!(board.lines.len(), 3);
        assert!(board.lines[2].working.is_none());
    }

    #[test]
    fn test_dots_wrap_around() {
        let mut board = board();
        let (_tx, rx) = oneshot::channel();
        board.working(0, "Finding".to_string(), rx);
        let ticks = board.theme.ticks_per_dot * (board.theme.max_dots + 1);
        for _ in 0..ticks {
            board.tick();
        }
        assert_eq!(board.lines[0].dots, 1);
    }

    #[test]
    fn test_status_replaces_progress() {
        let mut board = board();
        board.reserve(1);
        board.downloading(0, 512, Some(1024));
        assert_eq!(board.lines[0].suffix(), "  50% (512 B / 1.0 KB)");

        board.status(0, Level::Success, "Successfully installed!".to_string());
        assert_eq!(board.lines[0].level, Level::Success);
        assert_eq!(board.lines[0].suffix(), "");
    }

    #[test]
    fn test_actor_spawn() {
        let actor = UiActor::spawn();
        actor
            .sender()
            .send(UiEvent::Info("test".to_string()))
            .unwrap();
        drop(actor);
    }
}
