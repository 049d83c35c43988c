//! Call stack capture for resolve operations.

use std::backtrace::Backtrace;

use crate::model::StackSnapshot;

/// Captures the caller's stack when a resolve operation begins.
pub trait StackCapture: Send + Sync {
    /// A snapshot of the current stack, or None when capture is disabled.
    fn capture(&self) -> Option<StackSnapshot>;
}

/// Captures through [`std::backtrace::Backtrace`], keeping at most
/// `max_frames` frames.
#[derive(Debug, Clone, Copy)]
pub struct BacktraceCapture {
    pub max_frames: usize,
}

impl BacktraceCapture {
    pub fn new(max_frames: usize) -> Self {
        Self { max_frames }
    }
}

impl StackCapture for BacktraceCapture {
    fn capture(&self) -> Option<StackSnapshot> {
        let rendered = Backtrace::force_capture().to_string();
        let frames = frames_of(&rendered).take(self.max_frames).collect();
        Some(StackSnapshot { frames })
    }
}

/// Captures nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStackCapture;

impl StackCapture for NoStackCapture {
    fn capture(&self) -> Option<StackSnapshot> {
        None
    }
}

/// Frame symbols of a rendered backtrace. Location lines (`at file:line`)
/// are folded into the preceding frame.
fn frames_of(rendered: &str) -> impl Iterator<Item = String> + '_ {
    let mut lines = rendered.lines().map(str::trim).peekable();
    std::iter::from_fn(move || loop {
        let line = lines.next()?;
        let symbol = match line.split_once(": ") {
            Some((index, symbol)) if index.chars().all(|c| c.is_ascii_digit()) => symbol,
            _ => continue,
        };
        let mut frame = symbol.to_string();
        if let Some(location) = lines.peek().and_then(|next| next.strip_prefix("at ")) {
            frame.push_str(" at ");
            frame.push_str(location);
            lines.next();
        }
        return Some(frame);
    })
}
