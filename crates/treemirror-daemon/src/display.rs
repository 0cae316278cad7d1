//! Console status display
//!
//! [`ConsoleDisplay`] is the daemon's implementation of [`IStatusDisplay`].
//! Fragments are buffered per calling thread and printed as whole lines, so
//! a watcher reporting its startup never splits a copy line in half.
//!
//! Two output formats are supported:
//! - **Human**: ANSI-coloured text, one colour per style, roots cycling
//!   through magenta, cyan and yellow
//! - **Json**: one JSON object per line with a timestamp, the plain text and
//!   the styled fragments

use std::collections::{BTreeSet, HashMap};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

use chrono::Utc;
use tracing::{info, warn};
use treemirror_core::ports::{IStatusDisplay, TextStyle};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

const RESET: &str = "\x1b[0m";
const ROOT_COLOURS: [&str; 3] = ["\x1b[35m", "\x1b[36m", "\x1b[33m"];

fn colour(style: TextStyle) -> Option<&'static str> {
    match style {
        TextStyle::Plain => None,
        TextStyle::Highlight => Some("\x1b[1;37m"),
        TextStyle::Key => Some("\x1b[32m"),
        TextStyle::Error => Some("\x1b[31m"),
        TextStyle::Slow => Some("\x1b[2;31m"),
        TextStyle::Root(index) => Some(ROOT_COLOURS[index % ROOT_COLOURS.len()]),
    }
}

/// Overall state shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayStatus {
    /// Queue busy or a root still starting
    pub busy: bool,
    /// Number of `mark_error` calls so far
    pub errors: u64,
}

#[derive(Default)]
struct DisplayState {
    pending: HashMap<ThreadId, Vec<(String, TextStyle)>>,
    queue_busy: bool,
    starting: BTreeSet<usize>,
    busy: bool,
    errors: u64,
}

impl DisplayState {
    /// Recomputes the busy flag; returns the new value if it changed
    fn update_busy(&mut self) -> Option<bool> {
        let busy = self.queue_busy || !self.starting.is_empty();
        if busy == self.busy {
            return None;
        }
        self.busy = busy;
        Some(busy)
    }
}

/// Prints the status log to a writer (stdout by default)
pub struct ConsoleDisplay {
    format: OutputFormat,
    state: Mutex<DisplayState>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleDisplay {
    /// Display writing to stdout
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(format, Box::new(io::stdout()))
    }

    pub fn new(format: OutputFormat, out: Box<dyn Write + Send>) -> Self {
        Self {
            format,
            state: Mutex::new(DisplayState::default()),
            out: Mutex::new(out),
        }
    }

    /// Records roots whose watchers have not finished starting; the display
    /// counts as busy until each reports `startup_finished`
    pub fn expect_startup(&self, indices: impl IntoIterator<Item = usize>) {
        let mut state = self.lock_state();
        state.starting.extend(indices);
        if let Some(busy) = state.update_busy() {
            log_transition(busy);
        }
    }

    pub fn status(&self) -> DisplayStatus {
        let state = self.lock_state();
        DisplayStatus {
            busy: state.busy,
            errors: state.errors,
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DisplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes one complete line
    fn emit(&self, fragments: &[(String, TextStyle)]) {
        let line = match self.format {
            OutputFormat::Human => render_human(fragments),
            OutputFormat::Json => render_json(fragments),
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            warn!(error = %e, "Failed to write status line");
        }
    }
}

fn render_human(fragments: &[(String, TextStyle)]) -> String {
    let mut line = String::new();
    for (text, style) in fragments {
        match colour(*style) {
            Some(code) => {
                line.push_str(code);
                line.push_str(text);
                line.push_str(RESET);
            }
            None => line.push_str(text),
        }
    }
    line
}

fn render_json(fragments: &[(String, TextStyle)]) -> String {
    let text: String = fragments.iter().map(|(t, _)| t.as_str()).collect();
    let parts: Vec<serde_json::Value> = fragments
        .iter()
        .filter(|(t, _)| !t.is_empty())
        .map(|(t, style)| serde_json::json!({ "text": t, "style": style.to_string() }))
        .collect();
    serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "text": text.trim_end(),
        "fragments": parts,
    })
    .to_string()
}

fn log_transition(busy: bool) {
    if busy {
        info!("Mirror busy");
    } else {
        info!("Mirror idle");
    }
}

impl IStatusDisplay for ConsoleDisplay {
    fn append_text(&self, text: &str, style: TextStyle) {
        let mut lines = Vec::new();
        {
            let mut state = self.lock_state();
            let id = thread::current().id();
            let buffer = state.pending.entry(id).or_default();
            let mut rest = text;
            while let Some(pos) = rest.find('\n') {
                let (head, tail) = rest.split_at(pos);
                if !head.is_empty() {
                    buffer.push((head.to_string(), style));
                }
                lines.push(std::mem::take(buffer));
                rest = &tail[1..];
            }
            if !rest.is_empty() {
                buffer.push((rest.to_string(), style));
            }
            if buffer.is_empty() {
                state.pending.remove(&id);
            }
        }
        for line in lines {
            self.emit(&line);
        }
    }

    fn mark_busy(&self) {
        let mut state = self.lock_state();
        state.queue_busy = true;
        if let Some(busy) = state.update_busy() {
            log_transition(busy);
        }
    }

    fn mark_idle(&self) {
        let mut state = self.lock_state();
        state.queue_busy = false;
        if let Some(busy) = state.update_busy() {
            log_transition(busy);
        }
    }

    fn mark_error(&self) {
        let mut state = self.lock_state();
        state.errors += 1;
        warn!(errors = state.errors, "Mirror reported an error");
    }

    fn startup_finished(&self, index: usize) {
        let mut state = self.lock_state();
        state.starting.remove(&index);
        if let Some(busy) = state.update_busy() {
            log_transition(busy);
        }
    }
}
