//! Shared helpers for sync integration tests

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use treemirror_core::config::{Config, ConfigBuilder};
use treemirror_core::domain::RootDescriptor;
use treemirror_core::ports::{IStatusDisplay, TextStyle};

/// Status display that records every call
#[derive(Default)]
pub struct RecordingDisplay {
    fragments: Mutex<Vec<(String, TextStyle)>>,
    events: Mutex<Vec<String>>,
}

impl RecordingDisplay {
    /// All text appended so far
    pub fn text(&self) -> String {
        self.fragments
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.as_str())
            .collect()
    }

    /// Busy/idle/error/startup calls in order
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn has_event(&self, event: &str) -> bool {
        self.events.lock().unwrap().iter().any(|e| e == event)
    }

    /// Whether the last busy/idle transition was to idle
    pub fn is_idle(&self) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|e| *e == "busy" || *e == "idle")
            .is_some_and(|e| e == "idle")
    }
}

impl IStatusDisplay for RecordingDisplay {
    fn append_text(&self, text: &str, style: TextStyle) {
        self.fragments
            .lock()
            .unwrap()
            .push((text.to_string(), style));
    }

    fn mark_busy(&self) {
        self.events.lock().unwrap().push("busy".into());
    }

    fn mark_idle(&self) {
        self.events.lock().unwrap().push("idle".into());
    }

    fn mark_error(&self) {
        self.events.lock().unwrap().push("error".into());
    }

    fn startup_finished(&self, index: usize) {
        self.events.lock().unwrap().push(format!("started {index}"));
    }
}

/// A set of source/target directory pairs
pub struct Roots {
    pub dirs: Vec<(TempDir, TempDir)>,
}

impl Roots {
    pub fn new(count: usize) -> Self {
        Self {
            dirs: (0..count)
                .map(|_| (TempDir::new().unwrap(), TempDir::new().unwrap()))
                .collect(),
        }
    }

    pub fn source(&self, index: usize) -> &Path {
        self.dirs[index - 1].0.path()
    }

    pub fn target(&self, index: usize) -> &Path {
        self.dirs[index - 1].1.path()
    }

    pub fn config(&self, debounce_ms: u64) -> Config {
        self.dirs
            .iter()
            .fold(ConfigBuilder::new(), |builder, (source, target)| {
                builder.root(source.path(), target.path())
            })
            .queue_debounce_ms(debounce_ms)
            .build()
    }

    pub fn descriptors(&self) -> Vec<RootDescriptor> {
        self.config(100).descriptors()
    }
}

pub fn write(base: &Path, rel: &str, content: &str) {
    let path = base.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Polls `condition` every 20 ms until it holds or `timeout` passes
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Number of regular files below `dir`
pub fn count_files(dir: &Path) -> usize {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count()
}

pub fn display() -> Arc<RecordingDisplay> {
    Arc::new(RecordingDisplay::default())
}
