//! Shared helpers for unit tests

use std::sync::Mutex;

use treemirror_core::ports::{IStatusDisplay, TextStyle};

/// Status display that records every call
#[derive(Default)]
pub struct RecordingDisplay {
    pub fragments: Mutex<Vec<(String, TextStyle)>>,
    pub events: Mutex<Vec<String>>,
}

impl RecordingDisplay {
    /// All text appended so far, styles dropped
    pub fn text(&self) -> String {
        self.fragments
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.as_str())
            .collect()
    }

    /// Fragments appended with `style`
    pub fn styled(&self, style: TextStyle) -> Vec<String> {
        self.fragments
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| *s == style)
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// Busy/idle/error/startup calls in order
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push_event(&self, event: String) {
        self.events.lock().unwrap().push(event);
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
        self.push_event("busy".into());
    }

    fn mark_idle(&self) {
        self.push_event("idle".into());
    }

    fn mark_error(&self) {
        self.push_event("error".into());
    }

    fn startup_finished(&self, index: usize) {
        self.push_event(format!("started {index}"));
    }
}
