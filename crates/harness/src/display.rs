//! Display collaborator: five text slots, one per store
//!
//! The harness only pushes text into a display; nothing flows back.

use notistress_core::StoreKind;
use parking_lot::Mutex;
use std::io::Write;

/// Sink for formatted slot text.
pub trait MetricsDisplay: Send + Sync {
    /// Replace the text of `kind`'s slot.
    fn update(&self, kind: StoreKind, text: &str);

    /// Draw the current slots. Called periodically on the control thread.
    fn present(&self) {}
}

/// Keeps the latest text per slot and prints all five on `present`.
#[derive(Default)]
pub struct ConsoleDisplay {
    slots: Mutex<[String; 5]>,
}

impl ConsoleDisplay {
    /// Empty slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// The five slots, one per line group, in display order.
    pub fn render(&self) -> String {
        let slots = self.slots.lock();
        StoreKind::ALL
            .iter()
            .map(|kind| {
                let text = &slots[kind.index()];
                if text.is_empty() {
                    format!("{}: -", kind.label())
                } else {
                    text.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl MetricsDisplay for ConsoleDisplay {
    fn update(&self, kind: StoreKind, text: &str) {
        self.slots.lock()[kind.index()] = text.to_string();
    }

    fn present(&self) {
        let frame = self.render();
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // Write errors are ignored
        let _ = writeln!(out, "{}\n", frame);
        let _ = out.flush();
    }
}

/// Records every update, for tests.
#[derive(Default)]
pub struct RecordingDisplay {
    updates: Mutex<Vec<(StoreKind, String)>>,
}

impl RecordingDisplay {
    /// No updates yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// All updates so far, oldest first.
    pub fn updates(&self) -> Vec<(StoreKind, String)> {
        self.updates.lock().clone()
    }

    /// Latest text pushed to `kind`'s slot.
    pub fn latest(&self, kind: StoreKind) -> Option<String> {
        self.updates
            .lock()
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, text)| text.clone())
    }
}

impl MetricsDisplay for RecordingDisplay {
    fn update(&self, kind: StoreKind, text: &str) {
        self.updates.lock().push((kind, text.to_string()));
    }
}
