//! Per-store metrics owned by the control thread
//!
//! `MetricsSink` holds one `(file size, observed count)` pair per store kind.
//! Only the control thread writes it; every other thread goes through a
//! `MetricsPublisher`, which marshals the update onto the control run loop.
//! Readers may look at a snapshot from anywhere and accept that it lags.

use crate::display::MetricsDisplay;
use crate::fatal;
use notistress_core::{Result, StoreKind};
use notistress_store::{file_size_bytes, RunLoop};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Latest published values for one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricSnapshot {
    /// Size of the store file
    pub file_size_bytes: u64,
    /// Row count last observed; unused for `WriteOnly`
    pub observed_count: usize,
}

/// Bytes as megabytes with two decimals, e.g. `"1.50 mb"`.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} mb", bytes as f64 / 1024.0 / 1024.0)
}

/// Slot text for `kind`: `"{label}: {mb}"`, plus `"\n{count}"` when the
/// kind tracks a count.
pub fn format_slot(kind: StoreKind, snapshot: &MetricSnapshot) -> String {
    let size = format_megabytes(snapshot.file_size_bytes);
    if kind.tracks_count() {
        format!("{}: {}\n{}", kind.label(), size, snapshot.observed_count)
    } else {
        format!("{}: {}", kind.label(), size)
    }
}

/// The five metric pairs and the display they feed.
pub struct MetricsSink {
    owner: ThreadId,
    data_dir: PathBuf,
    slots: Mutex<[MetricSnapshot; 5]>,
    updates: AtomicU64,
    display: Arc<dyn MetricsDisplay>,
}

impl MetricsSink {
    /// A sink owned by the calling thread.
    pub fn new(data_dir: impl Into<PathBuf>, display: Arc<dyn MetricsDisplay>) -> Arc<Self> {
        Arc::new(MetricsSink {
            owner: thread::current().id(),
            data_dir: data_dir.into(),
            slots: Mutex::new([MetricSnapshot::default(); 5]),
            updates: AtomicU64::new(0),
            display,
        })
    }

    /// Thread allowed to publish.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Directory the sink reads file sizes from.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn assert_owner(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "metrics written off the control thread"
        );
    }

    /// Record size and count for `kind` and push the slot text.
    pub fn publish(&self, kind: StoreKind, file_size_bytes: u64, observed_count: usize) {
        self.store(kind, |slot| {
            slot.file_size_bytes = file_size_bytes;
            slot.observed_count = observed_count;
        });
    }

    /// Record only the size for `kind`, keeping the last count.
    pub fn publish_size(&self, kind: StoreKind, file_size_bytes: u64) {
        self.store(kind, |slot| slot.file_size_bytes = file_size_bytes);
    }

    fn store(&self, kind: StoreKind, edit: impl FnOnce(&mut MetricSnapshot)) {
        self.assert_owner();
        let text = {
            let mut slots = self.slots.lock();
            let slot = &mut slots[kind.index()];
            edit(slot);
            format_slot(kind, slot)
        };
        self.updates.fetch_add(1, Ordering::Relaxed);
        self.display.update(kind, &text);
    }

    /// Read the current file size of `kind` and publish it, with `count` if given.
    pub fn refresh(&self, kind: StoreKind, count: Option<usize>) -> Result<()> {
        let size = file_size_bytes(kind.file_path(&self.data_dir))?;
        match count {
            Some(count) => self.publish(kind, size, count),
            None => self.publish_size(kind, size),
        }
        Ok(())
    }

    /// Latest values for `kind`. Callable from any thread.
    pub fn snapshot(&self, kind: StoreKind) -> MetricSnapshot {
        self.slots.lock()[kind.index()]
    }

    /// Total number of publishes.
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    /// Redraw the display.
    pub fn present(&self) {
        self.display.present();
    }
}

/// `Send` handle that forwards observations to the sink's control thread.
#[derive(Clone)]
pub struct MetricsPublisher {
    control: RunLoop,
    sink: Arc<MetricsSink>,
}

impl MetricsPublisher {
    /// Publish through `control`, the run loop of the sink's owner.
    pub fn new(control: RunLoop, sink: Arc<MetricsSink>) -> Self {
        debug_assert_eq!(control.owner(), sink.owner());
        MetricsPublisher { control, sink }
    }

    /// The sink updates land in.
    pub fn sink(&self) -> &Arc<MetricsSink> {
        &self.sink
    }

    /// Publish `count` for `kind`; the file size is read on the control thread.
    pub fn publish_count(&self, kind: StoreKind, count: usize) {
        self.marshal(kind, Some(count));
    }

    /// Publish the file size of `kind` only.
    pub fn publish_size(&self, kind: StoreKind) {
        self.marshal(kind, None);
    }

    fn marshal(&self, kind: StoreKind, count: Option<usize>) {
        let sink = Arc::clone(&self.sink);
        self.control.perform(move || {
            if let Err(e) = sink.refresh(kind, count) {
                fatal("refreshing store metrics", &e.on_store(kind));
            }
        });
    }
}
