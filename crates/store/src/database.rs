//! Shared store instance behind every handle on one file
//!
//! Opening the same path twice yields the same `Database`, so a commit made
//! through any handle is visible to, and notifies, every subscriber on that
//! file. Writers are serialized by the commit log lock; readers take a shared
//! lock on the in-memory state and never wait on file I/O of other readers.

use crate::codec::{decode_all, encode_commit, CommitRecord, Operation};
use crate::registry;
use crate::results::Results;
use crate::run_loop::{RunLoop, WeakRunLoop};
use crate::state::StoreState;
use notistress_core::{Error, Result};
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) type Callback = Box<dyn FnMut(&Results) + Send + 'static>;

/// Append-only file that every commit is written to.
pub(crate) struct CommitLog {
    file: File,
}

impl CommitLog {
    fn append(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        self.file.flush()?;
        Ok(())
    }
}

/// One registration of interest in a result set.
pub(crate) struct SubscriptionEntry {
    pub(crate) id: u64,
    run_loop: WeakRunLoop,
    results: Results,
    pending: AtomicBool,
    cancelled: AtomicBool,
    callback: Mutex<Callback>,
}

impl SubscriptionEntry {
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Runs on the subscriber's run loop.
    fn deliver(&self) {
        self.pending.store(false, Ordering::Release);
        if self.is_cancelled() {
            return;
        }
        let mut callback = self.callback.lock();
        (callback)(&self.results);
    }
}

/// Process-wide instance for one store file.
pub struct Database {
    path: PathBuf,
    state: RwLock<StoreState>,
    log: Mutex<CommitLog>,
    subscriptions: Mutex<Vec<Arc<SubscriptionEntry>>>,
    next_subscription_id: AtomicU64,
}

impl Database {
    /// Open the store at `path`, or return the instance already open for it.
    ///
    /// Creates an empty file if none exists. The first open of a path replays
    /// the file; the instance then stays registered until [`evict`], so later
    /// opens are a registry lookup.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Database>> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let canonical = fs::canonicalize(path)?;

        let slot = registry::slot(&canonical);
        let db = slot.get_or_try_init(|| Database::load(canonical, file).map(Arc::new))?;
        Ok(Arc::clone(db))
    }

    fn load(path: PathBuf, mut file: File) -> Result<Database> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let (commits, verified) = decode_all(&bytes)?;

        if verified < bytes.len() {
            warn!(
                path = %path.display(),
                torn_bytes = bytes.len() - verified,
                "Dropping torn trailing frame"
            );
            file.set_len(verified as u64)?;
        }

        let mut state = StoreState::default();
        for CommitRecord { version, ops } in commits {
            state.validate(&ops)?;
            state.apply(version, ops);
        }
        debug!(path = %path.display(), version = state.version(), "Opened store");

        Ok(Database {
            path,
            state: RwLock::new(state),
            log: Mutex::new(CommitLog { file }),
            subscriptions: Mutex::new(Vec::new()),
            next_subscription_id: AtomicU64::new(1),
        })
    }

    /// Canonical path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest committed version; `0` for a store that was never written.
    pub fn version(&self) -> u64 {
        self.state.read().version()
    }

    /// Size of the backing file in bytes.
    pub fn file_size_bytes(&self) -> Result<u64> {
        crate::file_size_bytes(&self.path)
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .lock()
            .iter()
            .filter(|s| !s.is_cancelled())
            .count()
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read()
    }

    /// Take the writer lock. Held for the whole transaction body.
    pub(crate) fn begin_write(&self) -> MutexGuard<'_, CommitLog> {
        self.log.lock()
    }

    /// Persist and apply `ops`, then notify subscribers.
    ///
    /// Caller holds the writer lock. Returns the new version, or the current
    /// one unchanged when `ops` is empty.
    pub(crate) fn commit(&self, log: &mut CommitLog, ops: Vec<Operation>) -> Result<u64> {
        if ops.is_empty() {
            return Ok(self.version());
        }

        let version = {
            let mut state = self.state.write();
            state.validate(&ops)?;
            let record = CommitRecord {
                version: state.version() + 1,
                ops,
            };
            let frame = encode_commit(&record)?;
            log.append(&frame)?;
            state.apply(record.version, record.ops);
            record.version
        };

        self.notify_subscribers();
        Ok(version)
    }

    pub(crate) fn add_subscription(
        &self,
        run_loop: &RunLoop,
        results: Results,
        callback: Callback,
    ) -> Arc<SubscriptionEntry> {
        let entry = Arc::new(SubscriptionEntry {
            id: self.next_subscription_id.fetch_add(1, Ordering::Relaxed),
            run_loop: run_loop.downgrade(),
            results,
            pending: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            callback: Mutex::new(callback),
        });
        self.subscriptions.lock().push(Arc::clone(&entry));
        entry
    }

    pub(crate) fn remove_subscription(&self, id: u64) {
        self.subscriptions.lock().retain(|s| s.id != id);
    }

    /// Post one delivery per subscription, coalescing with any delivery that
    /// is already queued. Entries whose loop is gone are pruned.
    fn notify_subscribers(&self) {
        let mut subscriptions = self.subscriptions.lock();
        subscriptions.retain(|entry| {
            if entry.is_cancelled() {
                return false;
            }
            let Some(run_loop) = entry.run_loop.upgrade() else {
                debug!(path = %self.path.display(), id = entry.id, "Pruning subscription with dead run loop");
                return false;
            };
            if !entry.pending.swap(true, Ordering::AcqRel) {
                let entry = Arc::clone(entry);
                run_loop.perform(move || entry.deliver());
            }
            true
        });
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("version", &self.version())
            .finish()
    }
}

/// Forget the instance registered for `path`, if any.
///
/// Handles that are still alive keep working against the old instance; the
/// next `open` builds a fresh one from the file. Used when a working
/// directory is wiped.
pub fn evict(path: &Path) -> Result<()> {
    let canonical = match fs::canonicalize(path) {
        Ok(p) => p,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::Io(e)),
    };
    if registry::remove(&canonical) {
        debug!(path = %canonical.display(), "Evicted store");
    }
    Ok(())
}
