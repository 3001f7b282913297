//! Per-caller handle on a store and its write transactions

use crate::codec::{Operation, RootRecord};
use crate::database::Database;
use crate::results::{Predicate, Results};
use notistress_core::{ChildEntity, Result, RootEntity, Timestamp};
use std::path::Path;
use std::sync::Arc;

/// A handle on one store file.
///
/// Handles are cheap: each opens (or reuses) the shared [`Database`] for its
/// path. Writers on different threads are expected to open their own.
#[derive(Debug)]
pub struct StoreHandle {
    db: Arc<Database>,
    seen_version: u64,
}

impl StoreHandle {
    /// Open a handle on `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<StoreHandle> {
        let db = Database::open(path)?;
        let seen_version = db.version();
        Ok(StoreHandle { db, seen_version })
    }

    /// Shared store behind this handle.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Version this handle last observed.
    pub fn seen_version(&self) -> u64 {
        self.seen_version
    }

    /// Catch up with the latest commit. Returns whether anything changed.
    pub fn refresh(&mut self) -> bool {
        let latest = self.db.version();
        let changed = latest != self.seen_version;
        self.seen_version = latest;
        changed
    }

    /// All roots.
    pub fn objects(&self) -> Results {
        Results::new(Arc::clone(&self.db), None)
    }

    /// Roots matching `predicate`.
    pub fn filter(&self, predicate: Predicate) -> Results {
        Results::new(Arc::clone(&self.db), Some(predicate))
    }

    /// Root by primary key.
    pub fn object(&self, id: &str) -> Option<RootEntity> {
        let state = self.db.read_state();
        state.root(id).map(|r| state.materialize(r))
    }

    /// Child by primary key.
    pub fn child(&self, id: &str) -> Option<ChildEntity> {
        self.db.read_state().child(id).cloned()
    }

    /// Size of the backing file in bytes.
    pub fn file_size_bytes(&self) -> Result<u64> {
        self.db.file_size_bytes()
    }

    /// Run `body` as one atomic write transaction.
    ///
    /// Writers on the same file are serialized for the whole body. If `body`
    /// returns `Err`, or the staged operations reference missing rows,
    /// nothing is applied, persisted or notified. A body that stages nothing
    /// commits nothing.
    pub fn write<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut WriteTransaction<'_>) -> Result<T>,
    {
        let mut log = self.db.begin_write();
        let mut txn = WriteTransaction {
            handle: &*self,
            ops: Vec::new(),
        };
        let value = body(&mut txn)?;
        let ops = txn.ops;
        let version = self.db.commit(&mut log, ops)?;
        drop(log);
        self.seen_version = version;
        Ok(value)
    }
}

/// Operations staged inside [`StoreHandle::write`].
///
/// Reads inside the body see the state as of the last commit, not the
/// operations staged so far.
pub struct WriteTransaction<'a> {
    handle: &'a StoreHandle,
    ops: Vec<Operation>,
}

impl WriteTransaction<'_> {
    /// Insert `root`, or replace every field of the root with the same id.
    /// Its children are upserted as well.
    pub fn upsert_root(&mut self, root: RootEntity) {
        let child_ids = root.children.iter().map(|c| c.id.clone()).collect();
        for child in root.children {
            self.ops.push(Operation::UpsertChild(child));
        }
        self.ops.push(Operation::UpsertRoot(RootRecord {
            id: root.id,
            title: root.title,
            timestamp: root.timestamp,
            group_id: root.group_id,
            child_ids,
        }));
    }

    /// Insert `child`, or replace the child with the same id.
    pub fn upsert_child(&mut self, child: ChildEntity) {
        self.ops.push(Operation::UpsertChild(child));
    }

    /// Append an existing (or staged) child to a root's child list.
    pub fn append_child(&mut self, root_id: impl Into<String>, child_id: impl Into<String>) {
        self.ops.push(Operation::AppendChild {
            root_id: root_id.into(),
            child_id: child_id.into(),
        });
    }

    /// Set a root's timestamp.
    pub fn touch(&mut self, root_id: impl Into<String>, timestamp: Timestamp) {
        self.ops.push(Operation::Touch {
            root_id: root_id.into(),
            timestamp,
        });
    }

    /// All roots, as of the last commit.
    pub fn objects(&self) -> Results {
        self.handle.objects()
    }

    /// Root by primary key, as of the last commit.
    pub fn object(&self, id: &str) -> Option<RootEntity> {
        self.handle.object(id)
    }

    /// Number of operations staged so far.
    pub fn staged(&self) -> usize {
        self.ops.len()
    }
}
