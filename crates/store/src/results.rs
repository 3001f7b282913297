//! Live query results and change subscriptions

use crate::codec::RootRecord;
use crate::database::{Database, SubscriptionEntry};
use crate::run_loop::RunLoop;
use notistress_core::{Error, Result, RootEntity};
use std::sync::Arc;

/// Row filter for a root query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `group_id == value`
    GroupId(String),
    /// `id == value`
    Id(String),
}

impl Predicate {
    /// Roots in `group_id`.
    pub fn group(group_id: impl Into<String>) -> Self {
        Predicate::GroupId(group_id.into())
    }

    fn matches(&self, record: &RootRecord) -> bool {
        match self {
            Predicate::GroupId(group) => record.group_id == *group,
            Predicate::Id(id) => record.id == *id,
        }
    }
}

/// A live view of the roots matching an optional predicate.
///
/// Every accessor reads the latest committed state, so counts and indices
/// move as other handles write. Rows are ordered by first insertion, and
/// rows are never removed, so an index that was valid stays valid.
#[derive(Clone)]
pub struct Results {
    db: Arc<Database>,
    predicate: Option<Predicate>,
}

impl Results {
    pub(crate) fn new(db: Arc<Database>, predicate: Option<Predicate>) -> Self {
        Results { db, predicate }
    }

    /// Narrow these results with `predicate`.
    pub fn filter(&self, predicate: Predicate) -> Results {
        Results::new(Arc::clone(&self.db), Some(predicate))
    }

    /// Number of matching roots.
    pub fn count(&self) -> usize {
        let state = self.db.read_state();
        match &self.predicate {
            None => state.root_count(),
            Some(p) => state.roots().filter(|r| p.matches(r)).count(),
        }
    }

    /// Whether no root matches.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// The `index`-th matching root.
    pub fn get(&self, index: usize) -> Option<RootEntity> {
        let state = self.db.read_state();
        let record = match &self.predicate {
            None => state.roots().nth(index),
            Some(p) => state.roots().filter(|r| p.matches(r)).nth(index),
        }?;
        Some(state.materialize(record))
    }

    /// Every matching root, materialized.
    pub fn to_vec(&self) -> Vec<RootEntity> {
        let state = self.db.read_state();
        state
            .roots()
            .filter(|r| self.predicate.as_ref().map_or(true, |p| p.matches(r)))
            .map(|r| state.materialize(r))
            .collect()
    }

    /// Store these results come from.
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Call `on_change` on this thread's run loop after each commit to the store.
    ///
    /// Deliveries are coalesced: commits that land while one delivery is
    /// still queued produce no extra call. No call is made for the state at
    /// subscription time.
    ///
    /// # Errors
    ///
    /// `NoRunLoop` if the calling thread has never created a run loop.
    pub fn subscribe<F>(&self, on_change: F) -> Result<Subscription>
    where
        F: FnMut(&Results) + Send + 'static,
    {
        let run_loop = RunLoop::current_if_exists().ok_or(Error::NoRunLoop)?;
        let entry = self
            .db
            .add_subscription(&run_loop, self.clone(), Box::new(on_change));
        Ok(Subscription {
            db: Arc::clone(&self.db),
            entry,
        })
    }
}

impl std::fmt::Debug for Results {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Results")
            .field("path", &self.db.path())
            .field("predicate", &self.predicate)
            .finish()
    }
}

/// Token for a live registration. Dropping it cancels the registration.
pub struct Subscription {
    db: Arc<Database>,
    entry: Arc<SubscriptionEntry>,
}

impl Subscription {
    /// Stop deliveries. A delivery already queued is discarded. Idempotent.
    pub fn cancel(&self) {
        if !self.entry.is_cancelled() {
            self.entry.cancel();
            self.db.remove_subscription(self.entry.id);
        }
    }

    /// Whether deliveries are still made.
    pub fn is_active(&self) -> bool {
        !self.entry.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.entry.id)
            .field("active", &self.is_active())
            .finish()
    }
}
