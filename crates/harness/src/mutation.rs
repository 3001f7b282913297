//! Background write generators
//!
//! One generator runs per `(queue index, store kind)` pair. Each loops
//! forever: sleep a random write delay, then perform exactly one mutation on
//! its store. The sleep is a tokio timer, so waiting generators hold no
//! thread; the mutation itself runs on tokio's blocking pool because store
//! calls take locks and touch the file.
//!
//! Mutation choice is a uniform roll in `0..9`:
//!
//! | Roll | Mutation |
//! |------|----------|
//! | 0..=3 | insert a new root in the queue's own group |
//! | 4 | touch a random root of group `queue - 1` |
//! | 5..=8 | append a child to a random root of group `queue - 2` |
//!
//! Update and append target groups written by other queues, and silently do
//! nothing while those groups are still empty.

use crate::config::{random_delay, HarnessConfig};
use crate::metrics::MetricsPublisher;
use notistress_core::limits::MUTATION_ROLL_RANGE;
use notistress_core::{ChildEntity, Error, Result, RootEntity, StoreKind, Timestamp};
use notistress_store::{Predicate, StoreHandle};
use rand::Rng;
use std::convert::Infallible;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// One of the three mutation shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// New root in the queue's own group
    Insert,
    /// Touch a root of the previous group
    Update,
    /// New child on a root of the group two back
    AppendChild,
}

impl Mutation {
    /// Map a roll in `0..9` to a mutation.
    pub fn from_roll(roll: u32) -> Mutation {
        match roll {
            0..=3 => Mutation::Insert,
            4 => Mutation::Update,
            _ => Mutation::AppendChild,
        }
    }

    /// Draw a mutation with the fixed 4:1:4 weighting.
    pub fn random() -> Mutation {
        Mutation::from_roll(rand::thread_rng().gen_range(0..MUTATION_ROLL_RANGE))
    }
}

/// What a single mutation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// A root with this id was upserted
    Inserted(String),
    /// This root's timestamp was set to now
    Updated(String),
    /// A child was created and appended to a root
    ChildAppended {
        /// Root the child was appended to
        root_id: String,
        /// New child
        child_id: String,
    },
    /// The target group had no roots; nothing was written
    Skipped,
}

/// Group targeted by a queue, `offset` groups back, wrapping at `queue_count`.
///
/// `target_group(0, 1, 16)` is `15`; `target_group(16, 2, 16)` is `14`.
pub fn target_group(queue_index: usize, offset: usize, queue_count: usize) -> usize {
    debug_assert!(queue_count > 0);
    (queue_index + queue_count - offset % queue_count) % queue_count
}

/// Perpetual write loop for one queue on one store.
pub struct MutationGenerator {
    queue_index: usize,
    kind: StoreKind,
    queue_count: usize,
    store_path: PathBuf,
    read_store_path: PathBuf,
    write_delay: Range<Duration>,
    publisher: MetricsPublisher,
}

impl MutationGenerator {
    /// Generator for `queue_index` writing to `kind`.
    pub fn new(
        queue_index: usize,
        kind: StoreKind,
        config: &HarnessConfig,
        publisher: MetricsPublisher,
    ) -> Self {
        MutationGenerator {
            queue_index,
            kind,
            queue_count: config.queue_count.max(1),
            store_path: config.store_path(kind),
            read_store_path: config.store_path(StoreKind::Read),
            write_delay: config.write_delay.clone(),
            publisher,
        }
    }

    /// Queue this generator writes for.
    pub fn queue_index(&self) -> usize {
        self.queue_index
    }

    /// Store this generator writes to.
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Loop forever: delay, mutate, repeat.
    ///
    /// Only returns on a store failure; the caller treats that as fatal.
    pub async fn run(self) -> Result<Infallible> {
        let generator = Arc::new(self);
        loop {
            let delay = random_delay(&generator.write_delay);
            tokio::time::sleep(delay).await;

            let worker = Arc::clone(&generator);
            tokio::task::spawn_blocking(move || worker.run_cycle())
                .await
                .map_err(|e| Error::InvalidOperation(format!("mutation task failed: {}", e)))??;
        }
    }

    /// One scheduling cycle: count the read store if this is a read
    /// generator, perform a random mutation, and publish the file size if
    /// this is a write-only generator.
    pub fn run_cycle(&self) -> Result<MutationOutcome> {
        let mutation = Mutation::random();
        if self.kind == StoreKind::Read {
            self.fetch_read_count()?;
        }

        let outcome = self.perform(mutation)?;
        trace!(queue = self.queue_index, store = %self.kind, ?outcome, "Mutation done");

        if self.kind == StoreKind::WriteOnly {
            self.publisher.publish_size(StoreKind::WriteOnly);
        }
        Ok(outcome)
    }

    /// Perform `mutation` against this generator's store on a fresh handle.
    pub fn perform(&self, mutation: Mutation) -> Result<MutationOutcome> {
        let mut handle = StoreHandle::open(&self.store_path).map_err(|e| e.on_store(self.kind))?;
        let outcome = match mutation {
            Mutation::Insert => self.insert(&mut handle),
            Mutation::Update => self.update(&mut handle),
            Mutation::AppendChild => self.append_child(&mut handle),
        };
        outcome.map_err(|e| e.on_store(self.kind))
    }

    fn insert(&self, handle: &mut StoreHandle) -> Result<MutationOutcome> {
        handle.write(|txn| {
            self.fetch_in_transaction()?;
            let root = RootEntity::fresh(self.queue_index);
            let id = root.id.clone();
            txn.upsert_root(root);
            Ok(MutationOutcome::Inserted(id))
        })
    }

    fn update(&self, handle: &mut StoreHandle) -> Result<MutationOutcome> {
        let group = target_group(self.queue_index, 1, self.queue_count).to_string();
        let Some(target) = pick_random(handle, &group) else {
            return Ok(MutationOutcome::Skipped);
        };

        handle.write(|txn| {
            self.fetch_in_transaction()?;
            txn.touch(target.id.clone(), Timestamp::now());
            Ok(MutationOutcome::Updated(target.id))
        })
    }

    fn append_child(&self, handle: &mut StoreHandle) -> Result<MutationOutcome> {
        let group = target_group(self.queue_index, 2, self.queue_count).to_string();
        let Some(target) = pick_random(handle, &group) else {
            return Ok(MutationOutcome::Skipped);
        };

        handle.write(|txn| {
            self.fetch_in_transaction()?;
            let child = ChildEntity::fresh(&group);
            let child_id = child.id.clone();
            txn.upsert_child(child);
            txn.append_child(target.id.clone(), child_id.clone());
            Ok(MutationOutcome::ChildAppended {
                root_id: target.id,
                child_id,
            })
        })
    }

    /// Read generators count again from inside their write transaction.
    fn fetch_in_transaction(&self) -> Result<()> {
        if self.kind == StoreKind::Read {
            self.fetch_read_count()?;
        }
        Ok(())
    }

    /// Count the read store on a fresh handle and publish it.
    fn fetch_read_count(&self) -> Result<()> {
        let handle =
            StoreHandle::open(&self.read_store_path).map_err(|e| e.on_store(StoreKind::Read))?;
        let count = handle.objects().count();
        self.publisher.publish_count(StoreKind::Read, count);
        Ok(())
    }
}

/// A uniformly chosen root of `group`, or `None` if the group is empty.
fn pick_random(handle: &StoreHandle, group: &str) -> Option<RootEntity> {
    let candidates = handle.filter(Predicate::group(group));
    let count = candidates.count();
    if count == 0 {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..count);
    candidates.get(index)
}
