//! File-backed object store with change notifications
//!
//! This crate is the store collaborator the stress harness drives:
//! - Database: one shared instance per file, commit log replayed on open
//! - StoreHandle / WriteTransaction: atomic, serialized write transactions
//! - Results / Predicate: live, predicate-filtered root queries
//! - Subscription: change notifications delivered on the subscriber's run loop
//! - RunLoop: the per-thread cooperative loop notifications are delivered on
//! - codec: the `[length][type][payload][crc32]` commit frame format

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod database;
pub mod handle;
pub mod registry;
pub mod results;
pub mod run_loop;
mod state;

pub use database::{evict, Database};
pub use handle::{StoreHandle, WriteTransaction};
pub use registry::open_store_count;
pub use results::{Predicate, Results, Subscription};
pub use run_loop::{RunLoop, RunOutcome, WeakRunLoop};

use notistress_core::Result;
use std::io::ErrorKind;
use std::path::Path;

/// Size in bytes of the file at `path`; `0` if it does not exist.
pub fn file_size_bytes(path: impl AsRef<Path>) -> Result<u64> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}
