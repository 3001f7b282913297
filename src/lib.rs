//! Notistress - concurrency stress harness for a notification-capable object store
//!
//! A run keeps five independently file-backed stores under sustained,
//! randomized write load while control-thread subscriptions and a
//! perpetually restarted worker-thread observer watch them for changes.
//! Sizes and observed counts are published per store.
//!
//! # Quick Start
//!
//! ```ignore
//! use notistress::{ConsoleDisplay, Harness, HarnessConfig};
//! use std::sync::Arc;
//!
//! let mut harness = Harness::new(HarnessConfig::default(), Arc::new(ConsoleDisplay::new()));
//! harness.start()?;
//! harness.run();
//! ```
//!
//! # Architecture
//!
//! - `notistress-core`: entities, store kinds, limits and the error type
//! - `notistress-store`: the file-backed store, subscriptions and run loops
//! - `notistress-harness`: generators, observers and metrics

pub use notistress_core::{
    limits, ChildEntity, EntityKind, Error, Result, RootEntity, StoreKind, Timestamp,
};
pub use notistress_harness::*;
pub use notistress_store::{
    file_size_bytes, Predicate, Results, RunLoop, StoreHandle, Subscription,
};
