//! Core types for the notification stress harness
//!
//! This crate defines the foundational types shared by the store and the harness:
//! - RootEntity / ChildEntity: the entity schema every store instance holds
//! - StoreKind: the closed set of five store configurations and their file paths
//! - Timestamp: microsecond wall-clock time
//! - Error: error type hierarchy
//! - limits: the fixed parameters of a run

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entity;
pub mod error;
pub mod limits;
pub mod store_kind;
pub mod timestamp;

pub use entity::{ChildEntity, RootEntity};
pub use error::{EntityKind, Error, Result};
pub use store_kind::StoreKind;
pub use timestamp::Timestamp;
