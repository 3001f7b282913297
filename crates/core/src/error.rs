//! Error types for the store and the harness
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::StoreKind;
use std::io;
use thiserror::Error;

/// Result type alias used across all crates
pub type Result<T> = std::result::Result<T, Error>;

/// Which entity table an id was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// `RootEntity`
    Root,
    /// `ChildEntity`
    Child,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Root => f.write_str("root"),
            EntityKind::Child => f.write_str("child"),
        }
    }
}

/// Error types for the store and the harness
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (directory setup, store file access)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Commit log failed its integrity checks
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// A transaction referenced an entity that does not exist
    #[error("{kind} entity not found: {id}")]
    EntityNotFound {
        /// Table that was searched
        kind: EntityKind,
        /// Missing identifier
        id: String,
    },

    /// Subscribing requires a run loop on the calling thread
    #[error("no run loop on the current thread")]
    NoRunLoop,

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Missing root entity
    pub fn root_not_found(id: impl Into<String>) -> Self {
        Error::EntityNotFound {
            kind: EntityKind::Root,
            id: id.into(),
        }
    }

    /// Missing child entity
    pub fn child_not_found(id: impl Into<String>) -> Self {
        Error::EntityNotFound {
            kind: EntityKind::Child,
            id: id.into(),
        }
    }

    /// Wrap an error with the store it happened on.
    pub fn on_store(self, kind: StoreKind) -> Self {
        match self {
            Error::Io(e) => Error::Io(io::Error::new(e.kind(), format!("{}: {}", kind, e))),
            Error::Corruption(msg) => Error::Corruption(format!("{}: {}", kind, msg)),
            other => other,
        }
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
