//! The five store configurations under test
//!
//! Every instance shares the entity schema and receives identical write
//! pressure. They differ only in which notification topology is attached:
//!
//! | Kind | Observers |
//! |------|-----------|
//! | `WriteOnly` | none, size published after each write |
//! | `Read` | full count taken by the writers themselves |
//! | `Listener` | one control-thread subscription |
//! | `TwoListeners` | two control-thread subscriptions |
//! | `ThreadListener` | one subscription on the cycling worker thread |

use crate::limits::STORE_FILE_EXTENSION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Logical name of one independently file-backed store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StoreKind {
    /// Written to, never observed
    WriteOnly,
    /// Counted by writers before each mutation
    Read,
    /// One subscription
    Listener,
    /// Two independent subscriptions
    TwoListeners,
    /// Subscription owned by the dedicated worker thread
    ThreadListener,
}

impl StoreKind {
    /// All kinds, in display order.
    pub const ALL: [StoreKind; 5] = [
        StoreKind::WriteOnly,
        StoreKind::Read,
        StoreKind::Listener,
        StoreKind::TwoListeners,
        StoreKind::ThreadListener,
    ];

    /// Stable logical name, also the file stem.
    pub const fn name(self) -> &'static str {
        match self {
            StoreKind::WriteOnly => "writeOnly",
            StoreKind::Read => "read",
            StoreKind::Listener => "listener",
            StoreKind::TwoListeners => "twoListeners",
            StoreKind::ThreadListener => "threadListener",
        }
    }

    /// Human label used by the display slots.
    pub const fn label(self) -> &'static str {
        match self {
            StoreKind::WriteOnly => "write only",
            StoreKind::Read => "read",
            StoreKind::Listener => "listener",
            StoreKind::TwoListeners => "two listeners",
            StoreKind::ThreadListener => "thread listener",
        }
    }

    /// Position in [`StoreKind::ALL`].
    pub const fn index(self) -> usize {
        match self {
            StoreKind::WriteOnly => 0,
            StoreKind::Read => 1,
            StoreKind::Listener => 2,
            StoreKind::TwoListeners => 3,
            StoreKind::ThreadListener => 4,
        }
    }

    /// Whether the display slot for this kind shows an observed count.
    ///
    /// `WriteOnly` is never queried, so only its size is tracked.
    pub const fn tracks_count(self) -> bool {
        !matches!(self, StoreKind::WriteOnly)
    }

    /// File backing this instance under `dir`: `{dir}/{name}.store`.
    pub fn file_path(self, dir: &Path) -> PathBuf {
        dir.join(self.name()).with_extension(STORE_FILE_EXTENSION)
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
