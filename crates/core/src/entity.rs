//! Entity types stored in every store instance
//!
//! Both entity kinds are keyed by a unique string identifier. A `RootEntity`
//! owns an ordered list of `ChildEntity` values; once a child is appended it is
//! never removed or edited by the harness.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A top-level row, grouped by `group_id` for update/append targeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootEntity {
    /// Unique key within one store instance
    pub id: String,
    /// Opaque title
    pub title: String,
    /// Last-touched time
    pub timestamp: Timestamp,
    /// Non-unique join key used by update and append-child mutations
    pub group_id: String,
    /// Children in insertion order
    pub children: Vec<ChildEntity>,
}

impl RootEntity {
    /// Build a root with no children.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        timestamp: Timestamp,
        group_id: impl Into<String>,
    ) -> Self {
        RootEntity {
            id: id.into(),
            title: title.into(),
            timestamp,
            group_id: group_id.into(),
            children: Vec::new(),
        }
    }

    /// Build a fresh root for `queue_index`.
    ///
    /// The identifier is `"{queue_index}-{uuid}"`, the title is the bare uuid
    /// and the group is the queue index itself.
    pub fn fresh(queue_index: usize) -> Self {
        let uuid = new_uuid_string();
        RootEntity::new(
            format!("{}-{}", queue_index, uuid),
            uuid,
            Timestamp::now(),
            queue_index.to_string(),
        )
    }

    /// Whether a child with `child_id` is attached to this root.
    pub fn has_child(&self, child_id: &str) -> bool {
        self.children.iter().any(|c| c.id == child_id)
    }
}

/// A child row appended to exactly one root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEntity {
    /// Unique key within one store instance
    pub id: String,
    /// Opaque title
    pub title: String,
    /// Creation time
    pub timestamp: Timestamp,
}

impl ChildEntity {
    /// Build a child.
    pub fn new(id: impl Into<String>, title: impl Into<String>, timestamp: Timestamp) -> Self {
        ChildEntity {
            id: id.into(),
            title: title.into(),
            timestamp,
        }
    }

    /// Build a fresh child for the target group: `"{group_id}-{uuid}"`.
    pub fn fresh(group_id: &str) -> Self {
        let uuid = new_uuid_string();
        ChildEntity::new(format!("{}-{}", group_id, uuid), uuid, Timestamp::now())
    }
}

fn new_uuid_string() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}
