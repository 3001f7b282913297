//! In-memory image of one store file
//!
//! Roots are kept in first-insertion order with an id index; upserting an
//! existing id replaces the row in place. Children live in their own table
//! and roots refer to them by id.

use crate::codec::{Operation, RootRecord};
use notistress_core::{ChildEntity, Error, Result, RootEntity};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    roots: Vec<RootRecord>,
    root_index: FxHashMap<String, usize>,
    children: FxHashMap<String, ChildEntity>,
    version: u64,
}

impl StoreState {
    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub(crate) fn roots(&self) -> impl Iterator<Item = &RootRecord> {
        self.roots.iter()
    }

    pub(crate) fn root(&self, id: &str) -> Option<&RootRecord> {
        self.root_index.get(id).map(|&i| &self.roots[i])
    }

    pub(crate) fn child(&self, id: &str) -> Option<&ChildEntity> {
        self.children.get(id)
    }

    /// Resolve a stored root into the public entity with its children.
    pub(crate) fn materialize(&self, record: &RootRecord) -> RootEntity {
        RootEntity {
            id: record.id.clone(),
            title: record.title.clone(),
            timestamp: record.timestamp,
            group_id: record.group_id.clone(),
            children: record
                .child_ids
                .iter()
                .filter_map(|id| self.children.get(id).cloned())
                .collect(),
        }
    }

    /// Check that every reference in `ops` resolves, either against the
    /// current contents or against rows upserted earlier in the same batch.
    pub(crate) fn validate(&self, ops: &[Operation]) -> Result<()> {
        let mut staged_roots: FxHashSet<&str> = FxHashSet::default();
        let mut staged_children: FxHashSet<&str> = FxHashSet::default();

        for op in ops {
            match op {
                Operation::UpsertRoot(record) => {
                    for child_id in &record.child_ids {
                        if !self.children.contains_key(child_id)
                            && !staged_children.contains(child_id.as_str())
                        {
                            return Err(Error::child_not_found(child_id.clone()));
                        }
                    }
                    staged_roots.insert(&record.id);
                }
                Operation::UpsertChild(child) => {
                    staged_children.insert(&child.id);
                }
                Operation::AppendChild { root_id, child_id } => {
                    if !self.root_index.contains_key(root_id)
                        && !staged_roots.contains(root_id.as_str())
                    {
                        return Err(Error::root_not_found(root_id.clone()));
                    }
                    if !self.children.contains_key(child_id)
                        && !staged_children.contains(child_id.as_str())
                    {
                        return Err(Error::child_not_found(child_id.clone()));
                    }
                }
                Operation::Touch { root_id, .. } => {
                    if !self.root_index.contains_key(root_id)
                        && !staged_roots.contains(root_id.as_str())
                    {
                        return Err(Error::root_not_found(root_id.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Apply a batch that has passed [`StoreState::validate`] and stamp the
    /// new version.
    pub(crate) fn apply(&mut self, version: u64, ops: Vec<Operation>) {
        for op in ops {
            match op {
                Operation::UpsertRoot(record) => match self.root_index.get(&record.id) {
                    Some(&i) => self.roots[i] = record,
                    None => {
                        self.root_index.insert(record.id.clone(), self.roots.len());
                        self.roots.push(record);
                    }
                },
                Operation::UpsertChild(child) => {
                    self.children.insert(child.id.clone(), child);
                }
                Operation::AppendChild { root_id, child_id } => {
                    if let Some(&i) = self.root_index.get(&root_id) {
                        self.roots[i].child_ids.push(child_id);
                    }
                }
                Operation::Touch { root_id, timestamp } => {
                    if let Some(&i) = self.root_index.get(&root_id) {
                        self.roots[i].timestamp = timestamp;
                    }
                }
            }
        }
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notistress_core::Timestamp;

    fn root(id: &str, group: &str) -> RootRecord {
        RootRecord {
            id: id.to_string(),
            title: id.to_string(),
            timestamp: Timestamp::EPOCH,
            group_id: group.to_string(),
            child_ids: vec![],
        }
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut state = StoreState::default();
        state.apply(1, vec![
            Operation::UpsertRoot(root("a", "0")),
            Operation::UpsertRoot(root("b", "0")),
        ]);
        let mut replacement = root("a", "3");
        replacement.title = "renamed".to_string();
        state.apply(2, vec![Operation::UpsertRoot(replacement)]);

        let ids: Vec<_> = state.roots().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(state.root("a").unwrap().title, "renamed");
        assert_eq!(state.root("a").unwrap().group_id, "3");
        assert_eq!(state.version(), 2);
    }

    #[test]
    fn test_validate_accepts_child_staged_in_same_batch() {
        let mut state = StoreState::default();
        state.apply(1, vec![Operation::UpsertRoot(root("a", "0"))]);

        let ops = vec![
            Operation::UpsertChild(ChildEntity::new("c", "c", Timestamp::EPOCH)),
            Operation::AppendChild {
                root_id: "a".to_string(),
                child_id: "c".to_string(),
            },
        ];
        state.validate(&ops).unwrap();
        state.apply(2, ops);

        let materialized = state.materialize(state.root("a").unwrap());
        assert_eq!(materialized.children.len(), 1);
        assert_eq!(materialized.children[0].id, "c");
    }

    #[test]
    fn test_validate_rejects_unknown_root() {
        let state = StoreState::default();
        let err = state
            .validate(&[Operation::Touch {
                root_id: "ghost".to_string(),
                timestamp: Timestamp::now(),
            }])
            .unwrap_err();
        assert!(matches!(err, Error::EntityNotFound { .. }));
    }

    #[test]
    fn test_validate_rejects_unknown_child() {
        let mut state = StoreState::default();
        state.apply(1, vec![Operation::UpsertRoot(root("a", "0"))]);
        let err = state
            .validate(&[Operation::AppendChild {
                root_id: "a".to_string(),
                child_id: "missing".to_string(),
            }])
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
