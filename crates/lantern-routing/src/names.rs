//! Name directory
//!
//! Secondary index from node ids to human-readable aliases. Lives next to
//! the routing table but on its own lifecycle: routing churn never evicts a
//! name, so a node that drops out and comes back keeps its label. The
//! directory is capacity-bounded and rejects new inserts when full;
//! updating an existing entry is always allowed.

use std::collections::HashMap;
use tracing::{trace, warn};

use lantern_core::store::clamp_alias;
use lantern_core::NodeId;

use crate::error::{Result, RoutingError};

/// Capacity-bounded alias directory
pub struct NameDirectory {
    entries: HashMap<NodeId, String>,
    capacity: usize,
}

impl NameDirectory {
    /// Create a directory holding at most `capacity` names
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert or update the alias for `id`.
    ///
    /// Aliases longer than the wire maximum are clamped. Fails only when
    /// the directory is full and `id` is not yet present.
    pub fn add_or_update(&mut self, id: NodeId, alias: &str) -> Result<()> {
        let alias = clamp_alias(alias);
        if let Some(existing) = self.entries.get_mut(&id) {
            trace!(node = %format_args!("{:08X}", id), alias, "Alias updated");
            *existing = alias.to_string();
            return Ok(());
        }
        if self.entries.len() >= self.capacity {
            warn!(max = self.capacity, "Name directory full, insert rejected");
            return Err(RoutingError::DirectoryFull { max: self.capacity });
        }
        self.entries.insert(id, alias.to_string());
        Ok(())
    }

    /// Alias for `id`, if one is known
    pub fn lookup_by_id(&self, id: NodeId) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    /// Node id carrying `alias`, if any
    pub fn lookup_by_alias(&self, alias: &str) -> Option<NodeId> {
        self.entries
            .iter()
            .find(|(_, name)| name.as_str() == alias)
            .map(|(id, _)| *id)
    }

    /// Iterate over `(id, alias)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &str)> {
        self.entries.iter().map(|(id, name)| (*id, name.as_str()))
    }

    /// Remove the alias for `id`
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Number of stored aliases
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup_both_ways() {
        let mut names = NameDirectory::new(4);
        names.add_or_update(0x1E2F8C8F, "emy").unwrap();
        assert_eq!(names.lookup_by_id(0x1E2F8C8F), Some("emy"));
        assert_eq!(names.lookup_by_alias("emy"), Some(0x1E2F8C8F));
        assert_eq!(names.lookup_by_alias("nobody"), None);
    }

    #[test]
    fn test_update_in_place() {
        let mut names = NameDirectory::new(1);
        names.add_or_update(0x10, "old").unwrap();
        // Full directory still accepts updates for known ids
        names.add_or_update(0x10, "new").unwrap();
        assert_eq!(names.lookup_by_id(0x10), Some("new"));
    }

    #[test]
    fn test_full_directory_rejects_insert() {
        let mut names = NameDirectory::new(1);
        names.add_or_update(0x10, "one").unwrap();
        assert_eq!(
            names.add_or_update(0x20, "two"),
            Err(RoutingError::DirectoryFull { max: 1 })
        );
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_long_alias_clamped() {
        let mut names = NameDirectory::new(4);
        names
            .add_or_update(0x10, "a-name-that-is-way-too-long")
            .unwrap();
        assert_eq!(names.lookup_by_id(0x10).unwrap().len(), 16);
    }

    #[test]
    fn test_remove() {
        let mut names = NameDirectory::new(4);
        names.add_or_update(0x10, "gone").unwrap();
        assert!(names.remove(0x10));
        assert!(!names.remove(0x10));
        assert!(names.is_empty());
    }
}
