//! Deprecated-to-current node identifier mapping
//!
//! A `NodeRemapTable` is kept fully collapsed: no current identifier is ever
//! also a deprecated key. That makes a single lookup enough to find where a
//! pointer must go, however many steps were folded into the table.

use std::collections::{HashMap, HashSet};

use crate::error::ConflictError;

/// Mapping from deprecated node identifiers to current node identifiers
#[derive(Debug, Clone, Default)]
pub struct NodeRemapTable {
    /// deprecated -> current
    entries: HashMap<String, String>,
    /// Deprecated keys in insertion order
    order: Vec<String>,
    /// current -> every deprecated key mapped to it
    reverse: HashMap<String, HashSet<String>>,
}

impl NodeRemapTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(deprecated, current)` pairs.
    ///
    /// Pairs with a blank deprecated identifier are skipped.
    pub fn from_pairs<I, D, C>(pairs: I) -> Result<Self, ConflictError>
    where
        I: IntoIterator<Item = (D, C)>,
        D: Into<String>,
        C: Into<String>,
    {
        let mut table = Self::new();
        for (deprecated, current) in pairs {
            let deprecated = deprecated.into();
            if deprecated.trim().is_empty() {
                continue;
            }
            table.add_mapping(deprecated, current)?;
        }
        Ok(table)
    }

    /// Map `deprecated` onto `current`.
    ///
    /// `current` is resolved through the table first, and every existing
    /// entry that pointed at `deprecated` is rewritten to the resolved
    /// target (`A -> B` then `B -> C` yields `A -> C, B -> C`). Fails if the
    /// mapping would lead back to `deprecated`, or if `deprecated` is already
    /// mapped to a different target. Re-adding an identical mapping is a
    /// no-op. The table is left untouched on failure.
    pub fn add_mapping(
        &mut self,
        deprecated: impl Into<String>,
        current: impl Into<String>,
    ) -> Result<(), ConflictError> {
        let deprecated = deprecated.into();
        let current = current.into();
        let target = self.resolve(&current).unwrap_or(current.as_str()).to_string();

        if target == deprecated {
            return Err(ConflictError::Cycle {
                deprecated,
                current,
            });
        }

        if let Some(existing) = self.entries.get(&deprecated) {
            if *existing == target {
                return Ok(());
            }
            return Err(ConflictError::Contradiction {
                deprecated,
                current,
                existing: existing.clone(),
            });
        }

        // Collapse chains that ended at the newly deprecated identifier
        if let Some(predecessors) = self.reverse.remove(&deprecated) {
            for key in &predecessors {
                log::debug!(
                    "Rewriting node mapping '{}' -> '{}' to '{}' -> '{}'",
                    key,
                    deprecated,
                    key,
                    target
                );
                self.entries.insert(key.clone(), target.clone());
            }
            self.reverse
                .entry(target.clone())
                .or_default()
                .extend(predecessors);
        }

        self.reverse
            .entry(target.clone())
            .or_default()
            .insert(deprecated.clone());
        self.order.push(deprecated.clone());
        self.entries.insert(deprecated, target);
        Ok(())
    }

    /// Fold every mapping of `other` into this table, in `other`'s insertion
    /// order.
    ///
    /// Atomic: on conflict this table is left exactly as it was.
    pub fn merge(&mut self, other: &NodeRemapTable) -> Result<(), ConflictError> {
        let mut staged = self.clone();
        for (deprecated, current) in other.iter() {
            staged.add_mapping(deprecated, current)?;
        }
        *self = staged;
        Ok(())
    }

    /// Current identifier for `id`, if it is deprecated
    pub fn resolve(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    /// Whether `id` is a deprecated key
    pub fn contains_deprecated(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Whether `id` is the current value of some mapping
    pub fn contains_current(&self, id: &str) -> bool {
        self.reverse.contains_key(id)
    }

    /// Deprecated identifiers in insertion order
    pub fn deprecated_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Distinct current identifiers, sorted
    pub fn current_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.reverse.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// `(deprecated, current)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key).map(|value| (key.as_str(), value.as_str())))
    }

    /// Number of mappings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no mappings
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_collapsed(table: &NodeRemapTable) {
        for (_, current) in table.iter() {
            assert!(
                !table.contains_deprecated(current),
                "current '{}' is still deprecated",
                current
            );
        }
    }

    #[test]
    fn test_merge_rewrites_existing_chain() {
        let mut table = NodeRemapTable::from_pairs([("A", "first"), ("B", "second")]).unwrap();
        let step = NodeRemapTable::from_pairs([("first", "third")]).unwrap();

        table.merge(&step).unwrap();

        assert_eq!(table.resolve("A"), Some("third"));
        assert_eq!(table.resolve("first"), Some("third"));
        assert_eq!(table.resolve("B"), Some("second"));
        assert!(table.contains_current("third"));
        assert!(!table.contains_current("first"));
        assert_collapsed(&table);
    }

    #[test]
    fn test_chain_resolves_in_any_order() {
        let chain = [("A", "B"), ("B", "C"), ("C", "D")];
        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        for order in orders {
            let mut table = NodeRemapTable::new();
            for index in order {
                let (deprecated, current) = chain[index];
                table.add_mapping(deprecated, current).unwrap();
            }
            for id in ["A", "B", "C"] {
                assert_eq!(table.resolve(id), Some("D"), "order {:?}, id {}", order, id);
            }
            assert_eq!(table.current_ids(), vec!["D"]);
            assert_collapsed(&table);
        }
    }

    #[test]
    fn test_cycle_is_rejected_in_both_orders() {
        let mut forward = NodeRemapTable::new();
        forward.add_mapping("A", "B").unwrap();
        assert!(matches!(
            forward.add_mapping("B", "A"),
            Err(ConflictError::Cycle { .. })
        ));

        let mut backward = NodeRemapTable::new();
        backward.add_mapping("B", "A").unwrap();
        assert!(matches!(
            backward.add_mapping("A", "B"),
            Err(ConflictError::Cycle { .. })
        ));
    }

    #[test]
    fn test_long_cycle_and_self_mapping() {
        let mut table = NodeRemapTable::from_pairs([("A", "B"), ("B", "C")]).unwrap();
        assert!(matches!(
            table.add_mapping("C", "A"),
            Err(ConflictError::Cycle { .. })
        ));
        assert!(matches!(
            NodeRemapTable::new().add_mapping("A", "A"),
            Err(ConflictError::Cycle { .. })
        ));
    }

    #[test]
    fn test_contradiction() {
        let mut table = NodeRemapTable::from_pairs([("A", "first")]).unwrap();

        let err = table.add_mapping("A", "second").unwrap_err();
        assert_eq!(
            err,
            ConflictError::Contradiction {
                deprecated: "A".to_string(),
                current: "second".to_string(),
                existing: "first".to_string(),
            }
        );
        assert_eq!(table.resolve("A"), Some("first"));
    }

    #[test]
    fn test_identical_mapping_is_noop() {
        let mut table = NodeRemapTable::from_pairs([("A", "B"), ("B", "C")]).unwrap();
        table.add_mapping("A", "C").unwrap();
        table.add_mapping("A", "B").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.deprecated_ids().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_failed_merge_leaves_table_untouched() {
        let mut table = NodeRemapTable::from_pairs([("a", "b"), ("x", "y")]).unwrap();
        // consistent on its own, cyclic once merged
        let bad = NodeRemapTable::from_pairs([("b", "c"), ("c", "a")]).unwrap();

        assert!(table.merge(&bad).is_err());
        assert_eq!(table.resolve("a"), Some("b"));
        assert!(!table.contains_deprecated("b"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_aggregated_steps() {
        let mut table = NodeRemapTable::from_pairs([("a", "b"), ("x", "y")]).unwrap();
        table
            .merge(&NodeRemapTable::from_pairs([("b", "c"), ("y", "z")]).unwrap())
            .unwrap();
        table
            .merge(&NodeRemapTable::from_pairs([("c", "d")]).unwrap())
            .unwrap();

        assert_eq!(table.resolve("a"), Some("d"));
        assert_eq!(table.resolve("b"), Some("d"));
        assert_eq!(table.resolve("c"), Some("d"));
        assert_eq!(table.resolve("x"), Some("z"));
        assert_eq!(table.resolve("y"), Some("z"));
        assert!(table
            .merge(&NodeRemapTable::from_pairs([("d", "a")]).unwrap())
            .is_err());
    }

    #[test]
    fn test_from_pairs_skips_blank_keys() {
        let table = NodeRemapTable::from_pairs([("", "first"), ("  ", "second"), ("A", "third")]).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve("A"), Some("third"));
    }

    #[test]
    fn test_lookups() {
        let table = NodeRemapTable::from_pairs([("A", "first")]).unwrap();
        assert!(table.contains_deprecated("A"));
        assert!(!table.contains_deprecated("first"));
        assert!(table.contains_current("first"));
        assert!(!table.contains_current("A"));
        assert_eq!(table.resolve("unmapped"), None);
    }
}
