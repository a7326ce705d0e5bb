//! Value-level comparison of flat cell sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::UsageCell;
use crate::schema::Category;

/// A cell whose value differs between two sets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellChange {
    pub category: Category,
    pub key_path: Vec<String>,
    pub before: Option<i64>,
    pub after: Option<i64>,
}

/// Differences between two cell sets, keyed by (category, key path).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CellDiff {
    pub added: Vec<UsageCell>,
    pub removed: Vec<UsageCell>,
    pub changed: Vec<CellChange>,
}

impl CellDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

type CellKey<'a> = (Category, &'a [String]);

fn index(cells: &[UsageCell]) -> BTreeMap<CellKey<'_>, &UsageCell> {
    cells
        .iter()
        .map(|cell| ((cell.category, cell.key_path.as_slice()), cell))
        .collect()
}

/// Compare two cell sets by value. Ids and owners are ignored.
pub fn diff_cells(before: &[UsageCell], after: &[UsageCell]) -> CellDiff {
    let before_index = index(before);
    let after_index = index(after);
    let mut diff = CellDiff::default();

    for (key, old) in &before_index {
        match after_index.get(key) {
            None => diff.removed.push((*old).clone()),
            Some(new) if new.value != old.value => diff.changed.push(CellChange {
                category: key.0,
                key_path: key.1.to_vec(),
                before: old.value,
                after: new.value,
            }),
            Some(_) => {}
        }
    }

    diff.added = after_index
        .iter()
        .filter(|(key, _)| !before_index.contains_key(*key))
        .map(|(_, cell)| (*cell).clone())
        .collect();

    diff
}

/// Key paths that occur more than once, per category.
pub fn find_duplicate_keys(cells: &[UsageCell]) -> Vec<(Category, Vec<String>)> {
    let mut seen: BTreeMap<CellKey<'_>, usize> = BTreeMap::new();
    for cell in cells {
        *seen
            .entry((cell.category, cell.key_path.as_slice()))
            .or_default() += 1;
    }
    seen.into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((category, path), _)| (category, path.to_vec()))
        .collect()
}
