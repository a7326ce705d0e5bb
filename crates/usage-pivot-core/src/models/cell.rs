//! Flat usage cell.

use serde::{Deserialize, Serialize};

use crate::schema::Category;

/// One reported number in flat form.
///
/// The same shape is used for committed cells (owned by a requisition, `id`
/// assigned) and draft cells (owned by a draft, `source_id` pointing at the
/// committed cell they derive from).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct UsageCell {
    /// Row id - None until the cell is first persisted
    pub id: Option<String>,
    /// Requisition id (committed) or draft id (draft)
    pub owner_id: String,
    /// Committed cell this draft cell derives from
    pub source_id: Option<String>,
    /// Report category
    pub category: Category,
    /// Key path, one component per schema level
    pub key_path: Vec<String>,
    /// Reported value, None for an intentionally blank cell
    pub value: Option<i64>,
}

impl UsageCell {
    /// Create an unpersisted cell.
    pub fn new(
        category: Category,
        owner_id: impl Into<String>,
        key_path: Vec<String>,
        value: Option<i64>,
    ) -> Self {
        Self {
            id: None,
            owner_id: owner_id.into(),
            source_id: None,
            category,
            key_path,
            value,
        }
    }

    /// Set the row id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the source id.
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Key component for a named schema level.
    pub fn key(&self, level_name: &str) -> Option<&str> {
        let index = self.category.schema().level_index(level_name)?;
        self.key_path.get(index).map(String::as_str)
    }

    /// Turn a committed-shape cell into a draft cell owned by `draft_id`.
    ///
    /// The committed id moves to `source_id`; the row id is left for the
    /// store to assign.
    pub fn into_draft(mut self, draft_id: &str) -> Self {
        self.source_id = self.id.take();
        self.owner_id = draft_id.to_string();
        self
    }
}
