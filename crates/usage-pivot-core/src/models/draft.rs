//! Usage draft models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::cell::UsageCell;
use crate::schema::Category;

/// Gate outcome recorded for one category of a draft.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    /// Gate disabled, no data collected
    Disabled,
    /// Gate enabled, nothing reported yet
    Empty,
    /// Gate enabled, at least one cell
    Populated,
}

impl SectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionState::Disabled => "disabled",
            SectionState::Empty => "empty",
            SectionState::Populated => "populated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "disabled" => Some(SectionState::Disabled),
            "empty" => Some(SectionState::Empty),
            "populated" => Some(SectionState::Populated),
            _ => None,
        }
    }
}

/// Cells of one category within a draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftSection {
    pub category: Category,
    pub state: SectionState,
    pub cells: Vec<UsageCell>,
}

impl DraftSection {
    /// Section for a disabled category.
    pub fn disabled(category: Category) -> Self {
        Self {
            category,
            state: SectionState::Disabled,
            cells: Vec::new(),
        }
    }

    /// Section for an enabled category; state follows the cell count.
    pub fn enabled(category: Category, cells: Vec<UsageCell>) -> Self {
        let state = if cells.is_empty() {
            SectionState::Empty
        } else {
            SectionState::Populated
        };
        Self {
            category,
            state,
            cells,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state != SectionState::Disabled
    }
}

/// An editable, uncommitted usage report for one requisition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageDraft {
    /// Unique draft ID
    pub draft_id: String,
    /// Owning requisition
    pub requisition_id: String,
    /// Facility the requisition belongs to
    pub facility_id: String,
    /// One section per category
    pub sections: BTreeMap<Category, DraftSection>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl UsageDraft {
    /// Create an empty draft with a fresh id.
    pub fn new(requisition_id: String, facility_id: String) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), requisition_id, facility_id)
    }

    /// Create an empty draft reusing an existing id.
    pub fn with_id(draft_id: String, requisition_id: String, facility_id: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            draft_id,
            requisition_id,
            facility_id,
            sections: BTreeMap::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn section(&self, category: Category) -> Option<&DraftSection> {
        self.sections.get(&category)
    }

    /// Replace a category's section wholesale.
    pub fn replace_section(&mut self, section: DraftSection) {
        self.sections.insert(section.category, section);
    }

    /// All cells across sections, in category order.
    pub fn cells(&self) -> impl Iterator<Item = &UsageCell> {
        self.sections.values().flat_map(|section| section.cells.iter())
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut UsageCell> {
        self.sections
            .values_mut()
            .flat_map(|section| section.cells.iter_mut())
    }

    pub fn cell_count(&self) -> usize {
        self.sections.values().map(|section| section.cells.len()).sum()
    }

    /// Categories whose gate was enabled when the draft was assembled.
    pub fn enabled_categories(&self) -> Vec<Category> {
        self.sections
            .values()
            .filter(|section| section.is_enabled())
            .map(|section| section.category)
            .collect()
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(category: Category) -> UsageCell {
        UsageCell::new(category, "draft-1", vec!["a".into(), "b".into()], Some(1))
    }

    #[test]
    fn test_new_draft() {
        let draft = UsageDraft::new("req-1".into(), "fac-1".into());
        assert_eq!(draft.draft_id.len(), 36);
        assert_eq!(draft.cell_count(), 0);
        assert!(draft.sections.is_empty());
    }

    #[test]
    fn test_section_state_follows_cells() {
        assert_eq!(
            DraftSection::enabled(Category::Patient, vec![]).state,
            SectionState::Empty
        );
        assert_eq!(
            DraftSection::enabled(Category::Patient, vec![cell(Category::Patient)]).state,
            SectionState::Populated
        );
        assert!(!DraftSection::disabled(Category::Patient).is_enabled());
    }

    #[test]
    fn test_replace_section_is_wholesale() {
        let mut draft = UsageDraft::new("req-1".into(), "fac-1".into());
        draft.replace_section(DraftSection::enabled(
            Category::KitUsage,
            vec![cell(Category::KitUsage), cell(Category::KitUsage)],
        ));
        draft.replace_section(DraftSection::enabled(
            Category::KitUsage,
            vec![cell(Category::KitUsage)],
        ));
        assert_eq!(draft.cell_count(), 1);
    }

    #[test]
    fn test_enabled_categories() {
        let mut draft = UsageDraft::new("req-1".into(), "fac-1".into());
        draft.replace_section(DraftSection::disabled(Category::KitUsage));
        draft.replace_section(DraftSection::enabled(Category::Patient, vec![]));
        assert_eq!(draft.enabled_categories(), vec![Category::Patient]);
    }

    #[test]
    fn test_state_names_parse_back() {
        for state in [SectionState::Disabled, SectionState::Empty, SectionState::Populated] {
            assert_eq!(SectionState::parse(state.as_str()), Some(state));
        }
        assert_eq!(SectionState::parse("unknown"), None);
    }
}
