//! Draft loading: persisted cells → nested DTOs.

use tracing::debug;

use crate::models::{DraftSection, LookupTables, UsageCell, UsageDraft, UsageReport};
use crate::pivot::{unflatten, LeafIdentity, PivotResult};
use crate::schema::Category;

/// Rebuilds nested DTOs from flat cells using caller-resolved lookups.
pub struct DraftLoader<'a> {
    lookups: &'a LookupTables,
}

impl<'a> DraftLoader<'a> {
    pub fn new(lookups: &'a LookupTables) -> Self {
        Self { lookups }
    }

    /// Rebuild every enabled section of a draft.
    ///
    /// Leaves carry each cell's `source_id`, so the result refers to the
    /// original committed cells. Disabled or missing sections load as
    /// `None`; enabled sections with no cells load as empty DTOs.
    pub fn load(&self, draft: &UsageDraft) -> PivotResult<UsageReport> {
        let mut report = UsageReport::default();
        for category in Category::ALL {
            let Some(section) = draft.section(category).filter(|s| s.is_enabled()) else {
                continue;
            };
            self.load_section(section, &mut report)?;
        }
        debug!(
            draft_id = %draft.draft_id,
            requisition_id = %draft.requisition_id,
            cells = draft.cell_count(),
            "loaded usage draft"
        );
        Ok(report)
    }

    fn load_section(&self, section: &DraftSection, report: &mut UsageReport) -> PivotResult<()> {
        let tree = unflatten(
            section.category,
            &section.cells,
            self.lookups,
            LeafIdentity::Source,
        )?;
        report.set_section_tree(section.category, Some(&tree))
    }

    /// Rebuild committed cells of one requisition.
    ///
    /// Leaves carry each cell's own id. Categories without cells load as
    /// `None`.
    pub fn load_committed(&self, cells: &[UsageCell]) -> PivotResult<UsageReport> {
        let mut report = UsageReport::default();
        for category in Category::ALL {
            let category_cells: Vec<UsageCell> = cells
                .iter()
                .filter(|cell| cell.category == category)
                .cloned()
                .collect();
            if category_cells.is_empty() {
                continue;
            }
            let tree = unflatten(category, &category_cells, self.lookups, LeafIdentity::Own)?;
            report.set_section_tree(category, Some(&tree))?;
        }
        Ok(report)
    }
}
