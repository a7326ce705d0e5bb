//! Draft assembly: live nested DTOs → per-category draft cells.

use tracing::debug;

use crate::models::{DraftSection, FeatureGates, UsageCell, UsageDraft, UsageReport};
use crate::pivot::{flatten, PivotResult};
use crate::schema::Category;

/// Gate decision for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub category: Category,
    pub enabled: bool,
}

/// Gates evaluated for every category, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyPlan {
    pub decisions: Vec<GateDecision>,
}

impl AssemblyPlan {
    pub fn is_enabled(&self, category: Category) -> bool {
        self.decisions
            .iter()
            .any(|decision| decision.category == category && decision.enabled)
    }
}

/// Builds a [`UsageDraft`] for one requisition.
///
/// In-memory only: evaluate gates ([`plan`](Self::plan)), then flatten each
/// enabled category ([`assemble`](Self::assemble)). A disabled gate always
/// yields an empty section, whatever the DTO holds.
pub struct DraftAssembler {
    requisition_id: String,
    facility_id: String,
    gates: FeatureGates,
}

impl DraftAssembler {
    pub fn new(
        requisition_id: impl Into<String>,
        facility_id: impl Into<String>,
        gates: FeatureGates,
    ) -> Self {
        Self {
            requisition_id: requisition_id.into(),
            facility_id: facility_id.into(),
            gates,
        }
    }

    pub fn requisition_id(&self) -> &str {
        &self.requisition_id
    }

    pub fn facility_id(&self) -> &str {
        &self.facility_id
    }

    /// Evaluate every category's gate.
    pub fn plan(&self) -> AssemblyPlan {
        AssemblyPlan {
            decisions: Category::ALL
                .into_iter()
                .map(|category| GateDecision {
                    category,
                    enabled: self.gates.is_enabled(category),
                })
                .collect(),
        }
    }

    /// Assemble a new draft with a fresh id.
    pub fn assemble(&self, report: &UsageReport) -> PivotResult<UsageDraft> {
        let draft = UsageDraft::new(self.requisition_id.clone(), self.facility_id.clone());
        self.assemble_into(draft, report)
    }

    /// Regenerate every section of an existing draft from `report`.
    pub fn assemble_into(&self, mut draft: UsageDraft, report: &UsageReport) -> PivotResult<UsageDraft> {
        let plan = self.plan();
        for decision in &plan.decisions {
            let section = self.assemble_section(*decision, &draft.draft_id, report)?;
            debug!(
                requisition_id = %self.requisition_id,
                draft_id = %draft.draft_id,
                category = %decision.category,
                enabled = decision.enabled,
                cells = section.cells.len(),
                "assembled draft section"
            );
            draft.replace_section(section);
        }
        draft.touch();
        Ok(draft)
    }

    fn assemble_section(
        &self,
        decision: GateDecision,
        draft_id: &str,
        report: &UsageReport,
    ) -> PivotResult<DraftSection> {
        let category = decision.category;
        if !decision.enabled {
            return Ok(DraftSection::disabled(category));
        }

        let cells: Vec<UsageCell> = match report.section_tree(category)? {
            None => Vec::new(),
            Some(tree) => flatten(category, &tree, draft_id)?
                .into_iter()
                .map(|cell| cell.into_draft(draft_id))
                .collect(),
        };
        Ok(DraftSection::enabled(category, cells))
    }
}
