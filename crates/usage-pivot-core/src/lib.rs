//! Usage Pivot Core Library
//!
//! Converts requisition usage reports between their nested, category-specific
//! shapes and a flat list of keyed cells, and stages edits as drafts.
//!
//! # Architecture
//!
//! ```text
//!   Nested section DTO (JSON)
//!            │
//!            ▼
//!       UsageTree ──── flatten ────▶ Vec<UsageCell>
//!            ▲                            │
//!            └──── unflatten ◀── lookups ─┤
//!                                         │
//!   UsageReport + FeatureGates            │
//!            │                            │
//!            ▼                            │
//!     DraftAssembler ─▶ UsageDraft ─▶ [STAGING: usage_drafts]
//!                                         │
//!                                   commit_usage_draft
//!                                         │
//!                                         ▼
//!                                [COMMITTED: usage_cells]
//!                                         │
//!                                    DraftLoader
//!                                         │
//!                                         ▼
//!                                  UsageReport (JSON)
//! ```
//!
//! # Core Principle
//!
//! **A disabled category never yields cells.** The gate wins over whatever
//! data the report carries.
//!
//! # Modules
//!
//! - [`schema`]: Static per-category key-path descriptors
//! - [`models`]: Cells, drafts, gates, lookup tables and nested DTOs
//! - [`pivot`]: Flatten/unflatten engines and cell diffing
//! - [`draft`]: Draft assembly, loading and fingerprinting
//! - [`db`]: SQLite staging and commit store
//! - [`config`]: Startup configuration

pub mod config;
pub mod db;
pub mod draft;
pub mod models;
pub mod pivot;
pub mod schema;

// Re-export commonly used types
pub use config::{ConfigError, CoreConfig, DatabaseLocation};
pub use db::{CommitOutcome, Database};
pub use draft::{draft_fingerprint, DraftAssembler, DraftLoader};
pub use models::{
    DraftSection, FeatureGates, LookupTables, ReferenceSummary, SectionState, UsageCell,
    UsageDraft, UsageReport,
};
pub use pivot::{flatten, unflatten, LeafIdentity, PivotError, UsageNode, UsageTree};
pub use schema::{Category, CategorySchema, ReferenceKind};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum UsagePivotError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Integrity error: {0}")]
    IntegrityError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for UsagePivotError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => UsagePivotError::NotFound(what),
            other => UsagePivotError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for UsagePivotError {
    fn from(e: serde_json::Error) -> Self {
        UsagePivotError::SerializationError(e.to_string())
    }
}

impl From<PivotError> for UsagePivotError {
    fn from(e: PivotError) -> Self {
        match e {
            PivotError::MissingForeignReference { .. } => {
                UsagePivotError::IntegrityError(e.to_string())
            }
            PivotError::Json(e) => e.into(),
            other => UsagePivotError::InvalidInput(other.to_string()),
        }
    }
}

impl From<ConfigError> for UsagePivotError {
    fn from(e: ConfigError) -> Self {
        UsagePivotError::ConfigError(e.to_string())
    }
}

impl From<schema::UnknownCategory> for UsagePivotError {
    fn from(e: schema::UnknownCategory) -> Self {
        UsagePivotError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for UsagePivotError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        UsagePivotError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a usage store at the given path.
#[uniffi::export]
pub fn open_usage_store(path: String) -> Result<Arc<UsagePivotCore>, UsagePivotError> {
    UsagePivotCore::from_config(&CoreConfig::new(path.into()))
}

/// Create an in-memory usage store (for testing).
#[uniffi::export]
pub fn open_usage_store_in_memory() -> Result<Arc<UsagePivotCore>, UsagePivotError> {
    UsagePivotCore::from_config(&CoreConfig::in_memory())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe store wrapper for FFI.
#[derive(uniffi::Object)]
pub struct UsagePivotCore {
    db: Arc<Mutex<Database>>,
}

impl UsagePivotCore {
    /// Open the store described by `config`.
    pub fn from_config(config: &CoreConfig) -> Result<Arc<Self>, UsagePivotError> {
        let db = config.open_database()?;
        Ok(Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
        }))
    }
}

#[uniffi::export]
impl UsagePivotCore {
    // =========================================================================
    // Codec Operations
    // =========================================================================

    /// Flatten one category's nested JSON into cells owned by `owner_id`.
    pub fn flatten_section_json(
        &self,
        category: String,
        section_json: String,
        owner_id: String,
    ) -> Result<Vec<FfiUsageCell>, UsagePivotError> {
        let category: Category = category.parse()?;
        let tree = models::section_tree_from_json(category, &section_json)?;
        let cells = flatten(category, &tree, &owner_id)?;
        Ok(cells.into_iter().map(FfiUsageCell::from).collect())
    }

    /// Rebuild one category's nested JSON from committed cells.
    pub fn unflatten_section_json(
        &self,
        category: String,
        cells: Vec<FfiUsageCell>,
        lookups_json: String,
    ) -> Result<String, UsagePivotError> {
        let category: Category = category.parse()?;
        let lookups: LookupTables = serde_json::from_str(&lookups_json)?;
        let cells = cells
            .into_iter()
            .map(UsageCell::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let tree = unflatten(category, &cells, &lookups, LeafIdentity::Own)?;
        Ok(models::section_json_from_tree(category, &tree)?)
    }

    // =========================================================================
    // Draft Operations
    // =========================================================================

    /// Assemble a draft from a nested report and save it, replacing any
    /// draft the requisition already has. A requisition's draft cannot move
    /// to another facility.
    pub fn save_draft_json(
        &self,
        requisition_id: String,
        facility_id: String,
        gates_json: String,
        report_json: String,
    ) -> Result<FfiDraftSummary, UsagePivotError> {
        let gates: FeatureGates = serde_json::from_str(&gates_json)?;
        let report: UsageReport = serde_json::from_str(&report_json)?;

        let db = self.db.lock()?;
        let base = match db.get_usage_draft_for_requisition(&requisition_id)? {
            Some(existing) if existing.facility_id != facility_id => {
                return Err(UsagePivotError::InvalidInput(format!(
                    "Requisition {} has a draft for facility {}, not {}",
                    requisition_id, existing.facility_id, facility_id
                )));
            }
            Some(existing) => UsageDraft {
                sections: Default::default(),
                ..existing
            },
            None => UsageDraft::new(requisition_id.clone(), facility_id.clone()),
        };
        let assembler = DraftAssembler::new(requisition_id, facility_id, gates);
        let mut draft = assembler.assemble_into(base, &report)?;
        let fingerprint = db.save_usage_draft(&mut draft)?;
        Ok(FfiDraftSummary::new(&draft, fingerprint))
    }

    /// Load a requisition's draft as nested report JSON.
    pub fn load_draft_json(
        &self,
        requisition_id: String,
        lookups_json: String,
    ) -> Result<Option<String>, UsagePivotError> {
        let lookups: LookupTables = serde_json::from_str(&lookups_json)?;
        let db = self.db.lock()?;
        let Some(draft) = db.get_usage_draft_for_requisition(&requisition_id)? else {
            return Ok(None);
        };
        let report = DraftLoader::new(&lookups).load(&draft)?;
        Ok(Some(serde_json::to_string(&report)?))
    }

    /// Commit a draft into the requisition's cells.
    pub fn commit_draft(&self, draft_id: String) -> Result<FfiCommitOutcome, UsagePivotError> {
        let db = self.db.lock()?;
        let outcome = db.commit_usage_draft(&draft_id)?;
        Ok(outcome.into())
    }

    /// Discard a draft. Returns false if it did not exist.
    pub fn discard_draft(&self, draft_id: String) -> Result<bool, UsagePivotError> {
        let db = self.db.lock()?;
        Ok(db.delete_usage_draft(&draft_id)?)
    }

    /// Fingerprint of a requisition's stored draft.
    pub fn draft_fingerprint(&self, requisition_id: String) -> Result<Option<String>, UsagePivotError> {
        let db = self.db.lock()?;
        Ok(db.get_usage_draft_fingerprint(&requisition_id)?)
    }

    // =========================================================================
    // Committed Data
    // =========================================================================

    /// Load a requisition's committed cells as nested report JSON.
    pub fn load_committed_json(
        &self,
        requisition_id: String,
        lookups_json: String,
    ) -> Result<String, UsagePivotError> {
        let lookups: LookupTables = serde_json::from_str(&lookups_json)?;
        let db = self.db.lock()?;
        let cells = db.list_committed_cells(&requisition_id)?;
        let report = DraftLoader::new(&lookups).load_committed(&cells)?;
        Ok(serde_json::to_string(&report)?)
    }

    /// List a requisition's committed cells.
    pub fn list_committed_cells(
        &self,
        requisition_id: String,
    ) -> Result<Vec<FfiUsageCell>, UsagePivotError> {
        let db = self.db.lock()?;
        let cells = db.list_committed_cells(&requisition_id)?;
        Ok(cells.into_iter().map(FfiUsageCell::from).collect())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe usage cell.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUsageCell {
    pub id: Option<String>,
    pub owner_id: String,
    pub source_id: Option<String>,
    pub category: String,
    pub key_path: Vec<String>,
    pub value: Option<i64>,
}

impl From<UsageCell> for FfiUsageCell {
    fn from(cell: UsageCell) -> Self {
        Self {
            id: cell.id,
            owner_id: cell.owner_id,
            source_id: cell.source_id,
            category: cell.category.as_str().to_string(),
            key_path: cell.key_path,
            value: cell.value,
        }
    }
}

impl TryFrom<FfiUsageCell> for UsageCell {
    type Error = UsagePivotError;

    fn try_from(cell: FfiUsageCell) -> Result<Self, Self::Error> {
        Ok(UsageCell {
            id: cell.id,
            owner_id: cell.owner_id,
            source_id: cell.source_id,
            category: cell.category.parse()?,
            key_path: cell.key_path,
            value: cell.value,
        })
    }
}

/// FFI-safe summary of a saved draft.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDraftSummary {
    pub draft_id: String,
    pub requisition_id: String,
    pub fingerprint: String,
    pub cell_count: u32,
    pub enabled_categories: Vec<String>,
}

impl FfiDraftSummary {
    fn new(draft: &UsageDraft, fingerprint: String) -> Self {
        Self {
            draft_id: draft.draft_id.clone(),
            requisition_id: draft.requisition_id.clone(),
            fingerprint,
            cell_count: draft.cell_count() as u32,
            enabled_categories: draft
                .enabled_categories()
                .into_iter()
                .map(|c| c.as_str().to_string())
                .collect(),
        }
    }
}

/// FFI-safe commit result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCommitOutcome {
    pub requisition_id: String,
    pub cell_count: u32,
    pub new_cell_count: u32,
}

impl From<CommitOutcome> for FfiCommitOutcome {
    fn from(outcome: CommitOutcome) -> Self {
        Self {
            requisition_id: outcome.requisition_id,
            cell_count: outcome.cell_count as u32,
            new_cell_count: outcome.new_cell_count as u32,
        }
    }
}
