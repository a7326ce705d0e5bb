//! Usage draft database operations.

use std::collections::BTreeMap;

use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use super::{parse_category, parse_key_path, Database, DbError, DbResult};
use crate::draft::draft_fingerprint;
use crate::models::{DraftSection, SectionState, UsageCell, UsageDraft};
use crate::pivot::find_duplicate_keys;

const DRAFT_COLUMNS: &str = "draft_id, requisition_id, facility_id, created_at, updated_at";

impl Database {
    /// Save a draft, replacing wholesale any draft stored for the same
    /// requisition (last write wins).
    ///
    /// Cells without a row id get a fresh one. Returns the draft fingerprint.
    pub fn save_usage_draft(&self, draft: &mut UsageDraft) -> DbResult<String> {
        for cell in draft.cells_mut() {
            if cell.id.is_none() {
                cell.id = Some(uuid::Uuid::new_v4().to_string());
            }
        }
        let fingerprint = draft_fingerprint(draft)?;

        for section in draft.sections.values() {
            for (category, key_path) in find_duplicate_keys(&section.cells) {
                warn!(
                    requisition_id = %draft.requisition_id,
                    %category,
                    ?key_path,
                    "duplicate key path in draft section; last value wins"
                );
            }
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM usage_drafts WHERE requisition_id = ?1 OR draft_id = ?2",
            params![draft.requisition_id, draft.draft_id],
        )?;
        tx.execute(
            r#"
            INSERT INTO usage_drafts (
                draft_id, requisition_id, facility_id, fingerprint, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                draft.draft_id,
                draft.requisition_id,
                draft.facility_id,
                fingerprint,
                draft.created_at,
                draft.updated_at,
            ],
        )?;

        for section in draft.sections.values() {
            tx.execute(
                "INSERT INTO usage_draft_sections (draft_id, category, state) VALUES (?1, ?2, ?3)",
                params![draft.draft_id, section.category.as_str(), section.state.as_str()],
            )?;
            for (position, cell) in section.cells.iter().enumerate() {
                let key_path = serde_json::to_string(&cell.key_path)?;
                tx.execute(
                    r#"
                    INSERT INTO usage_draft_cells (
                        id, draft_id, category, key_path, value, source_id, position
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        cell.id,
                        draft.draft_id,
                        section.category.as_str(),
                        key_path,
                        cell.value,
                        cell.source_id,
                        position as i64,
                    ],
                )?;
            }
        }
        tx.commit()?;

        info!(
            draft_id = %draft.draft_id,
            requisition_id = %draft.requisition_id,
            cells = draft.cell_count(),
            %fingerprint,
            "saved usage draft"
        );
        Ok(fingerprint)
    }

    /// Get a draft by ID.
    pub fn get_usage_draft(&self, draft_id: &str) -> DbResult<Option<UsageDraft>> {
        self.find_usage_draft("draft_id", draft_id)
    }

    /// Get the draft owned by a requisition.
    pub fn get_usage_draft_for_requisition(&self, requisition_id: &str) -> DbResult<Option<UsageDraft>> {
        self.find_usage_draft("requisition_id", requisition_id)
    }

    /// Stored fingerprint of a requisition's draft.
    pub fn get_usage_draft_fingerprint(&self, requisition_id: &str) -> DbResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT fingerprint FROM usage_drafts WHERE requisition_id = ?",
                [requisition_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// List all drafts of a facility.
    pub fn list_usage_drafts_for_facility(&self, facility_id: &str) -> DbResult<Vec<UsageDraft>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DRAFT_COLUMNS} FROM usage_drafts WHERE facility_id = ? ORDER BY updated_at DESC"
        ))?;
        let rows = stmt.query_map([facility_id], DraftRow::from_row)?;

        let mut drafts = Vec::new();
        for row in rows {
            drafts.push(self.hydrate_usage_draft(row?)?);
        }
        Ok(drafts)
    }

    /// Delete a draft.
    pub fn delete_usage_draft(&self, draft_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM usage_drafts WHERE draft_id = ?", [draft_id])?;
        Ok(rows_affected > 0)
    }

    fn find_usage_draft(&self, column: &str, key: &str) -> DbResult<Option<UsageDraft>> {
        self.conn
            .query_row(
                &format!("SELECT {DRAFT_COLUMNS} FROM usage_drafts WHERE {column} = ?"),
                [key],
                DraftRow::from_row,
            )
            .optional()?
            .map(|row| self.hydrate_usage_draft(row))
            .transpose()
    }

    fn hydrate_usage_draft(&self, row: DraftRow) -> DbResult<UsageDraft> {
        let mut sections = BTreeMap::new();

        let mut stmt = self
            .conn
            .prepare("SELECT category, state FROM usage_draft_sections WHERE draft_id = ?")?;
        let section_rows = stmt.query_map([&row.draft_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?;
        for section_row in section_rows {
            let (category, state) = section_row?;
            let category = parse_category(&category)?;
            let state = SectionState::parse(&state)
                .ok_or_else(|| DbError::Constraint(format!("Unknown section state: {}", state)))?;
            sections.insert(
                category,
                DraftSection {
                    category,
                    state,
                    cells: Vec::new(),
                },
            );
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, category, key_path, value, source_id
            FROM usage_draft_cells
            WHERE draft_id = ?
            ORDER BY category, position
            "#,
        )?;
        let cell_rows = stmt.query_map([&row.draft_id], |r| {
            Ok(CellRow {
                id: r.get(0)?,
                category: r.get(1)?,
                key_path: r.get(2)?,
                value: r.get(3)?,
                source_id: r.get(4)?,
            })
        })?;
        for cell_row in cell_rows {
            let cell_row = cell_row?;
            let category = parse_category(&cell_row.category)?;
            let section = sections.get_mut(&category).ok_or_else(|| {
                DbError::Constraint(format!("Cell for {} has no draft section", category))
            })?;
            section.cells.push(UsageCell {
                id: Some(cell_row.id),
                owner_id: row.draft_id.clone(),
                source_id: cell_row.source_id,
                category,
                key_path: parse_key_path(&cell_row.key_path)?,
                value: cell_row.value,
            });
        }

        Ok(UsageDraft {
            draft_id: row.draft_id,
            requisition_id: row.requisition_id,
            facility_id: row.facility_id,
            sections,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Intermediate row struct for database mapping.
struct DraftRow {
    draft_id: String,
    requisition_id: String,
    facility_id: String,
    created_at: String,
    updated_at: String,
}

impl DraftRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            draft_id: row.get(0)?,
            requisition_id: row.get(1)?,
            facility_id: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

struct CellRow {
    id: String,
    category: String,
    key_path: String,
    value: Option<i64>,
    source_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::DraftAssembler;
    use crate::models::{ColumnGroups, ColumnMap, FeatureGates, UsageReport, UsageValue};
    use crate::schema::Category;

    fn report(value: i64) -> UsageReport {
        UsageReport {
            patient: Some(ColumnGroups::new().with_group(
                "newSection2",
                ColumnMap::from([
                    ("new".into(), Some(UsageValue::new(Some("X".into()), Some(value)))),
                    ("total".into(), Some(UsageValue::new(None, Some(value * 2)))),
                ]),
            )),
            ..Default::default()
        }
    }

    fn assemble(gates: FeatureGates, value: i64) -> UsageDraft {
        DraftAssembler::new("req-1", "fac-1", gates)
            .assemble(&report(value))
            .unwrap()
    }

    #[test]
    fn test_save_and_get_draft() {
        let db = Database::open_in_memory().unwrap();
        let mut draft = assemble(FeatureGates::all_enabled(), 20);
        db.save_usage_draft(&mut draft).unwrap();

        assert!(draft.cells().all(|cell| cell.id.is_some()));

        let retrieved = db.get_usage_draft(&draft.draft_id).unwrap().unwrap();
        assert_eq!(retrieved, draft);
    }

    #[test]
    fn test_get_by_requisition() {
        let db = Database::open_in_memory().unwrap();
        let mut draft = assemble(FeatureGates::all_enabled(), 20);
        db.save_usage_draft(&mut draft).unwrap();

        let retrieved = db.get_usage_draft_for_requisition("req-1").unwrap().unwrap();
        assert_eq!(retrieved.draft_id, draft.draft_id);
        assert!(db.get_usage_draft_for_requisition("req-2").unwrap().is_none());
    }

    #[test]
    fn test_resave_replaces_wholesale() {
        let db = Database::open_in_memory().unwrap();
        let mut first = assemble(FeatureGates::all_enabled(), 20);
        db.save_usage_draft(&mut first).unwrap();

        let mut second = assemble(FeatureGates::all_enabled().with(Category::Patient, false), 5);
        db.save_usage_draft(&mut second).unwrap();

        assert!(db.get_usage_draft(&first.draft_id).unwrap().is_none());
        let current = db.get_usage_draft_for_requisition("req-1").unwrap().unwrap();
        assert_eq!(current.draft_id, second.draft_id);
        assert_eq!(current.cell_count(), 0);

        let cell_rows: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM usage_draft_cells", [], |row| row.get(0))
            .unwrap();
        assert_eq!(cell_rows, 0);
    }

    #[test]
    fn test_disabled_state_survives_storage() {
        let db = Database::open_in_memory().unwrap();
        let mut draft = assemble(FeatureGates::all_enabled().with(Category::KitUsage, false), 1);
        db.save_usage_draft(&mut draft).unwrap();

        let retrieved = db.get_usage_draft(&draft.draft_id).unwrap().unwrap();
        assert_eq!(
            retrieved.section(Category::KitUsage).unwrap().state,
            SectionState::Disabled
        );
        assert_eq!(
            retrieved.section(Category::Regimen).unwrap().state,
            SectionState::Empty
        );
    }

    #[test]
    fn test_fingerprint_stored() {
        let db = Database::open_in_memory().unwrap();
        let mut draft = assemble(FeatureGates::all_enabled(), 20);
        let fingerprint = db.save_usage_draft(&mut draft).unwrap();

        assert_eq!(
            db.get_usage_draft_fingerprint("req-1").unwrap(),
            Some(fingerprint.clone())
        );

        let mut same = assemble(FeatureGates::all_enabled(), 20);
        assert_eq!(db.save_usage_draft(&mut same).unwrap(), fingerprint);
    }

    #[test]
    fn test_list_for_facility() {
        let db = Database::open_in_memory().unwrap();
        let mut draft = assemble(FeatureGates::all_enabled(), 20);
        db.save_usage_draft(&mut draft).unwrap();

        assert_eq!(db.list_usage_drafts_for_facility("fac-1").unwrap().len(), 1);
        assert!(db.list_usage_drafts_for_facility("fac-2").unwrap().is_empty());
    }

    #[test]
    fn test_delete_draft() {
        let db = Database::open_in_memory().unwrap();
        let mut draft = assemble(FeatureGates::all_enabled(), 20);
        db.save_usage_draft(&mut draft).unwrap();

        assert!(db.delete_usage_draft(&draft.draft_id).unwrap());
        assert!(!db.delete_usage_draft(&draft.draft_id).unwrap());
        assert!(db.get_usage_draft(&draft.draft_id).unwrap().is_none());
    }
}
