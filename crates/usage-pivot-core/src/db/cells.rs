//! Committed usage cell operations.

use std::collections::{BTreeMap, HashSet};

use rusqlite::{params, Transaction};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{parse_category, parse_key_path, Database, DbError, DbResult};
use crate::models::UsageCell;
use crate::schema::Category;

/// Result of committing a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub requisition_id: String,
    /// Cells now committed for the requisition's enabled categories
    pub cell_count: usize,
    /// Cells that had no committed counterpart
    pub new_cell_count: usize,
}

impl Database {
    /// Commit a stored draft into the requisition's cells.
    ///
    /// Each section replaces the committed cells of its category; a disabled
    /// section clears the category. A cell keeps its `source_id` as committed
    /// id only when that id names a committed cell of the same requisition and
    /// category not already claimed by an earlier cell; any other cell gets a
    /// fresh id. The draft is removed on success.
    pub fn commit_usage_draft(&self, draft_id: &str) -> DbResult<CommitOutcome> {
        let draft = self
            .get_usage_draft(draft_id)?
            .ok_or_else(|| DbError::NotFound(format!("Usage draft {}", draft_id)))?;

        let tx = self.conn.unchecked_transaction()?;
        let mut cell_count = 0;
        let mut new_cell_count = 0;

        for section in draft.sections.values() {
            let mut claimable = committed_ids(&tx, &draft.requisition_id, section.category)?;
            let mut committed = Vec::with_capacity(section.cells.len());
            for cell in dedupe_last_wins(&section.cells) {
                let reused = cell
                    .source_id
                    .as_ref()
                    .and_then(|source_id| claimable.take(source_id));
                let id = match reused {
                    Some(id) => id,
                    None => {
                        new_cell_count += 1;
                        uuid::Uuid::new_v4().to_string()
                    }
                };
                committed.push(UsageCell {
                    id: Some(id),
                    owner_id: draft.requisition_id.clone(),
                    source_id: None,
                    ..cell.clone()
                });
            }
            cell_count += committed.len();
            write_category(&tx, &draft.requisition_id, section.category, &committed)?;
        }

        tx.execute("DELETE FROM usage_drafts WHERE draft_id = ?", [draft_id])?;
        tx.commit()?;

        info!(
            draft_id,
            requisition_id = %draft.requisition_id,
            cell_count,
            new_cell_count,
            "committed usage draft"
        );
        Ok(CommitOutcome {
            requisition_id: draft.requisition_id,
            cell_count,
            new_cell_count,
        })
    }

    /// Replace all committed cells of one category.
    ///
    /// Ids follow the commit rule: a cell keeps its id only if it is an
    /// unclaimed committed id of this requisition and category.
    pub fn replace_committed_cells(
        &self,
        requisition_id: &str,
        category: Category,
        cells: &[UsageCell],
    ) -> DbResult<()> {
        if let Some(cell) = cells.iter().find(|cell| cell.category != category) {
            return Err(DbError::Constraint(format!(
                "Cell belongs to {}, expected {}",
                cell.category, category
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut claimable = committed_ids(&tx, requisition_id, category)?;
        let committed: Vec<UsageCell> = dedupe_last_wins(cells)
            .into_iter()
            .map(|cell| {
                let id = cell
                    .id
                    .as_ref()
                    .and_then(|id| claimable.take(id))
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                UsageCell {
                    id: Some(id),
                    owner_id: requisition_id.to_string(),
                    source_id: None,
                    ..cell.clone()
                }
            })
            .collect();
        write_category(&tx, requisition_id, category, &committed)?;
        tx.commit()?;
        Ok(())
    }

    /// List committed cells of a requisition, by category then position.
    pub fn list_committed_cells(&self, requisition_id: &str) -> DbResult<Vec<UsageCell>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, category, key_path, value
            FROM usage_cells
            WHERE requisition_id = ?
            ORDER BY category, position
            "#,
        )?;
        let rows = stmt.query_map([requisition_id], |row| {
            Ok(CommittedRow {
                id: row.get(0)?,
                category: row.get(1)?,
                key_path: row.get(2)?,
                value: row.get(3)?,
            })
        })?;

        let mut cells = Vec::new();
        for row in rows {
            let row = row?;
            cells.push(UsageCell {
                id: Some(row.id),
                owner_id: requisition_id.to_string(),
                source_id: None,
                category: parse_category(&row.category)?,
                key_path: parse_key_path(&row.key_path)?,
                value: row.value,
            });
        }
        Ok(cells)
    }
}

struct CommittedRow {
    id: String,
    category: String,
    key_path: String,
    value: Option<i64>,
}

/// Keep the last cell of each key path, in first-seen order.
fn dedupe_last_wins(cells: &[UsageCell]) -> Vec<&UsageCell> {
    let mut slots: BTreeMap<&[String], usize> = BTreeMap::new();
    let mut kept: Vec<&UsageCell> = Vec::with_capacity(cells.len());
    for cell in cells {
        match slots.get(cell.key_path.as_slice()) {
            Some(&slot) => kept[slot] = cell,
            None => {
                slots.insert(cell.key_path.as_slice(), kept.len());
                kept.push(cell);
            }
        }
    }
    kept
}

/// Ids currently committed for one requisition and category.
fn committed_ids(
    tx: &Transaction<'_>,
    requisition_id: &str,
    category: Category,
) -> DbResult<HashSet<String>> {
    let mut stmt =
        tx.prepare("SELECT id FROM usage_cells WHERE requisition_id = ?1 AND category = ?2")?;
    let rows = stmt.query_map(params![requisition_id, category.as_str()], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<Result<_, _>>()?)
}

fn write_category(
    tx: &Transaction<'_>,
    requisition_id: &str,
    category: Category,
    cells: &[UsageCell],
) -> DbResult<()> {
    tx.execute(
        "DELETE FROM usage_cells WHERE requisition_id = ?1 AND category = ?2",
        params![requisition_id, category.as_str()],
    )?;
    for (position, cell) in cells.iter().enumerate() {
        let key_path = serde_json::to_string(&cell.key_path)?;
        tx.execute(
            r#"
            INSERT INTO usage_cells (id, requisition_id, category, key_path, value, position)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                cell.id,
                requisition_id,
                category.as_str(),
                key_path,
                cell.value,
                position as i64,
            ],
        )?;
    }
    Ok(())
}
