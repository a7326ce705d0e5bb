//! Content fingerprint of a draft's cell set.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::{SectionState, UsageDraft};
use crate::schema::Category;

#[derive(Serialize)]
struct CanonicalSection<'a> {
    category: Category,
    state: SectionState,
    cells: Vec<CanonicalCell<'a>>,
}

#[derive(Serialize, PartialEq, Eq, PartialOrd, Ord)]
struct CanonicalCell<'a> {
    key_path: &'a [String],
    value: Option<i64>,
    source_id: Option<&'a str>,
}

/// SHA-256 (hex) over sections, states and cells.
///
/// Row ids, owner ids and timestamps are excluded, so two assemblies of the
/// same inputs hash equal even when saved under different draft ids.
pub fn draft_fingerprint(draft: &UsageDraft) -> Result<String, serde_json::Error> {
    let sections: Vec<CanonicalSection<'_>> = draft
        .sections
        .values()
        .map(|section| {
            let mut cells: Vec<_> = section
                .cells
                .iter()
                .map(|cell| CanonicalCell {
                    key_path: &cell.key_path,
                    value: cell.value,
                    source_id: cell.source_id.as_deref(),
                })
                .collect();
            cells.sort();
            CanonicalSection {
                category: section.category,
                state: section.state,
                cells,
            }
        })
        .collect();

    let payload = serde_json::to_vec(&sections)?;
    Ok(hash_data(&payload))
}

/// Compute SHA-256 hash of data.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
