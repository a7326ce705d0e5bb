//! Foreign-key lookup tables supplied by the caller for unflatten.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::schema::ReferenceKind;

/// Summary of a referenced entity (regimen, orderable).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceSummary {
    /// Foreign id as it appears in key paths
    pub id: String,
    /// Code (regimen code, product code)
    pub code: String,
    /// Display name
    pub name: String,
}

impl ReferenceSummary {
    pub fn new(id: impl Into<String>, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Resolved reference data, one table per reference kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LookupTables {
    #[serde(default)]
    pub regimens: HashMap<String, ReferenceSummary>,
    #[serde(default)]
    pub orderables: HashMap<String, ReferenceSummary>,
}

impl LookupTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a summary under its own id.
    pub fn insert(&mut self, kind: ReferenceKind, summary: ReferenceSummary) {
        self.table_mut(kind).insert(summary.id.clone(), summary);
    }

    /// Builder form of [`insert`](Self::insert) for regimens.
    pub fn with_regimen(mut self, summary: ReferenceSummary) -> Self {
        self.insert(ReferenceKind::Regimen, summary);
        self
    }

    /// Builder form of [`insert`](Self::insert) for orderables.
    pub fn with_orderable(mut self, summary: ReferenceSummary) -> Self {
        self.insert(ReferenceKind::Orderable, summary);
        self
    }

    /// Look up a foreign id.
    pub fn resolve(&self, kind: ReferenceKind, id: &str) -> Option<&ReferenceSummary> {
        self.table(kind).get(id)
    }

    pub fn table(&self, kind: ReferenceKind) -> &HashMap<String, ReferenceSummary> {
        match kind {
            ReferenceKind::Regimen => &self.regimens,
            ReferenceKind::Orderable => &self.orderables,
        }
    }

    fn table_mut(&mut self, kind: ReferenceKind) -> &mut HashMap<String, ReferenceSummary> {
        match kind {
            ReferenceKind::Regimen => &mut self.regimens,
            ReferenceKind::Orderable => &mut self.orderables,
        }
    }
}
