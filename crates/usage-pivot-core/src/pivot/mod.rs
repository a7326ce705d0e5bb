//! Nested ↔ flat codec for usage-report categories.
//!
//! Pipeline: section DTO → [`UsageTree`] → [`flatten`] → cells, and back via
//! [`unflatten`]. Both directions are driven by the category schema; none of
//! them perform I/O.

mod diff;
mod flatten;
mod tree;
mod unflatten;

pub use diff::*;
pub use flatten::*;
pub use tree::*;
pub use unflatten::*;

use thiserror::Error;

use crate::schema::{Category, CategorySchema, ReferenceKind};

/// Codec errors. All are deterministic data-shape failures.
#[derive(Error, Debug)]
pub enum PivotError {
    #[error("{category}: no {kind:?} reference for id {id}")]
    MissingForeignReference {
        category: Category,
        kind: ReferenceKind,
        id: String,
    },

    #[error("{category}: row is missing its group key")]
    MissingGroupKey { category: Category },

    #[error("{category}: unexpected node shape at level {level}")]
    ShapeMismatch { category: Category, level: usize },

    #[error("{category}: key path has {found} components, expected {expected}")]
    KeyArity {
        category: Category,
        expected: usize,
        found: usize,
    },

    #[error("Cell belongs to {found}, expected {expected}")]
    CategoryMismatch { expected: Category, found: Category },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PivotResult<T> = Result<T, PivotError>;

/// Which id a reconstructed leaf carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafIdentity {
    /// The cell's own row id (committed data)
    Own,
    /// The committed id a draft cell derives from
    Source,
}

/// A category-specific nested DTO.
pub trait UsageSection: Sized {
    /// Convert to the generic tree, applying the schema's missing-group policy.
    fn to_tree(&self, schema: &CategorySchema) -> PivotResult<UsageTree>;

    /// Rebuild from a generic tree.
    fn from_tree(schema: &CategorySchema, tree: &UsageTree) -> PivotResult<Self>;
}
