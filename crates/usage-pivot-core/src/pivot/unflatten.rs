//! Flat → nested.

use crate::models::{LookupTables, ReferenceSummary, UsageCell, UsageValue};
use crate::schema::{Category, CategorySchema, LevelKind};

use super::{LeafIdentity, PivotError, PivotResult, UsageTree};

/// Rebuild a category tree from its cells.
///
/// Every foreign-id component must resolve in `lookups`; an unresolved id
/// fails the whole call. Cells sharing a key path: last one wins.
pub fn unflatten(
    category: Category,
    cells: &[UsageCell],
    lookups: &LookupTables,
    identity: LeafIdentity,
) -> PivotResult<UsageTree> {
    let schema = category.schema();
    let mut tree = UsageTree::new();

    for cell in cells {
        if cell.category != category {
            return Err(PivotError::CategoryMismatch {
                expected: category,
                found: cell.category,
            });
        }
        if cell.key_path.len() != schema.depth() {
            return Err(PivotError::KeyArity {
                category,
                expected: schema.depth(),
                found: cell.key_path.len(),
            });
        }

        let references = resolve_references(schema, &cell.key_path, lookups)?;
        let id = match identity {
            LeafIdentity::Own => cell.id.clone(),
            LeafIdentity::Source => cell.source_id.clone(),
        };
        tree.place(
            schema,
            &cell.key_path,
            references,
            UsageValue {
                id,
                value: cell.value,
            },
        )?;
    }

    Ok(tree)
}

fn resolve_references(
    schema: &CategorySchema,
    key_path: &[String],
    lookups: &LookupTables,
) -> PivotResult<Vec<Option<ReferenceSummary>>> {
    schema
        .levels
        .iter()
        .zip(key_path)
        .map(|(level, key)| match level.kind {
            LevelKind::Free => Ok(None),
            LevelKind::Foreign(kind) => lookups
                .resolve(kind, key)
                .cloned()
                .map(Some)
                .ok_or_else(|| PivotError::MissingForeignReference {
                    category: schema.category,
                    kind,
                    id: key.clone(),
                }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivot::{flatten, UsageNode};
    use crate::schema::ReferenceKind;

    fn regimen_lookups() -> LookupTables {
        LookupTables::new().with_regimen(ReferenceSummary::new("R", "1alt1", "AZT+3TC+NVP"))
    }

    fn regimen_cell() -> UsageCell {
        UsageCell::new(
            Category::Regimen,
            "req-1",
            vec!["R".into(), "community".into()],
            Some(6),
        )
        .with_id("Y")
    }

    #[test]
    fn test_foreign_level_resolved() {
        let tree = unflatten(
            Category::Regimen,
            &[regimen_cell()],
            &regimen_lookups(),
            LeafIdentity::Own,
        )
        .unwrap();

        let regimen = tree.get("R").unwrap();
        assert_eq!(regimen.reference().unwrap().code, "1alt1");
        let columns = regimen.children().unwrap();
        assert_eq!(
            columns.get("community"),
            Some(&UsageNode::leaf(UsageValue {
                id: Some("Y".into()),
                value: Some(6),
            }))
        );
    }

    #[test]
    fn test_missing_foreign_reference_fails_fast() {
        let err = unflatten(
            Category::Regimen,
            &[regimen_cell()],
            &LookupTables::new(),
            LeafIdentity::Own,
        )
        .unwrap_err();

        match err {
            PivotError::MissingForeignReference { category, kind, id } => {
                assert_eq!(category, Category::Regimen);
                assert_eq!(kind, ReferenceKind::Regimen);
                assert_eq!(id, "R");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_source_identity_uses_source_id() {
        let cell = regimen_cell().into_draft("draft-1");
        let tree = unflatten(
            Category::Regimen,
            &[cell],
            &regimen_lookups(),
            LeafIdentity::Source,
        )
        .unwrap();

        let cells = flatten(Category::Regimen, &tree, "req-1").unwrap();
        assert_eq!(cells[0].id.as_deref(), Some("Y"));
    }

    #[test]
    fn test_wrong_arity_rejected() {
        let cell = UsageCell::new(Category::Patient, "req-1", vec!["only".into()], Some(1));
        let err = unflatten(Category::Patient, &[cell], &LookupTables::new(), LeafIdentity::Own)
            .unwrap_err();
        assert!(matches!(
            err,
            PivotError::KeyArity {
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_wrong_category_rejected() {
        let err = unflatten(
            Category::Patient,
            &[regimen_cell()],
            &regimen_lookups(),
            LeafIdentity::Own,
        )
        .unwrap_err();
        assert!(matches!(err, PivotError::CategoryMismatch { .. }));
    }

    #[test]
    fn test_duplicate_key_path_last_wins() {
        let first = UsageCell::new(Category::Patient, "req-1", vec!["g".into(), "c".into()], Some(1));
        let second = UsageCell::new(Category::Patient, "req-1", vec!["g".into(), "c".into()], Some(9));

        let tree = unflatten(
            Category::Patient,
            &[first, second],
            &LookupTables::new(),
            LeafIdentity::Own,
        )
        .unwrap();
        let cells = flatten(Category::Patient, &tree, "req-1").unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].value, Some(9));
    }

    #[test]
    fn test_empty_cells_give_empty_tree() {
        let tree = unflatten(
            Category::UsageInformation,
            &[],
            &LookupTables::new(),
            LeafIdentity::Own,
        )
        .unwrap();
        assert!(tree.is_empty());
    }
}
