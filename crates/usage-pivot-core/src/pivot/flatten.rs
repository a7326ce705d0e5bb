//! Nested → flat.

use crate::models::{FeatureGates, UsageCell};
use crate::schema::{Category, CategorySchema};

use super::{PivotError, PivotResult, UsageNode, UsageTree};

/// Flatten a category tree into cells owned by `owner_id`.
///
/// Depth-first, one cell per leaf, in key order. Null containers at any
/// level produce nothing. Leaf ids are copied into the cell's `id`; foreign
/// ids are carried verbatim.
pub fn flatten(category: Category, tree: &UsageTree, owner_id: &str) -> PivotResult<Vec<UsageCell>> {
    let schema = category.schema();
    let mut cells = Vec::new();
    let mut path = Vec::with_capacity(schema.depth());
    walk(schema, tree, owner_id, &mut path, &mut cells)?;
    Ok(cells)
}

/// Flatten only if the category's gate is enabled; otherwise no cells.
pub fn flatten_gated(
    category: Category,
    tree: &UsageTree,
    owner_id: &str,
    gates: &FeatureGates,
) -> PivotResult<Vec<UsageCell>> {
    if !gates.is_enabled(category) {
        return Ok(Vec::new());
    }
    flatten(category, tree, owner_id)
}

fn walk(
    schema: &CategorySchema,
    tree: &UsageTree,
    owner_id: &str,
    path: &mut Vec<String>,
    cells: &mut Vec<UsageCell>,
) -> PivotResult<()> {
    let level = path.len();
    let is_last = level + 1 == schema.depth();

    for (key, node) in tree {
        match node {
            UsageNode::Null => {}
            UsageNode::Leaf { value, .. } if is_last => {
                path.push(key.clone());
                cells.push(UsageCell {
                    id: value.id.clone(),
                    owner_id: owner_id.to_string(),
                    source_id: None,
                    category: schema.category,
                    key_path: path.clone(),
                    value: value.value,
                });
                path.pop();
            }
            UsageNode::Branch { children, .. } if !is_last => {
                path.push(key.clone());
                walk(schema, children, owner_id, path, cells)?;
                path.pop();
            }
            _ => {
                return Err(PivotError::ShapeMismatch {
                    category: schema.category,
                    level,
                })
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UsageValue;

    fn leaf(id: Option<&str>, value: Option<i64>) -> UsageValue {
        UsageValue {
            id: id.map(String::from),
            value,
        }
    }

    fn patient_tree() -> UsageTree {
        let mut tree = UsageTree::new();
        tree.insert(
            "newSection2".into(),
            UsageNode::branch(UsageTree::from_leaves([(
                "new".into(),
                leaf(Some("X"), Some(20)),
            )])),
        );
        tree
    }

    #[test]
    fn test_two_level_flatten() {
        let cells = flatten(Category::Patient, &patient_tree(), "req-1").unwrap();

        assert_eq!(cells.len(), 1);
        let cell = &cells[0];
        assert_eq!(cell.key("group"), Some("newSection2"));
        assert_eq!(cell.key("column"), Some("new"));
        assert_eq!(cell.value, Some(20));
        assert_eq!(cell.id.as_deref(), Some("X"));
        assert_eq!(cell.owner_id, "req-1");
        assert_eq!(cell.source_id, None);
    }

    #[test]
    fn test_empty_tree_yields_no_cells() {
        let cells = flatten(Category::KitUsage, &UsageTree::new(), "req-1").unwrap();
        assert!(cells.is_empty());
    }

    #[test]
    fn test_null_container_dropped() {
        let mut tree = patient_tree();
        tree.insert("disabledSection".into(), UsageNode::Null);

        let cells = flatten(Category::Patient, &tree, "req-1").unwrap();
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn test_null_inner_container_dropped() {
        let mut projects = UsageTree::new();
        projects.insert("hivDetermine".into(), UsageNode::Null);
        let mut tree = UsageTree::new();
        tree.insert("HF".into(), UsageNode::branch(projects));

        let cells = flatten(Category::TestConsumption, &tree, "req-1").unwrap();
        assert!(cells.is_empty());
    }

    #[test]
    fn test_blank_leaf_keeps_id() {
        let mut tree = UsageTree::new();
        tree.insert(
            "g".into(),
            UsageNode::branch(UsageTree::from_leaves([("c".into(), leaf(Some("X"), None))])),
        );

        let cells = flatten(Category::ConsultationNumber, &tree, "req-1").unwrap();
        assert_eq!(cells[0].value, None);
        assert_eq!(cells[0].id.as_deref(), Some("X"));
    }

    #[test]
    fn test_leaf_above_last_level_is_shape_mismatch() {
        let tree = UsageTree::from_leaves([("HF".into(), leaf(None, Some(1)))]);
        let err = flatten(Category::TestConsumption, &tree, "req-1").unwrap_err();
        assert!(matches!(err, PivotError::ShapeMismatch { level: 0, .. }));
    }

    #[test]
    fn test_branch_at_last_level_is_shape_mismatch() {
        let mut columns = UsageTree::new();
        columns.insert("new".into(), UsageNode::branch(UsageTree::new()));
        let mut tree = UsageTree::new();
        tree.insert("g".into(), UsageNode::branch(columns));

        let err = flatten(Category::Patient, &tree, "req-1").unwrap_err();
        assert!(matches!(err, PivotError::ShapeMismatch { level: 1, .. }));
    }

    #[test]
    fn test_disabled_gate_yields_nothing() {
        let gates = FeatureGates::all_enabled().with(Category::Patient, false);
        let cells = flatten_gated(Category::Patient, &patient_tree(), "req-1", &gates).unwrap();
        assert!(cells.is_empty());

        let cells =
            flatten_gated(Category::Patient, &patient_tree(), "req-1", &FeatureGates::all_enabled())
                .unwrap();
        assert_eq!(cells.len(), 1);
    }

    #[test]
    fn test_output_in_key_order() {
        let mut tree = UsageTree::new();
        tree.insert(
            "b".into(),
            UsageNode::branch(UsageTree::from_leaves([
                ("z".into(), leaf(None, Some(1))),
                ("a".into(), leaf(None, Some(2))),
            ])),
        );
        tree.insert(
            "a".into(),
            UsageNode::branch(UsageTree::from_leaves([("m".into(), leaf(None, Some(3)))])),
        );

        let cells = flatten(Category::KitUsage, &tree, "req-1").unwrap();
        let paths: Vec<_> = cells.iter().map(|c| c.key_path.join("/")).collect();
        assert_eq!(paths, vec!["a/m", "b/a", "b/z"]);
    }
}
