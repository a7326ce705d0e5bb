//! Generic nested representation shared by every category.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::models::{ReferenceSummary, UsageValue};
use crate::schema::{CategorySchema, MissingGroupPolicy};

use super::{PivotError, PivotResult};

/// One nesting level: key → node, kept in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageTree {
    entries: BTreeMap<String, UsageNode>,
}

/// A node below a key.
#[derive(Debug, Clone, PartialEq)]
pub enum UsageNode {
    /// Missing or null container; contributes no cells
    Null,
    /// Further nesting
    Branch {
        reference: Option<ReferenceSummary>,
        children: UsageTree,
    },
    /// Last level
    Leaf {
        reference: Option<ReferenceSummary>,
        value: UsageValue,
    },
}

impl UsageNode {
    pub fn branch(children: UsageTree) -> Self {
        UsageNode::Branch {
            reference: None,
            children,
        }
    }

    pub fn leaf(value: UsageValue) -> Self {
        UsageNode::Leaf {
            reference: None,
            value,
        }
    }

    /// Leaf for a present value, `Null` for an absent one.
    pub fn from_leaf(value: Option<UsageValue>) -> Self {
        value.map_or(UsageNode::Null, UsageNode::leaf)
    }

    /// Branch for a present container, `Null` for an absent one.
    pub fn from_option(children: Option<UsageTree>) -> Self {
        children.map_or(UsageNode::Null, UsageNode::branch)
    }

    /// Attach a resolved reference (no-op on `Null`).
    pub fn with_reference(mut self, summary: Option<ReferenceSummary>) -> Self {
        match &mut self {
            UsageNode::Branch { reference, .. } | UsageNode::Leaf { reference, .. } => {
                *reference = summary;
            }
            UsageNode::Null => {}
        }
        self
    }

    pub fn reference(&self) -> Option<&ReferenceSummary> {
        match self {
            UsageNode::Branch { reference, .. } | UsageNode::Leaf { reference, .. } => {
                reference.as_ref()
            }
            UsageNode::Null => None,
        }
    }

    pub fn children(&self) -> Option<&UsageTree> {
        match self {
            UsageNode::Branch { children, .. } => Some(children),
            _ => None,
        }
    }

    fn children_mut(&mut self) -> Option<&mut UsageTree> {
        match self {
            UsageNode::Branch { children, .. } => Some(children),
            _ => None,
        }
    }
}

impl UsageTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree of leaves from (key, value) pairs.
    pub fn from_leaves<I>(leaves: I) -> Self
    where
        I: IntoIterator<Item = (String, UsageValue)>,
    {
        Self {
            entries: leaves
                .into_iter()
                .map(|(key, value)| (key, UsageNode::leaf(value)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&UsageNode> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, UsageNode> {
        self.entries.iter()
    }

    /// Insert a node, merging into an existing branch at the same key.
    ///
    /// Leaves at the same key path: last one wins. A `Null` never
    /// overwrites data already present.
    pub fn insert(&mut self, key: String, node: UsageNode) {
        match self.entries.entry(key) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(node);
            }
            btree_map::Entry::Occupied(mut slot) => match (slot.get_mut(), node) {
                (_, UsageNode::Null) => {}
                (
                    UsageNode::Branch {
                        reference,
                        children,
                    },
                    UsageNode::Branch {
                        reference: incoming_reference,
                        children: incoming,
                    },
                ) => {
                    if incoming_reference.is_some() {
                        *reference = incoming_reference;
                    }
                    for (child_key, child) in incoming.entries {
                        children.insert(child_key, child);
                    }
                }
                (existing, incoming) => *existing = incoming,
            },
        }
    }

    /// Insert a top-level group whose key may be missing.
    ///
    /// A missing key is dropped or rejected per the category's policy.
    pub fn insert_group(
        &mut self,
        schema: &CategorySchema,
        key: Option<&str>,
        node: UsageNode,
    ) -> PivotResult<()> {
        match (key, schema.missing_group) {
            (Some(key), _) => {
                self.insert(key.to_string(), node);
                Ok(())
            }
            (None, MissingGroupPolicy::Drop) => Ok(()),
            (None, MissingGroupPolicy::Reject) => Err(PivotError::MissingGroupKey {
                category: schema.category,
            }),
        }
    }

    /// Place a leaf at `path`, creating branches on the way down.
    ///
    /// `references` holds one optional resolved reference per path component.
    pub(crate) fn place(
        &mut self,
        schema: &CategorySchema,
        path: &[String],
        references: Vec<Option<ReferenceSummary>>,
        value: UsageValue,
    ) -> PivotResult<()> {
        let (last, parents) = path.split_last().ok_or(PivotError::KeyArity {
            category: schema.category,
            expected: schema.depth(),
            found: 0,
        })?;
        let mut references = references.into_iter();
        let mut current = self;

        for (level, key) in parents.iter().enumerate() {
            let reference = references.next().flatten();
            let node = current
                .entries
                .entry(key.clone())
                .or_insert_with(|| UsageNode::branch(UsageTree::new()).with_reference(reference));
            current = node.children_mut().ok_or(PivotError::ShapeMismatch {
                category: schema.category,
                level,
            })?;
        }

        let reference = references.next().flatten();
        current.insert(last.clone(), UsageNode::leaf(value).with_reference(reference));
        Ok(())
    }
}

impl<'a> IntoIterator for &'a UsageTree {
    type Item = (&'a String, &'a UsageNode);
    type IntoIter = btree_map::Iter<'a, String, UsageNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
