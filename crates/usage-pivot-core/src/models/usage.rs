//! Nested usage-report DTOs, one shape per category.
//!
//! These are the shapes clients and report renderers exchange. Each converts
//! to and from the generic [`UsageTree`] through [`UsageSection`]; the
//! engines never see these types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::lookup::ReferenceSummary;
use crate::pivot::{PivotError, PivotResult, UsageNode, UsageSection, UsageTree};
use crate::schema::{Category, CategorySchema};

/// A reported number: committed id (if any) plus value (if any).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageValue {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub value: Option<i64>,
}

impl UsageValue {
    pub fn new(id: Option<String>, value: Option<i64>) -> Self {
        Self { id, value }
    }
}

/// Column name → value. A `None` value is an explicit JSON `null` leaf.
pub type ColumnMap = BTreeMap<String, Option<UsageValue>>;

fn columns_to_tree(columns: &ColumnMap) -> UsageTree {
    let mut tree = UsageTree::new();
    for (column, value) in columns {
        tree.insert(column.clone(), UsageNode::from_leaf(value.clone()));
    }
    tree
}

fn columns_from_tree(schema: &CategorySchema, level: usize, tree: &UsageTree) -> PivotResult<ColumnMap> {
    tree.iter()
        .map(|(column, node)| match node {
            UsageNode::Leaf { value, .. } => Ok((column.clone(), Some(value.clone()))),
            UsageNode::Null => Ok((column.clone(), None)),
            UsageNode::Branch { .. } => Err(shape_mismatch(schema, level)),
        })
        .collect()
}

fn shape_mismatch(schema: &CategorySchema, level: usize) -> PivotError {
    PivotError::ShapeMismatch {
        category: schema.category,
        level,
    }
}

/// Children of a group-level node: `Some` for a branch, `None` for null.
fn group_children<'a>(
    schema: &CategorySchema,
    level: usize,
    node: &'a UsageNode,
) -> PivotResult<Option<&'a UsageTree>> {
    match node {
        UsageNode::Branch { children, .. } => Ok(Some(children)),
        UsageNode::Null => Ok(None),
        UsageNode::Leaf { .. } => Err(shape_mismatch(schema, level)),
    }
}

// ============================================================================
// Consultation number, patient, regimen summary
// ============================================================================

/// Group → columns. Used by consultation numbers, patients and regimen
/// summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnGroups {
    pub groups: BTreeMap<String, Option<ColumnMap>>,
}

impl ColumnGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, name: impl Into<String>, columns: ColumnMap) -> Self {
        self.groups.insert(name.into(), Some(columns));
        self
    }
}

impl UsageSection for ColumnGroups {
    fn to_tree(&self, schema: &CategorySchema) -> PivotResult<UsageTree> {
        let mut tree = UsageTree::new();
        for (group, columns) in &self.groups {
            let node = UsageNode::from_option(columns.as_ref().map(columns_to_tree));
            tree.insert_group(schema, Some(group.as_str()), node)?;
        }
        Ok(tree)
    }

    fn from_tree(schema: &CategorySchema, tree: &UsageTree) -> PivotResult<Self> {
        let mut groups = BTreeMap::new();
        for (group, node) in tree {
            let columns = group_children(schema, 0, node)?
                .map(|children| columns_from_tree(schema, 1, children))
                .transpose()?;
            groups.insert(group.clone(), columns);
        }
        Ok(Self { groups })
    }
}

// ============================================================================
// Regimen
// ============================================================================

/// Consumption for one regimen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimenLine {
    /// Regimen id (foreign key)
    pub regimen_id: Option<String>,
    /// Resolved regimen descriptor, filled on unflatten
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regimen: Option<ReferenceSummary>,
    #[serde(default)]
    pub columns: Option<ColumnMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegimenSection {
    pub lines: Vec<RegimenLine>,
}

impl UsageSection for RegimenSection {
    fn to_tree(&self, schema: &CategorySchema) -> PivotResult<UsageTree> {
        let mut tree = UsageTree::new();
        for line in &self.lines {
            let node = UsageNode::from_option(line.columns.as_ref().map(columns_to_tree))
                .with_reference(line.regimen.clone());
            tree.insert_group(schema, line.regimen_id.as_deref(), node)?;
        }
        Ok(tree)
    }

    fn from_tree(schema: &CategorySchema, tree: &UsageTree) -> PivotResult<Self> {
        let mut lines = Vec::with_capacity(tree.len());
        for (regimen_id, node) in tree {
            let columns = group_children(schema, 0, node)?
                .map(|children| columns_from_tree(schema, 1, children))
                .transpose()?;
            lines.push(RegimenLine {
                regimen_id: Some(regimen_id.clone()),
                regimen: node.reference().cloned(),
                columns,
            });
        }
        Ok(Self { lines })
    }
}

// ============================================================================
// Test consumption
// ============================================================================

/// Rapid-test outcomes for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestConsumptionProject {
    #[serde(default)]
    pub outcomes: Option<ColumnMap>,
}

/// Rapid-test results for one service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestConsumptionService {
    pub service: Option<String>,
    #[serde(default)]
    pub projects: Option<BTreeMap<String, Option<TestConsumptionProject>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestConsumptionSection {
    pub services: Vec<TestConsumptionService>,
}

impl UsageSection for TestConsumptionSection {
    fn to_tree(&self, schema: &CategorySchema) -> PivotResult<UsageTree> {
        let mut tree = UsageTree::new();
        for service in &self.services {
            let projects = service.projects.as_ref().map(|projects| {
                let mut subtree = UsageTree::new();
                for (project, entry) in projects {
                    let outcomes = entry
                        .as_ref()
                        .and_then(|entry| entry.outcomes.as_ref())
                        .map(columns_to_tree);
                    subtree.insert(project.clone(), UsageNode::from_option(outcomes));
                }
                subtree
            });
            tree.insert_group(schema, service.service.as_deref(), UsageNode::from_option(projects))?;
        }
        Ok(tree)
    }

    fn from_tree(schema: &CategorySchema, tree: &UsageTree) -> PivotResult<Self> {
        let mut services = Vec::with_capacity(tree.len());
        for (service, node) in tree {
            let projects = match group_children(schema, 0, node)? {
                None => None,
                Some(children) => {
                    let mut projects = BTreeMap::new();
                    for (project, project_node) in children {
                        let entry = group_children(schema, 1, project_node)?
                            .map(|outcomes| {
                                columns_from_tree(schema, 2, outcomes).map(|outcomes| {
                                    TestConsumptionProject {
                                        outcomes: Some(outcomes),
                                    }
                                })
                            })
                            .transpose()?;
                        projects.insert(project.clone(), entry);
                    }
                    Some(projects)
                }
            };
            services.push(TestConsumptionService {
                service: Some(service.clone()),
                projects,
            });
        }
        Ok(Self { services })
    }
}

// ============================================================================
// Kit usage
// ============================================================================

/// Kit usage for one collection (e.g. kits received, kits used).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KitUsageLine {
    pub collection: Option<String>,
    #[serde(default)]
    pub services: Option<ColumnMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KitUsageSection {
    pub lines: Vec<KitUsageLine>,
}

impl UsageSection for KitUsageSection {
    fn to_tree(&self, schema: &CategorySchema) -> PivotResult<UsageTree> {
        let mut tree = UsageTree::new();
        for line in &self.lines {
            let node = UsageNode::from_option(line.services.as_ref().map(columns_to_tree));
            tree.insert_group(schema, line.collection.as_deref(), node)?;
        }
        Ok(tree)
    }

    fn from_tree(schema: &CategorySchema, tree: &UsageTree) -> PivotResult<Self> {
        let mut lines = Vec::with_capacity(tree.len());
        for (collection, node) in tree {
            let services = group_children(schema, 0, node)?
                .map(|children| columns_from_tree(schema, 1, children))
                .transpose()?;
            lines.push(KitUsageLine {
                collection: Some(collection.clone()),
                services,
            });
        }
        Ok(Self { lines })
    }
}

// ============================================================================
// Usage information
// ============================================================================

/// Usage of one orderable for one information item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderableUsage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub value: Option<i64>,
    /// Resolved orderable descriptor, filled on unflatten
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orderable: Option<ReferenceSummary>,
}

/// Orderable id → usage, for one information item (e.g. existentStock).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInformationEntry {
    #[serde(default)]
    pub orderables: Option<BTreeMap<String, Option<OrderableUsage>>>,
}

/// Usage information for one service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInformationService {
    pub service: Option<String>,
    #[serde(default)]
    pub informations: Option<BTreeMap<String, Option<UsageInformationEntry>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageInformationSection {
    pub services: Vec<UsageInformationService>,
}

impl UsageSection for UsageInformationSection {
    fn to_tree(&self, schema: &CategorySchema) -> PivotResult<UsageTree> {
        let mut tree = UsageTree::new();
        for service in &self.services {
            let informations = service.informations.as_ref().map(|informations| {
                let mut subtree = UsageTree::new();
                for (information, entry) in informations {
                    let orderables = entry
                        .as_ref()
                        .and_then(|entry| entry.orderables.as_ref())
                        .map(|orderables| {
                            let mut leaves = UsageTree::new();
                            for (orderable_id, usage) in orderables {
                                let node = match usage {
                                    Some(usage) => UsageNode::leaf(UsageValue::new(usage.id.clone(), usage.value))
                                        .with_reference(usage.orderable.clone()),
                                    None => UsageNode::Null,
                                };
                                leaves.insert(orderable_id.clone(), node);
                            }
                            leaves
                        });
                    subtree.insert(information.clone(), UsageNode::from_option(orderables));
                }
                subtree
            });
            tree.insert_group(
                schema,
                service.service.as_deref(),
                UsageNode::from_option(informations),
            )?;
        }
        Ok(tree)
    }

    fn from_tree(schema: &CategorySchema, tree: &UsageTree) -> PivotResult<Self> {
        let mut services = Vec::with_capacity(tree.len());
        for (service, node) in tree {
            let informations = match group_children(schema, 0, node)? {
                None => None,
                Some(children) => {
                    let mut informations = BTreeMap::new();
                    for (information, information_node) in children {
                        let entry = match group_children(schema, 1, information_node)? {
                            None => None,
                            Some(leaves) => {
                                let mut orderables = BTreeMap::new();
                                for (orderable_id, leaf) in leaves {
                                    match leaf {
                                        UsageNode::Null => {
                                            orderables.insert(orderable_id.clone(), None);
                                        }
                                        UsageNode::Leaf { reference, value } => {
                                            orderables.insert(
                                                orderable_id.clone(),
                                                Some(OrderableUsage {
                                                    id: value.id.clone(),
                                                    value: value.value,
                                                    orderable: reference.clone(),
                                                }),
                                            );
                                        }
                                        UsageNode::Branch { .. } => {
                                            return Err(shape_mismatch(schema, 2))
                                        }
                                    }
                                }
                                Some(UsageInformationEntry {
                                    orderables: Some(orderables),
                                })
                            }
                        };
                        informations.insert(information.clone(), entry);
                    }
                    Some(informations)
                }
            };
            services.push(UsageInformationService {
                service: Some(service.clone()),
                informations,
            });
        }
        Ok(Self { services })
    }
}

// ============================================================================
// Full report
// ============================================================================

/// Every category's nested DTO for one requisition. `None` means the
/// section is absent (disabled or never reported).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    #[serde(default)]
    pub consultation_number: Option<ColumnGroups>,
    #[serde(default)]
    pub patient: Option<ColumnGroups>,
    #[serde(default)]
    pub regimen: Option<RegimenSection>,
    #[serde(default)]
    pub regimen_summary: Option<ColumnGroups>,
    #[serde(default)]
    pub test_consumption: Option<TestConsumptionSection>,
    #[serde(default)]
    pub kit_usage: Option<KitUsageSection>,
    #[serde(default)]
    pub usage_information: Option<UsageInformationSection>,
}

fn section_tree<S: UsageSection>(
    category: Category,
    section: Option<&S>,
) -> PivotResult<Option<UsageTree>> {
    section.map(|s| s.to_tree(category.schema())).transpose()
}

fn section_from_tree<S: UsageSection>(
    category: Category,
    tree: Option<&UsageTree>,
) -> PivotResult<Option<S>> {
    tree.map(|t| S::from_tree(category.schema(), t)).transpose()
}

impl UsageReport {
    /// Generic tree for one category, `None` if the section is absent.
    pub fn section_tree(&self, category: Category) -> PivotResult<Option<UsageTree>> {
        match category {
            Category::ConsultationNumber => section_tree(category, self.consultation_number.as_ref()),
            Category::Patient => section_tree(category, self.patient.as_ref()),
            Category::Regimen => section_tree(category, self.regimen.as_ref()),
            Category::RegimenSummary => section_tree(category, self.regimen_summary.as_ref()),
            Category::TestConsumption => section_tree(category, self.test_consumption.as_ref()),
            Category::KitUsage => section_tree(category, self.kit_usage.as_ref()),
            Category::UsageInformation => section_tree(category, self.usage_information.as_ref()),
        }
    }

    /// Replace one category's section from a generic tree (`None` clears it).
    pub fn set_section_tree(&mut self, category: Category, tree: Option<&UsageTree>) -> PivotResult<()> {
        match category {
            Category::ConsultationNumber => {
                self.consultation_number = section_from_tree(category, tree)?
            }
            Category::Patient => self.patient = section_from_tree(category, tree)?,
            Category::Regimen => self.regimen = section_from_tree(category, tree)?,
            Category::RegimenSummary => self.regimen_summary = section_from_tree(category, tree)?,
            Category::TestConsumption => self.test_consumption = section_from_tree(category, tree)?,
            Category::KitUsage => self.kit_usage = section_from_tree(category, tree)?,
            Category::UsageInformation => {
                self.usage_information = section_from_tree(category, tree)?
            }
        }
        Ok(())
    }

    /// Categories with a present section.
    pub fn present_categories(&self) -> PivotResult<Vec<Category>> {
        let mut present = Vec::new();
        for category in Category::ALL {
            if self.section_tree(category)?.is_some() {
                present.push(category);
            }
        }
        Ok(present)
    }
}

/// Parse one category's nested DTO from JSON into its generic tree.
pub fn section_tree_from_json(category: Category, json: &str) -> PivotResult<UsageTree> {
    let schema = category.schema();
    match category {
        Category::ConsultationNumber | Category::Patient | Category::RegimenSummary => {
            serde_json::from_str::<ColumnGroups>(json)?.to_tree(schema)
        }
        Category::Regimen => serde_json::from_str::<RegimenSection>(json)?.to_tree(schema),
        Category::TestConsumption => {
            serde_json::from_str::<TestConsumptionSection>(json)?.to_tree(schema)
        }
        Category::KitUsage => serde_json::from_str::<KitUsageSection>(json)?.to_tree(schema),
        Category::UsageInformation => {
            serde_json::from_str::<UsageInformationSection>(json)?.to_tree(schema)
        }
    }
}

/// Render one category's generic tree as its nested DTO JSON.
pub fn section_json_from_tree(category: Category, tree: &UsageTree) -> PivotResult<String> {
    let mut report = UsageReport::default();
    report.set_section_tree(category, Some(tree))?;
    let json = match category {
        Category::ConsultationNumber => serde_json::to_string(&report.consultation_number)?,
        Category::Patient => serde_json::to_string(&report.patient)?,
        Category::Regimen => serde_json::to_string(&report.regimen)?,
        Category::RegimenSummary => serde_json::to_string(&report.regimen_summary)?,
        Category::TestConsumption => serde_json::to_string(&report.test_consumption)?,
        Category::KitUsage => serde_json::to_string(&report.kit_usage)?,
        Category::UsageInformation => serde_json::to_string(&report.usage_information)?,
    };
    Ok(json)
}
