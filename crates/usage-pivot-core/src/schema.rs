//! Category schema registry.
//!
//! Static description of every usage-report category: the ordered key levels
//! of its nesting, which levels hold foreign ids, and how a missing outer
//! group key is treated. The pivot engines walk these descriptors instead of
//! carrying per-category code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A usage-report category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Consultation counts per group and column
    ConsultationNumber,
    /// Patient demographics per group and column
    Patient,
    /// Regimen consumption per regimen and column
    Regimen,
    /// Regimen summary lines per name and column
    RegimenSummary,
    /// Rapid-test outcomes per service, project and outcome
    TestConsumption,
    /// Kit usage per collection and service
    KitUsage,
    /// Generic usage indicators per service, information and orderable
    UsageInformation,
}

/// Kind of externally owned entity a foreign-id level refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Regimen,
    Orderable,
}

/// How the keys of one nesting level are typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelKind {
    /// Free string key (column names, group names, ...)
    Free,
    /// Foreign id, resolved against a lookup table on unflatten
    Foreign(ReferenceKind),
}

/// One level of a category's key path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub name: &'static str,
    pub kind: LevelKind,
}

/// What happens to a row whose outer grouping key is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingGroupPolicy {
    /// Row is skipped, producing no cells
    Drop,
    /// Row is rejected with an error
    Reject,
}

/// Static descriptor for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySchema {
    pub category: Category,
    pub levels: &'static [Level],
    pub missing_group: MissingGroupPolicy,
}

const fn free(name: &'static str) -> Level {
    Level {
        name,
        kind: LevelKind::Free,
    }
}

const fn foreign(name: &'static str, kind: ReferenceKind) -> Level {
    Level {
        name,
        kind: LevelKind::Foreign(kind),
    }
}

static CONSULTATION_NUMBER: CategorySchema = CategorySchema {
    category: Category::ConsultationNumber,
    levels: &[free("group"), free("column")],
    missing_group: MissingGroupPolicy::Drop,
};

static PATIENT: CategorySchema = CategorySchema {
    category: Category::Patient,
    levels: &[free("group"), free("column")],
    missing_group: MissingGroupPolicy::Drop,
};

static REGIMEN: CategorySchema = CategorySchema {
    category: Category::Regimen,
    levels: &[foreign("regimen", ReferenceKind::Regimen), free("column")],
    missing_group: MissingGroupPolicy::Reject,
};

static REGIMEN_SUMMARY: CategorySchema = CategorySchema {
    category: Category::RegimenSummary,
    levels: &[free("name"), free("column")],
    missing_group: MissingGroupPolicy::Drop,
};

static TEST_CONSUMPTION: CategorySchema = CategorySchema {
    category: Category::TestConsumption,
    levels: &[free("service"), free("project"), free("outcome")],
    missing_group: MissingGroupPolicy::Drop,
};

static KIT_USAGE: CategorySchema = CategorySchema {
    category: Category::KitUsage,
    levels: &[free("collection"), free("service")],
    missing_group: MissingGroupPolicy::Drop,
};

static USAGE_INFORMATION: CategorySchema = CategorySchema {
    category: Category::UsageInformation,
    levels: &[
        free("service"),
        free("information"),
        foreign("orderable", ReferenceKind::Orderable),
    ],
    missing_group: MissingGroupPolicy::Drop,
};

impl Category {
    /// Every category, in canonical order.
    pub const ALL: [Category; 7] = [
        Category::ConsultationNumber,
        Category::Patient,
        Category::Regimen,
        Category::RegimenSummary,
        Category::TestConsumption,
        Category::KitUsage,
        Category::UsageInformation,
    ];

    /// Static schema for this category.
    pub fn schema(self) -> &'static CategorySchema {
        match self {
            Category::ConsultationNumber => &CONSULTATION_NUMBER,
            Category::Patient => &PATIENT,
            Category::Regimen => &REGIMEN,
            Category::RegimenSummary => &REGIMEN_SUMMARY,
            Category::TestConsumption => &TEST_CONSUMPTION,
            Category::KitUsage => &KIT_USAGE,
            Category::UsageInformation => &USAGE_INFORMATION,
        }
    }

    /// Stable storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::ConsultationNumber => "consultation_number",
            Category::Patient => "patient",
            Category::Regimen => "regimen",
            Category::RegimenSummary => "regimen_summary",
            Category::TestConsumption => "test_consumption",
            Category::KitUsage => "kit_usage",
            Category::UsageInformation => "usage_information",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised category name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown usage category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

impl CategorySchema {
    /// Number of key levels (key path length).
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Level at the given index.
    pub fn level(&self, index: usize) -> Option<&Level> {
        self.levels.get(index)
    }

    /// Position of a named level.
    pub fn level_index(&self, name: &str) -> Option<usize> {
        self.levels.iter().position(|level| level.name == name)
    }

    /// Foreign-id levels as (index, kind) pairs.
    pub fn foreign_levels(&self) -> impl Iterator<Item = (usize, ReferenceKind)> + '_ {
        self.levels
            .iter()
            .enumerate()
            .filter_map(|(index, level)| match level.kind {
                LevelKind::Foreign(kind) => Some((index, kind)),
                LevelKind::Free => None,
            })
    }
}
