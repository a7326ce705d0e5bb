//! Per-requisition category gates.

use serde::{Deserialize, Serialize};

use crate::schema::Category;

/// Which categories are collected for a requisition.
///
/// Deserialises from the requisition template's enable flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGates {
    #[serde(rename = "enableConsultationNumber", default)]
    pub consultation_number: bool,
    #[serde(rename = "enablePatientLineItem", default)]
    pub patient: bool,
    #[serde(rename = "enableRegimen", default)]
    pub regimen: bool,
    #[serde(rename = "enableRegimenSummary", default)]
    pub regimen_summary: bool,
    #[serde(rename = "enableRapidTestConsumption", default)]
    pub test_consumption: bool,
    #[serde(rename = "enableKitUsage", default)]
    pub kit_usage: bool,
    #[serde(rename = "enableUsageInformation", default)]
    pub usage_information: bool,
}

impl FeatureGates {
    /// Every category enabled.
    pub fn all_enabled() -> Self {
        Category::ALL
            .into_iter()
            .fold(Self::default(), |gates, category| gates.with(category, true))
    }

    /// Every category disabled.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        match category {
            Category::ConsultationNumber => self.consultation_number,
            Category::Patient => self.patient,
            Category::Regimen => self.regimen,
            Category::RegimenSummary => self.regimen_summary,
            Category::TestConsumption => self.test_consumption,
            Category::KitUsage => self.kit_usage,
            Category::UsageInformation => self.usage_information,
        }
    }

    pub fn set(&mut self, category: Category, enabled: bool) {
        let flag = match category {
            Category::ConsultationNumber => &mut self.consultation_number,
            Category::Patient => &mut self.patient,
            Category::Regimen => &mut self.regimen,
            Category::RegimenSummary => &mut self.regimen_summary,
            Category::TestConsumption => &mut self.test_consumption,
            Category::KitUsage => &mut self.kit_usage,
            Category::UsageInformation => &mut self.usage_information,
        };
        *flag = enabled;
    }

    pub fn with(mut self, category: Category, enabled: bool) -> Self {
        self.set(category, enabled);
        self
    }
}
