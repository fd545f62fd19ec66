use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::Gender;

/// Analytics filter set. Record-level predicates (`diagnosis`, visit window)
/// apply before the patient join; patient-level ones (`gender`, age range) after.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsFilters {
    pub diagnosis: Option<String>,
    pub gender: Option<Gender>,
    pub age_min: Option<u32>,
    pub age_max: Option<u32>,
    pub visit_from: Option<DateTime<Utc>>,
    pub visit_to: Option<DateTime<Utc>>,
}

impl AnalyticsFilters {
    /// Human-readable age window, e.g. `"18-∞"`; `None` when no bound is set.
    pub fn age_range_label(&self) -> Option<String> {
        if self.age_min.is_none() && self.age_max.is_none() {
            return None;
        }
        let min = self.age_min.unwrap_or(0);
        let max = self
            .age_max
            .map(|m| m.to_string())
            .unwrap_or_else(|| "∞".to_string());
        Some(format!("{min}-{max}"))
    }
}

/// Patient list query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSearch {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PatientSearch {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1) * self.limit()
    }
}
