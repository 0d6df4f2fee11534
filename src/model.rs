use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Literal stored and displayed for an absent optional field under
/// [`AbsentPolicy::Sentinel`].
pub const SENTINEL: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Available,
    SoldOut,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Available => "AVAILABLE",
            ProjectStatus::SoldOut => "SOLD_OUT",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(ProjectStatus::Available),
            "SOLD_OUT" => Ok(ProjectStatus::SoldOut),
            other => Err(format!("unknown project status: {}", other)),
        }
    }
}

/// One solar-project listing as seen on a single scrape run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRecord {
    pub title: String,
    pub image_url: String,
    pub thumbnail_url: String,
    pub purchase_price: Option<f64>,
    pub old_price: Option<f64>,
    pub maintenance_price: Option<f64>,
    pub status: ProjectStatus,
    pub total_capacity_kw: f64,
    pub progress_percentage: f64,
    pub reserved_percentage: f64,
    pub reserved_kw: f64,
    pub remaining_percentage: f64,
    pub remaining_kw: f64,
}

/// How optional numeric fields missing from a listing are materialized
/// when persisted or displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsentPolicy {
    /// Absent values become `0`.
    #[default]
    Zero,
    /// Absent values become the literal `N/A`.
    Sentinel,
}

impl AbsentPolicy {
    /// Numeric view of an optional field. `Sentinel` keeps absence as `None`.
    pub fn numeric(self, value: Option<f64>) -> Option<f64> {
        match self {
            AbsentPolicy::Zero => Some(value.unwrap_or(0.0)),
            AbsentPolicy::Sentinel => value,
        }
    }

    pub fn render(self, value: Option<f64>) -> String {
        match self.numeric(value) {
            Some(v) => format_number(v),
            None => SENTINEL.to_string(),
        }
    }
}

/// Format without trailing `.0` noise: `1140` rather than `1140.0`.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        let s = format!("{:.2}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
