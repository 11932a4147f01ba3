use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Context = Map<String, Value>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(alias = "Low", alias = "LOW")]
    Low,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "High", alias = "HIGH")]
    High,
}

/// Model reply. Severity casing varies between replies and empty lists are
/// sometimes left out, both are accepted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub severity: Severity,
    pub root_cause: String,
    #[serde(default)]
    pub solutions: Vec<Intervention>,
    #[serde(default)]
    pub quick_wins: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Intervention {
    pub title: String,
    pub steps: Vec<String>,
    pub impact: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRecord {
    pub issue: String,
    #[serde(default)]
    pub context: Context,
    pub solution: Solution,
    pub timestamp: DateTime<Utc>,
    pub week_key: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// On-disk document, rewritten whole on every append.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionHistory {
    #[serde(default)]
    pub prescriptions: Vec<PrescriptionRecord>,
    #[serde(default)]
    pub current_week: Option<String>,
    #[serde(default)]
    pub week_start_date: Option<DateTime<Local>>,
}

impl PrescriptionHistory {
    pub fn last(&self) -> Option<&PrescriptionRecord> {
        self.prescriptions.last()
    }
}

#[derive(Deserialize, Debug)]
pub struct PrescribeRequest {
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub context: Option<Context>,
}
