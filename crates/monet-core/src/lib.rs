//! Core domain model for MONET: the canonical opportunity record and enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "monet-core";

/// The six canonical opportunity categories used throughout filtering and
/// display. The wire strings are the display strings; each of them survives
/// re-classification, so a serialized record normalizes back to itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpportunityType {
    Freelance,
    #[serde(rename = "Digital Product")]
    DigitalProduct,
    #[serde(rename = "Content Creation")]
    ContentCreation,
    #[serde(rename = "Service-Based")]
    ServiceBased,
    #[serde(rename = "Passive Income")]
    PassiveIncome,
    #[serde(rename = "Info Product")]
    InfoProduct,
}

impl OpportunityType {
    pub const ALL: [OpportunityType; 6] = [
        OpportunityType::Freelance,
        OpportunityType::DigitalProduct,
        OpportunityType::ContentCreation,
        OpportunityType::ServiceBased,
        OpportunityType::PassiveIncome,
        OpportunityType::InfoProduct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityType::Freelance => "Freelance",
            OpportunityType::DigitalProduct => "Digital Product",
            OpportunityType::ContentCreation => "Content Creation",
            OpportunityType::ServiceBased => "Service-Based",
            OpportunityType::PassiveIncome => "Passive Income",
            OpportunityType::InfoProduct => "Info Product",
        }
    }
}

impl std::fmt::Display for OpportunityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk assessment attached to a record; defaults to `Medium` when the
/// producer omits or mangles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    /// Case-insensitive label parse; producers emit "low", "LOW", "Low".
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Medium
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display grouping bucket, derived from a record on demand and never stored
/// as record state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityBucket {
    #[serde(rename = "Quick Win")]
    QuickWin,
    Growth,
    Aspirational,
    #[serde(rename = "Passive Income")]
    PassiveIncome,
}

impl PriorityBucket {
    pub const ALL: [PriorityBucket; 4] = [
        PriorityBucket::QuickWin,
        PriorityBucket::Growth,
        PriorityBucket::Aspirational,
        PriorityBucket::PassiveIncome,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityBucket::QuickWin => "Quick Win",
            PriorityBucket::Growth => "Growth",
            PriorityBucket::Aspirational => "Aspirational",
            PriorityBucket::PassiveIncome => "Passive Income",
        }
    }

    /// Lenient label parse for filter inputs: case-insensitive, ignoring
    /// everything that is not a letter or digit ("quick win", "QUICK_WIN").
    pub fn from_label(label: &str) -> Option<Self> {
        let token: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match token.as_str() {
            "quickwin" => Some(PriorityBucket::QuickWin),
            "growth" => Some(PriorityBucket::Growth),
            "aspirational" => Some(PriorityBucket::Aspirational),
            "passiveincome" => Some(PriorityBucket::PassiveIncome),
            _ => None,
        }
    }
}

impl std::fmt::Display for PriorityBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference material attached to an opportunity; every field is optional
/// and malformed elements degrade to an empty entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Resource {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// A success story shown on detail pages; same leniency as [`Resource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SuccessStory {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub journey: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
}

/// The canonical opportunity representation every consumer relies on.
///
/// Created exactly once per raw payload by the normalizer and never partially
/// mutated afterwards; if the upstream payload changes, a new record replaces
/// the old one. Wire names follow the producers' camelCase convention so a
/// canonical record round-trips through normalization field-for-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub ty: OpportunityType,
    pub description: String,
    pub income_potential: String,
    pub startup_cost: String,
    pub risk_level: RiskLevel,
    pub steps_to_start: Vec<String>,
    pub resources: Vec<Resource>,
    pub success_stories: Vec<SuccessStory>,
    pub roi_score: u8,
    pub time_to_first_revenue: String,
    pub skill_gap_days: u32,
    pub required_skills: Vec<String>,
    pub skills: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_wire_strings_are_display_strings() {
        for ty in OpportunityType::ALL {
            let wire = serde_json::to_value(ty).unwrap();
            assert_eq!(wire, serde_json::Value::String(ty.to_string()));
        }
        assert_eq!(
            serde_json::from_str::<OpportunityType>("\"Passive Income\"").unwrap(),
            OpportunityType::PassiveIncome
        );
    }

    #[test]
    fn risk_label_parse_is_case_insensitive() {
        assert_eq!(RiskLevel::from_label("low"), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::from_label(" HIGH "), Some(RiskLevel::High));
        assert_eq!(RiskLevel::from_label("severe"), None);
        assert_eq!(RiskLevel::default(), RiskLevel::Medium);
    }

    #[test]
    fn priority_label_parse_ignores_separators() {
        assert_eq!(
            PriorityBucket::from_label("quick win"),
            Some(PriorityBucket::QuickWin)
        );
        assert_eq!(
            PriorityBucket::from_label("QUICK_WIN"),
            Some(PriorityBucket::QuickWin)
        );
        assert_eq!(
            PriorityBucket::from_label("Passive Income"),
            Some(PriorityBucket::PassiveIncome)
        );
        assert_eq!(PriorityBucket::from_label("urgent"), None);
    }

    #[test]
    fn record_serializes_with_camel_case_wire_names() {
        let record = OpportunityRecord {
            id: "r-1".into(),
            title: "Sample".into(),
            ty: OpportunityType::Freelance,
            description: "desc".into(),
            income_potential: "$1,000–$5,000".into(),
            startup_cost: "$0–$100".into(),
            risk_level: RiskLevel::Low,
            steps_to_start: vec!["one".into()],
            resources: vec![],
            success_stories: vec![],
            roi_score: 70,
            time_to_first_revenue: "2–4 weeks".into(),
            skill_gap_days: 7,
            required_skills: vec![],
            skills: vec![],
            created_at: "2026-03-01T09:30:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "Freelance");
        assert!(value.get("incomePotential").is_some());
        assert!(value.get("timeToFirstRevenue").is_some());
        assert!(value.get("skillGapDays").is_some());
        assert!(value.get("income_potential").is_none());
    }
}
