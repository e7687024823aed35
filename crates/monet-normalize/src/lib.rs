//! Payload normalization: lenient parsing, type classification, and
//! type-conditioned estimate filling.
//!
//! Producers emit opportunity payloads in at least three shapes (AI batches,
//! manual forms, legacy rows) with inconsistent field names, casings, and
//! types. Everything downstream operates on [`OpportunityRecord`], produced
//! exactly once per payload by [`normalize`]. The function never fails: parse
//! failures degrade to a stub record, shape mismatches resolve through
//! fallback chains and the injected [`EstimateTable`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use monet_core::{OpportunityRecord, OpportunityType, Resource, RiskLevel, SuccessStory};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "monet-normalize";

pub const DEFAULT_TITLE: &str = "Opportunity";
pub const DEFAULT_DESCRIPTION: &str = "No description available.";
pub const STUB_DESCRIPTION: &str = "Error loading opportunity details";

/// Generic starting steps used when a payload carries no usable
/// `stepsToStart` array.
pub const DEFAULT_STEPS: [&str; 4] = [
    "Research the market and pick a niche",
    "Outline your first offer",
    "Set up a simple public presence",
    "Pitch your first three prospects",
];

/// Everything the engine must not obtain by itself: the ingestion timestamp
/// (the engine never reads a clock) and optional caller-supplied fallbacks.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub ingested_at: DateTime<Utc>,
    pub fallback_title: Option<String>,
    pub fallback_type: Option<String>,
    pub record_id: Option<String>,
}

impl NormalizeContext {
    pub fn new(ingested_at: DateTime<Utc>) -> Self {
        Self {
            ingested_at,
            fallback_title: None,
            fallback_type: None,
            record_id: None,
        }
    }

    pub fn with_fallback_title(mut self, title: impl Into<String>) -> Self {
        self.fallback_title = Some(title.into());
        self
    }

    pub fn with_fallback_type(mut self, ty: impl Into<String>) -> Self {
        self.fallback_type = Some(ty.into());
        self
    }

    pub fn with_record_id(mut self, id: impl Into<String>) -> Self {
        self.record_id = Some(id.into());
        self
    }
}

/// Why a payload was stubbed instead of fully normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StubReason {
    #[error("payload string is not valid JSON: {0}")]
    MalformedJson(String),
}

/// Discriminated normalization result. The public contract always yields a
/// usable record; the distinction exists for logging and metrics only.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    Full(OpportunityRecord),
    Stub {
        record: OpportunityRecord,
        reason: StubReason,
    },
}

impl NormalizeOutcome {
    pub fn record(&self) -> &OpportunityRecord {
        match self {
            NormalizeOutcome::Full(record) => record,
            NormalizeOutcome::Stub { record, .. } => record,
        }
    }

    pub fn into_record(self) -> OpportunityRecord {
        match self {
            NormalizeOutcome::Full(record) => record,
            NormalizeOutcome::Stub { record, .. } => record,
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, NormalizeOutcome::Stub { .. })
    }
}

/// Per-type estimate band. `roi_low..=roi_high` is the heuristic ROI range;
/// the representative value handed out is the integer midpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EstimateBand {
    pub roi_low: u8,
    pub roi_high: u8,
    pub income_potential: String,
    pub startup_cost: String,
    pub time_to_first_revenue: String,
    pub default_skill_gap_days: u32,
}

impl EstimateBand {
    pub fn roi_midpoint(&self) -> u8 {
        ((self.roi_low as u16 + self.roi_high as u16) / 2) as u8
    }
}

fn band(
    roi_low: u8,
    roi_high: u8,
    income: &str,
    startup: &str,
    time: &str,
    skill_gap_days: u32,
) -> EstimateBand {
    EstimateBand {
        roi_low,
        roi_high,
        income_potential: income.to_string(),
        startup_cost: startup.to_string(),
        time_to_first_revenue: time.to_string(),
        default_skill_gap_days: skill_gap_days,
    }
}

#[derive(Debug, Error)]
pub enum TableError {
    #[error("parsing estimate table yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown estimate band `{0}`")]
    UnknownBand(String),
}

#[derive(Debug, Clone, Deserialize)]
struct BandOverridesFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    bands: BTreeMap<String, EstimateBand>,
}

/// Immutable estimate configuration, constructed once and passed by
/// reference into [`estimate`] and [`normalize`]. Ships built-in defaults
/// matching the business rules in use; individual bands can be replaced from
/// a YAML rules file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimateTable {
    freelance: EstimateBand,
    digital_product: EstimateBand,
    content_creation: EstimateBand,
    service_based: EstimateBand,
    passive_income: EstimateBand,
    fallback: EstimateBand,
}

impl Default for EstimateTable {
    fn default() -> Self {
        Self {
            freelance: band(65, 75, "$1,000–$5,000", "$0–$100", "2–4 weeks", 7),
            digital_product: band(70, 90, "$500–$10,000", "$100–$1,000", "1–3 months", 21),
            content_creation: band(60, 75, "$200–$3,000", "$0–$500", "2–6 weeks", 14),
            service_based: band(70, 80, "$1,000–$8,000", "$100–$2,000", "1–2 weeks", 10),
            passive_income: band(55, 80, "$100–$2,000", "$500–$5,000", "3–6 months", 30),
            fallback: band(60, 80, "$500–$5,000", "$0–$500", "~30 days", 14),
        }
    }
}

impl EstimateTable {
    /// Band for a type. Types without a dedicated row (currently
    /// `InfoProduct`) share the generic fallback band.
    pub fn band(&self, ty: OpportunityType) -> &EstimateBand {
        match ty {
            OpportunityType::Freelance => &self.freelance,
            OpportunityType::DigitalProduct => &self.digital_product,
            OpportunityType::ContentCreation => &self.content_creation,
            OpportunityType::ServiceBased => &self.service_based,
            OpportunityType::PassiveIncome => &self.passive_income,
            OpportunityType::InfoProduct => &self.fallback,
        }
    }

    fn band_mut(&mut self, key: &str) -> Option<&mut EstimateBand> {
        match key {
            "freelance" => Some(&mut self.freelance),
            "digital_product" => Some(&mut self.digital_product),
            "content_creation" => Some(&mut self.content_creation),
            "service_based" => Some(&mut self.service_based),
            "passive_income" => Some(&mut self.passive_income),
            "default" => Some(&mut self.fallback),
            _ => None,
        }
    }

    /// Overlay bands from a YAML rules document onto the built-in defaults.
    /// Bands absent from the file keep their default values.
    pub fn from_yaml_str(text: &str) -> Result<Self, TableError> {
        let file: BandOverridesFile = serde_yaml::from_str(text)?;
        let mut table = Self::default();
        for (key, override_band) in file.bands {
            match table.band_mut(&key) {
                Some(slot) => *slot = override_band,
                None => return Err(TableError::UnknownBand(key)),
            }
        }
        Ok(table)
    }
}

/// Estimates produced for fields a payload left blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Estimates {
    pub roi_score: u8,
    pub income_potential: String,
    pub startup_cost: String,
    pub time_to_first_revenue: String,
    pub skill_gap_days: u32,
}

/// Deterministic, table-driven estimate lookup. `required_skills` is assumed
/// deduplicated; a non-empty list drives the skill-gap formula
/// `3 × |skills| + 2`, an empty one falls back to the band default.
pub fn estimate(
    ty: OpportunityType,
    required_skills: &[String],
    table: &EstimateTable,
) -> Estimates {
    let band = table.band(ty);
    let skill_gap_days = if required_skills.is_empty() {
        band.default_skill_gap_days
    } else {
        required_skills.len() as u32 * 3 + 2
    };
    Estimates {
        roi_score: band.roi_midpoint(),
        income_potential: band.income_potential.clone(),
        startup_cost: band.startup_cost.clone(),
        time_to_first_revenue: band.time_to_first_revenue.clone(),
        skill_gap_days,
    }
}

/// Substring containment rules, tested in this order after the exact-token
/// table misses. Order matters: "productized service" is a DigitalProduct
/// because the digital/product rule outranks the service rule.
const TYPE_KEYWORD_RULES: &[(&[&str], OpportunityType)] = &[
    (&["freelance", "consulting"], OpportunityType::Freelance),
    (&["digital", "product"], OpportunityType::DigitalProduct),
    (
        &["content", "creation", "blog"],
        OpportunityType::ContentCreation,
    ),
    (&["service"], OpportunityType::ServiceBased),
    (&["passive"], OpportunityType::PassiveIncome),
    (&["info", "course"], OpportunityType::InfoProduct),
];

fn exact_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Total type classification over free-form and enum-coded type strings.
///
/// Exact tokens match first with every non-alphanumeric stripped, which
/// covers `FREELANCING`, `PASSIVE_INCOME`, and the canonical display strings
/// alike; the keyword rules then catch free text, and anything left is
/// `Freelance`.
pub fn classify_type(raw: Option<&str>) -> OpportunityType {
    let Some(raw) = raw else {
        return OpportunityType::Freelance;
    };

    match exact_token(raw).as_str() {
        "" => return OpportunityType::Freelance,
        "freelance" | "freelancing" => return OpportunityType::Freelance,
        "digitalproduct" => return OpportunityType::DigitalProduct,
        "content" | "contentcreation" => return OpportunityType::ContentCreation,
        "service" | "servicebased" => return OpportunityType::ServiceBased,
        "passive" | "passiveincome" => return OpportunityType::PassiveIncome,
        "infoproduct" => return OpportunityType::InfoProduct,
        _ => {}
    }

    let lower = raw.to_lowercase();
    for (needles, ty) in TYPE_KEYWORD_RULES {
        if needles.iter().any(|needle| lower.contains(needle)) {
            return *ty;
        }
    }
    OpportunityType::Freelance
}

fn text_or_none(value: String) -> Option<String> {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        obj.get(*key)
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .and_then(text_or_none)
    })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn string_vec(obj: &Map<String, Value>, key: &str) -> Option<Vec<String>> {
    let arr = obj.get(key)?.as_array()?;
    Some(
        arr.iter()
            .filter_map(|el| el.as_str().map(ToString::to_string).and_then(text_or_none))
            .collect(),
    )
}

fn struct_vec<T>(obj: &Map<String, Value>, key: &str) -> Vec<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    obj.get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|el| serde_json::from_value(el.clone()).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default()
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn default_steps() -> Vec<String> {
    DEFAULT_STEPS.iter().map(ToString::to_string).collect()
}

fn derived_record_id(title: &str, ingested_at: DateTime<Utc>) -> String {
    let seed = format!("{}:{}", title, ingested_at.to_rfc3339());
    Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes()).to_string()
}

fn stub_title(ctx: &NormalizeContext) -> String {
    ctx.fallback_title
        .clone()
        .and_then(text_or_none)
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

fn stub_record(ctx: &NormalizeContext, table: &EstimateTable) -> OpportunityRecord {
    let defaults = estimate(OpportunityType::Freelance, &[], table);
    let title = stub_title(ctx);
    OpportunityRecord {
        id: ctx
            .record_id
            .clone()
            .unwrap_or_else(|| derived_record_id(&title, ctx.ingested_at)),
        title,
        ty: OpportunityType::Freelance,
        description: STUB_DESCRIPTION.to_string(),
        income_potential: defaults.income_potential,
        startup_cost: defaults.startup_cost,
        risk_level: RiskLevel::default(),
        steps_to_start: default_steps(),
        resources: Vec::new(),
        success_stories: Vec::new(),
        roi_score: defaults.roi_score,
        time_to_first_revenue: defaults.time_to_first_revenue,
        skill_gap_days: defaults.skill_gap_days,
        required_skills: Vec::new(),
        skills: Vec::new(),
        created_at: ctx.ingested_at,
    }
}

fn record_from_object(
    obj: &Map<String, Value>,
    ctx: &NormalizeContext,
    table: &EstimateTable,
) -> OpportunityRecord {
    let title = first_text(obj, &["title"])
        .or_else(|| ctx.fallback_title.clone().and_then(text_or_none))
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());

    let description = first_text(obj, &["description", "howItWorks", "details"])
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

    let raw_type = obj
        .get("type")
        .and_then(scalar_string)
        .and_then(text_or_none)
        .or_else(|| ctx.fallback_type.clone().and_then(text_or_none));
    let ty = classify_type(raw_type.as_deref());

    let required_skills =
        dedup_preserving_order(string_vec(obj, "requiredSkills").unwrap_or_default());
    let skills = dedup_preserving_order(string_vec(obj, "skills").unwrap_or_default());

    let defaults = estimate(ty, &required_skills, table);

    let roi_score = number_field(obj, "roiScore")
        .map(|v| v.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(defaults.roi_score);
    let skill_gap_days = number_field(obj, "skillGapDays")
        .map(|v| v.round().max(0.0) as u32)
        .unwrap_or(defaults.skill_gap_days);
    let income_potential =
        first_text(obj, &["incomePotential"]).unwrap_or(defaults.income_potential);
    let startup_cost = first_text(obj, &["startupCost"]).unwrap_or(defaults.startup_cost);
    let time_to_first_revenue =
        first_text(obj, &["timeToFirstRevenue"]).unwrap_or(defaults.time_to_first_revenue);

    let risk_level = first_text(obj, &["riskLevel"])
        .and_then(|label| RiskLevel::from_label(&label))
        .unwrap_or_default();

    let steps_to_start = match string_vec(obj, "stepsToStart") {
        Some(steps) if !steps.is_empty() => steps,
        _ => default_steps(),
    };

    let resources: Vec<Resource> = struct_vec(obj, "resources");
    let success_stories: Vec<SuccessStory> = struct_vec(obj, "successStories");

    let created_at = first_text(obj, &["createdAt"])
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(ctx.ingested_at);

    let id = obj
        .get("id")
        .and_then(scalar_string)
        .and_then(text_or_none)
        .or_else(|| ctx.record_id.clone().and_then(text_or_none))
        .unwrap_or_else(|| derived_record_id(&title, ctx.ingested_at));

    OpportunityRecord {
        id,
        title,
        ty,
        description,
        income_potential,
        startup_cost,
        risk_level,
        steps_to_start,
        resources,
        success_stories,
        roi_score,
        time_to_first_revenue,
        skill_gap_days,
        required_skills,
        skills,
        created_at,
    }
}

/// Normalize one raw payload, keeping the full/stub distinction visible.
pub fn normalize_checked(
    raw: &Value,
    ctx: &NormalizeContext,
    table: &EstimateTable,
) -> NormalizeOutcome {
    let obj = match raw {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                debug!(kind = ?other, "payload string decodes to a non-object; using defaults");
                Map::new()
            }
            Err(err) => {
                warn!(error = %err, "payload string is not valid JSON; producing stub record");
                return NormalizeOutcome::Stub {
                    record: stub_record(ctx, table),
                    reason: StubReason::MalformedJson(err.to_string()),
                };
            }
        },
        Value::Object(map) => map.clone(),
        _ => {
            debug!("payload is neither string nor object; using defaults");
            Map::new()
        }
    };
    NormalizeOutcome::Full(record_from_object(&obj, ctx, table))
}

/// Normalize one raw payload into a canonical record. Never fails: malformed
/// input degrades to a stub record per the recovery rules.
pub fn normalize(raw: &Value, ctx: &NormalizeContext, table: &EstimateTable) -> OpportunityRecord {
    normalize_checked(raw, ctx, table).into_record()
}

/// Normalize a batch of independent payloads. Each element is one raw
/// payload; outcomes keep the full/stub distinction for callers that report
/// ingest quality.
pub fn normalize_batch(
    payloads: &[Value],
    ctx: &NormalizeContext,
    table: &EstimateTable,
) -> Vec<NormalizeOutcome> {
    payloads
        .iter()
        .map(|payload| normalize_checked(payload, ctx, table))
        .collect()
}
