//! Catalog-side logic: priority bucketing and listing queries over
//! normalized records.
//!
//! Everything here recomputes from the records it is handed. Priority
//! buckets and query results are derived values, never cached as record
//! state; the records slice is never mutated.

use std::collections::BTreeMap;

use monet_core::{OpportunityRecord, OpportunityType, PriorityBucket, RiskLevel};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "monet-catalog";

/// Group key for records that carry no usable skill tags.
pub const OTHER_GROUP: &str = "Other";

const DEFAULT_PER_PAGE: usize = 20;

/// Assign the display bucket for one record. Fixed precedence, first match
/// wins: the QuickWin bar outranks the PassiveIncome type rule, which in
/// turn outranks the skill-gap split between Aspirational and Growth.
pub fn classify(record: &OpportunityRecord) -> PriorityBucket {
    let quick_timing = record
        .time_to_first_revenue
        .to_lowercase()
        .contains("week");
    if record.roi_score > 80
        && record.risk_level == RiskLevel::Low
        && quick_timing
        && record.skill_gap_days < 14
    {
        return PriorityBucket::QuickWin;
    }
    if record.ty == OpportunityType::PassiveIncome {
        return PriorityBucket::PassiveIncome;
    }
    if record.skill_gap_days > 30 {
        return PriorityBucket::Aspirational;
    }
    PriorityBucket::Growth
}

fn skill_key(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

/// Fan-out grouping by skill tag: a record with skills `{A, B}` appears in
/// both group A and group B. Records with no non-empty skills land in
/// [`OTHER_GROUP`]. Within a group a record appears at most once, keyed by
/// `id`, even when its skill list repeats an entry. The `BTreeMap` keeps
/// group keys in lexicographic order.
pub fn group_by_skill(
    records: &[OpportunityRecord],
) -> BTreeMap<String, Vec<&OpportunityRecord>> {
    let mut groups: BTreeMap<String, Vec<&OpportunityRecord>> = BTreeMap::new();
    for record in records {
        let mut keys: Vec<String> = Vec::new();
        for skill in &record.skills {
            if let Some(key) = skill_key(skill) {
                if !keys.iter().any(|k| k.eq_ignore_ascii_case(&key)) {
                    keys.push(key);
                }
            }
        }
        if keys.is_empty() {
            keys.push(OTHER_GROUP.to_string());
        }
        for key in keys {
            let entry = groups.entry(key).or_default();
            if !entry.iter().any(|existing| existing.id == record.id) {
                entry.push(record);
            }
        }
    }
    groups
}

fn matches_query(record: &OpportunityRecord, needle: &str) -> bool {
    record.title.to_lowercase().contains(needle)
        || record.description.to_lowercase().contains(needle)
        || record.ty.as_str().to_lowercase().contains(needle)
}

/// Case-insensitive substring search OR-combined across title, description,
/// and the type display string. An empty query matches everything.
pub fn search<'a>(records: &'a [OpportunityRecord], query: &str) -> Vec<&'a OpportunityRecord> {
    let needle = query.trim().to_lowercase();
    records
        .iter()
        .filter(|record| needle.is_empty() || matches_query(record, &needle))
        .collect()
}

pub fn filter_by_type(
    records: &[OpportunityRecord],
    ty: OpportunityType,
) -> Vec<&OpportunityRecord> {
    records.iter().filter(|record| record.ty == ty).collect()
}

pub fn filter_by_priority(
    records: &[OpportunityRecord],
    bucket: PriorityBucket,
) -> Vec<&OpportunityRecord> {
    records
        .iter()
        .filter(|record| classify(record) == bucket)
        .collect()
}

/// Fixed-size 1-based pagination. Page 0 is treated as page 1; a page past
/// the end yields an empty slice (resetting to page 1 is the caller's UI
/// rule, not an engine rule).
pub fn paginate<T>(records: &[T], page: usize, page_size: usize) -> &[T] {
    if page_size == 0 {
        return &[];
    }
    let start = page.max(1).saturating_sub(1).saturating_mul(page_size);
    if start >= records.len() {
        return &[];
    }
    let end = (start + page_size).min(records.len());
    &records[start..end]
}

/// Listing-page query: optional type and priority filters, then search,
/// then pagination.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogRequest {
    #[serde(rename = "type")]
    pub ty: Option<OpportunityType>,
    pub priority: Option<PriorityBucket>,
    pub search: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub rows: Vec<OpportunityRecord>,
    pub page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
}

/// The composed view listing surfaces consume: filters compose before
/// search, search before pagination.
pub fn query(records: &[OpportunityRecord], request: &CatalogRequest) -> CatalogPage {
    let needle = request
        .search
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    let filtered: Vec<&OpportunityRecord> = records
        .iter()
        .filter(|record| request.ty.map_or(true, |ty| record.ty == ty))
        .filter(|record| {
            request
                .priority
                .map_or(true, |bucket| classify(record) == bucket)
        })
        .filter(|record| needle.is_empty() || matches_query(record, &needle))
        .collect();

    let per_page = request.per_page.unwrap_or(DEFAULT_PER_PAGE).max(1);
    let total_matches = filtered.len();
    let total_pages = filtered.len().max(1).div_ceil(per_page);
    let page = request.page.unwrap_or(1).max(1);
    let rows = paginate(&filtered, page, per_page)
        .iter()
        .map(|record| (*record).clone())
        .collect();

    CatalogPage {
        rows,
        page,
        total_pages,
        total_matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use monet_core::RiskLevel;

    fn mk_record(id: &str, title: &str, ty: OpportunityType) -> OpportunityRecord {
        OpportunityRecord {
            id: id.to_string(),
            title: title.to_string(),
            ty,
            description: format!("{title} description"),
            income_potential: "$1,000–$5,000".to_string(),
            startup_cost: "$0–$100".to_string(),
            risk_level: RiskLevel::Medium,
            steps_to_start: vec!["step".to_string()],
            resources: vec![],
            success_stories: vec![],
            roi_score: 70,
            time_to_first_revenue: "2–4 weeks".to_string(),
            skill_gap_days: 7,
            required_skills: vec![],
            skills: vec![],
            created_at: Utc
                .with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
                .single()
                .unwrap(),
        }
    }

    #[test]
    fn quick_win_requires_all_four_conditions() {
        let mut record = mk_record("q1", "Fast Retainers", OpportunityType::Freelance);
        record.roi_score = 85;
        record.risk_level = RiskLevel::Low;
        record.time_to_first_revenue = "2-4 weeks".to_string();
        record.skill_gap_days = 10;
        assert_eq!(classify(&record), PriorityBucket::QuickWin);

        let mut slow = record.clone();
        slow.time_to_first_revenue = "3–6 months".to_string();
        assert_eq!(classify(&slow), PriorityBucket::Growth);

        let mut risky = record.clone();
        risky.risk_level = RiskLevel::Medium;
        assert_eq!(classify(&risky), PriorityBucket::Growth);

        let mut gapped = record.clone();
        gapped.skill_gap_days = 14;
        assert_eq!(classify(&gapped), PriorityBucket::Growth);
    }

    #[test]
    fn quick_win_outranks_passive_income_type() {
        let mut record = mk_record("p1", "Template Shop", OpportunityType::PassiveIncome);
        record.roi_score = 85;
        record.risk_level = RiskLevel::Low;
        record.time_to_first_revenue = "1–2 weeks".to_string();
        record.skill_gap_days = 5;
        assert_eq!(classify(&record), PriorityBucket::QuickWin);
    }

    #[test]
    fn passive_income_outranks_aspirational_and_growth() {
        let mut record = mk_record("p2", "Dividend Portfolio", OpportunityType::PassiveIncome);
        record.skill_gap_days = 45;
        assert_eq!(classify(&record), PriorityBucket::PassiveIncome);
    }

    #[test]
    fn aspirational_above_thirty_gap_days_else_growth() {
        let mut record = mk_record("a1", "Game Studio", OpportunityType::DigitalProduct);
        record.skill_gap_days = 31;
        assert_eq!(classify(&record), PriorityBucket::Aspirational);
        record.skill_gap_days = 30;
        assert_eq!(classify(&record), PriorityBucket::Growth);
    }

    #[test]
    fn group_by_skill_fans_out_without_partitioning() {
        let mut a = mk_record("a", "A", OpportunityType::Freelance);
        a.skills = vec!["Writing".to_string(), "SEO".to_string()];
        let mut b = mk_record("b", "B", OpportunityType::Freelance);
        b.skills = vec!["Writing".to_string()];
        let c = mk_record("c", "C", OpportunityType::Freelance);

        let records = vec![a, b, c];
        let groups = group_by_skill(&records);

        let keys: Vec<&String> = groups.keys().collect();
        assert_eq!(keys, vec!["Other", "SEO", "Writing"]);
        assert_eq!(groups["Writing"].len(), 2);
        assert_eq!(groups["SEO"].len(), 1);
        assert_eq!(groups["Other"].len(), 1);
        assert_eq!(groups["Other"][0].id, "c");
    }

    #[test]
    fn group_by_skill_deduplicates_by_record_id() {
        let mut a = mk_record("a", "A", OpportunityType::Freelance);
        a.skills = vec![
            "Writing".to_string(),
            "writing".to_string(),
            " Writing ".to_string(),
        ];
        let groups = group_by_skill(std::slice::from_ref(&a));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["Writing"].len(), 1);
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let records = vec![
            mk_record("1", "Stock Photo Library", OpportunityType::DigitalProduct),
            mk_record("2", "Lawn Care", OpportunityType::ServiceBased),
        ];

        let hits = search(&records, "PHOTO");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");

        // matches the type display string too
        let hits = search(&records, "service-based");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "2");

        // empty query matches everything
        assert_eq!(search(&records, "  ").len(), 2);
    }

    #[test]
    fn pagination_slices_exactly_and_never_fails() {
        let records: Vec<OpportunityRecord> = (0..25)
            .map(|i| mk_record(&format!("r{i}"), &format!("R{i}"), OpportunityType::Freelance))
            .collect();

        assert_eq!(paginate(&records, 1, 10).len(), 10);
        assert_eq!(paginate(&records, 2, 10).len(), 10);
        assert_eq!(paginate(&records, 3, 10).len(), 5);
        assert!(paginate(&records, 4, 10).is_empty());
        assert_eq!(paginate(&records, 0, 10).len(), 10); // page 0 acts as page 1
        assert!(paginate(&records, 1, 0).is_empty());

        // concatenating the pages reproduces the list
        let mut rebuilt = Vec::new();
        for page in 1..=3 {
            rebuilt.extend(paginate(&records, page, 10).iter().map(|r| r.id.clone()));
        }
        let original: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn composed_query_filters_before_search_before_pagination() {
        let mut records: Vec<OpportunityRecord> = (0..6)
            .map(|i| {
                mk_record(
                    &format!("f{i}"),
                    &format!("Freelance Gig {i}"),
                    OpportunityType::Freelance,
                )
            })
            .collect();
        records.push(mk_record(
            "d0",
            "Freelance-sounding Digital Kit",
            OpportunityType::DigitalProduct,
        ));

        let request = CatalogRequest {
            ty: Some(OpportunityType::Freelance),
            priority: None,
            search: Some("gig".to_string()),
            page: Some(2),
            per_page: Some(4),
        };
        let page = query(&records, &request);
        assert_eq!(page.total_matches, 6);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.page, 2);
        assert_eq!(page.rows.len(), 2);
        assert!(page.rows.iter().all(|r| r.ty == OpportunityType::Freelance));
    }

    #[test]
    fn out_of_range_query_page_returns_empty_rows() {
        let records = vec![mk_record("1", "Only", OpportunityType::Freelance)];
        let request = CatalogRequest {
            page: Some(9),
            ..CatalogRequest::default()
        };
        let page = query(&records, &request);
        assert!(page.rows.is_empty());
        assert_eq!(page.page, 9);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn priority_filter_recomputes_buckets_per_record() {
        let mut quick = mk_record("q", "Quick", OpportunityType::Freelance);
        quick.roi_score = 90;
        quick.risk_level = RiskLevel::Low;
        quick.skill_gap_days = 3;
        let passive = {
            let mut r = mk_record("p", "Passive", OpportunityType::PassiveIncome);
            r.time_to_first_revenue = "3–6 months".to_string();
            r
        };
        let records = vec![quick, passive];

        let quick_wins = filter_by_priority(&records, PriorityBucket::QuickWin);
        assert_eq!(quick_wins.len(), 1);
        assert_eq!(quick_wins[0].id, "q");

        let passives = filter_by_priority(&records, PriorityBucket::PassiveIncome);
        assert_eq!(passives.len(), 1);
        assert_eq!(passives[0].id, "p");
    }
}
