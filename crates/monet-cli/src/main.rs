use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use monet_catalog::{classify, group_by_skill, query, CatalogRequest};
use monet_core::{OpportunityRecord, PriorityBucket};
use monet_normalize::{classify_type, normalize_batch, EstimateTable, NormalizeContext};
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "monet-cli")]
#[command(about = "MONET command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Normalize a raw payload file into canonical records.
    Normalize {
        /// Raw payload file: a JSON array of payloads, or a single payload.
        #[arg(long)]
        input: PathBuf,
        /// Write canonical records here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Optional estimate-band overrides (YAML).
        #[arg(long)]
        table: Option<PathBuf>,
    },
    /// Query a normalized records file the way a listing page would.
    Catalog {
        /// Canonical records file produced by `normalize`.
        #[arg(long)]
        input: PathBuf,
        /// Type filter; accepts the same lenient strings producers emit.
        #[arg(long, value_name = "TYPE")]
        r#type: Option<String>,
        /// Priority bucket filter ("quick win", "growth", ...).
        #[arg(long)]
        priority: Option<String>,
        /// Free-text search over title, description, and type.
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<usize>,
        #[arg(long)]
        per_page: Option<usize>,
    },
    /// Print a markdown summary of a normalized records file.
    Brief {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize {
            input,
            output,
            table,
        } => {
            let table = load_table(table.as_deref())?;
            let payloads = load_payloads(&input)?;
            let ctx = NormalizeContext::new(Utc::now());
            let outcomes = normalize_batch(&payloads, &ctx, &table);
            let stubs = outcomes.iter().filter(|o| o.is_stub()).count();
            let records: Vec<OpportunityRecord> =
                outcomes.into_iter().map(|o| o.into_record()).collect();

            let rendered =
                serde_json::to_string_pretty(&records).context("serializing canonical records")?;
            match &output {
                Some(path) => fs::write(path, rendered)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{rendered}"),
            }
            println!(
                "normalize complete: payloads={} records={} stubs={}",
                payloads.len(),
                records.len(),
                stubs
            );
        }
        Commands::Catalog {
            input,
            r#type,
            priority,
            search,
            page,
            per_page,
        } => {
            let records = load_records(&input)?;
            let request = CatalogRequest {
                ty: r#type.map(|label| classify_type(Some(&label))),
                priority: priority.map(|label| parse_priority(&label)).transpose()?,
                search,
                page,
                per_page,
            };
            let result = query(&records, &request);
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("serializing catalog page")?
            );
            println!(
                "catalog page {}/{}: {} of {} matches",
                result.page,
                result.total_pages,
                result.rows.len(),
                result.total_matches
            );
        }
        Commands::Brief { input } => {
            let records = load_records(&input)?;
            print!("{}", render_brief(&records, Utc::now()));
        }
    }

    Ok(())
}

fn load_table(path: Option<&Path>) -> Result<EstimateTable> {
    match path {
        None => Ok(EstimateTable::default()),
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            EstimateTable::from_yaml_str(&text)
                .with_context(|| format!("parsing {}", path.display()))
        }
    }
}

/// Load raw payloads: a top-level JSON array is a batch, anything else is a
/// single payload. Elements stay opaque; leniency is the engine's job.
fn load_payloads(path: &Path) -> Result<Vec<Value>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}

fn load_records(path: &Path) -> Result<Vec<OpportunityRecord>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn parse_priority(label: &str) -> Result<PriorityBucket> {
    match PriorityBucket::from_label(label) {
        Some(bucket) => Ok(bucket),
        None => bail!("unknown priority bucket `{label}`"),
    }
}

fn render_brief(records: &[OpportunityRecord], generated_at: DateTime<Utc>) -> String {
    let mut lines = vec![
        "# Opportunity Catalog Brief".to_string(),
        String::new(),
        format!("- Records: {}", records.len()),
        format!("- Generated: {}", generated_at.to_rfc3339()),
        String::new(),
        "## Priority Buckets".to_string(),
    ];
    for bucket in PriorityBucket::ALL {
        let count = records
            .iter()
            .filter(|record| classify(record) == bucket)
            .count();
        lines.push(format!("- {bucket}: {count}"));
    }

    lines.push(String::new());
    lines.push("## Skill Groups".to_string());
    for (skill, members) in group_by_skill(records) {
        lines.push(format!("- {}: {}", skill, members.len()));
    }
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use monet_normalize::normalize;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
            .single()
            .unwrap()
    }

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn payload_file_may_be_batch_or_single() {
        let batch = write_temp(r#"[{"title":"A"},{"title":"B"}]"#);
        assert_eq!(load_payloads(batch.path()).unwrap().len(), 2);

        let single = write_temp(r#"{"title":"A"}"#);
        assert_eq!(load_payloads(single.path()).unwrap().len(), 1);

        let broken = write_temp("{nope");
        assert!(load_payloads(broken.path()).is_err());
    }

    #[test]
    fn priority_labels_parse_leniently() {
        assert_eq!(
            parse_priority("quick win").unwrap(),
            PriorityBucket::QuickWin
        );
        assert_eq!(
            parse_priority("PASSIVE_INCOME").unwrap(),
            PriorityBucket::PassiveIncome
        );
        assert!(parse_priority("someday").is_err());
    }

    #[test]
    fn brief_counts_buckets_and_skill_groups() {
        let table = EstimateTable::default();
        let ctx = NormalizeContext::new(fixed_now());
        let records = vec![
            normalize(
                &json!({"id": "1", "title": "Templates", "type": "PASSIVE_INCOME", "skills": ["Design"]}),
                &ctx,
                &table,
            ),
            normalize(
                &json!({"id": "2", "title": "Retainers", "type": "freelancing", "skills": ["Writing", "Design"]}),
                &ctx,
                &table,
            ),
            normalize(&json!({"id": "3", "title": "Untagged"}), &ctx, &table),
        ];

        let brief = render_brief(&records, fixed_now());
        assert!(brief.contains("- Records: 3"));
        assert!(brief.contains("- Passive Income: 1"));
        assert!(brief.contains("- Growth: 2"));
        assert!(brief.contains("- Design: 2"));
        assert!(brief.contains("- Other: 1"));
    }

    #[test]
    fn normalized_records_round_trip_through_files() {
        let table = EstimateTable::default();
        let ctx = NormalizeContext::new(fixed_now());
        let records = vec![normalize(
            &json!({"id": "1", "title": "Retainers", "type": "SERVICE"}),
            &ctx,
            &table,
        )];
        let file = write_temp(&serde_json::to_string(&records).unwrap());
        let loaded = load_records(file.path()).unwrap();
        assert_eq!(loaded, records);
    }
}
