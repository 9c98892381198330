//! Classification of raw fetch results into an aggregate report.
//!
//! One streaming pass over the fetch results: successful payloads are
//! flattened into a single record stream, each record is stamped with its
//! owning project, and independent histograms are tallied along the way.
//! Failed fetches are carried through into the error list untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::fetch::FetchResult;

/// One flagged function occurrence, stamped with its owning project.
///
/// The upstream record shape is open-ended, so everything beyond the project
/// back-reference is kept as a raw field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Owning project identifier.
    pub project_id: String,
    /// All upstream-provided fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl FunctionRecord {
    /// Build a record, stamping the project id. An upstream `project_id`
    /// field is discarded so the back-reference always wins.
    pub fn new(project_id: &str, mut fields: Map<String, Value>) -> Self {
        fields.remove("project_id");
        Self {
            project_id: project_id.to_string(),
            fields,
        }
    }

    /// Severity tag, `"unknown"` when absent.
    pub fn severity(&self) -> String {
        self.tally_key("severity")
    }

    /// Type tag, `"unknown"` when absent.
    pub fn kind(&self) -> String {
        self.tally_key("type")
    }

    /// Rule tag: `rule`, falling back to `ruleId`, falling back to
    /// `"unknown"`.
    pub fn rule(&self) -> String {
        match self.fields.get("rule").or_else(|| self.fields.get("ruleId")) {
            Some(value) => tag_text(value),
            None => "unknown".to_string(),
        }
    }

    fn tally_key(&self, key: &str) -> String {
        match self.fields.get(key) {
            Some(value) => tag_text(value),
            None => "unknown".to_string(),
        }
    }
}

fn tag_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "unknown".to_string(),
        other => other.to_string(),
    }
}

/// Headline counters for one classification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Summary {
    /// Number of projects in the input batch.
    pub total_projects: usize,
    /// Projects whose fetch succeeded.
    pub successful_projects: usize,
    /// Projects whose fetch failed.
    pub failed_projects: usize,
    /// Total flagged function records across all successful projects.
    pub total_function_count: usize,
}

/// A project whose fetch failed, carried through classification unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProjectFailure {
    /// Identifier of the failed project.
    pub project_id: String,
    /// Failure description from the fetch layer.
    pub error: String,
}

/// Aggregate statistics built once per run and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    /// When the classification ran.
    pub generated_at: DateTime<Utc>,
    /// Headline counters.
    pub summary: Summary,
    /// Record count per severity tag.
    pub by_severity: BTreeMap<String, u64>,
    /// Record count per type tag.
    pub by_type: BTreeMap<String, u64>,
    /// Record count per rule tag.
    pub by_rule: BTreeMap<String, u64>,
    /// Record count per project (successful projects only).
    pub by_project: BTreeMap<String, u64>,
    /// Every record found, in input order.
    pub all_records: Vec<FunctionRecord>,
    /// Projects whose fetch failed.
    pub errors: Vec<ProjectFailure>,
}

impl AggregateReport {
    /// Fetch success rate in percent, zero for an empty batch.
    pub fn success_rate(&self) -> f64 {
        if self.summary.total_projects == 0 {
            0.0
        } else {
            self.summary.successful_projects as f64 / self.summary.total_projects as f64 * 100.0
        }
    }
}

/// The upstream listing shape is inconsistent: the record list appears under
/// `data`, under `data.list`, or under a top-level `list`. Decoded as an
/// explicit union with a fallback-to-empty branch.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordListing {
    Flat {
        data: Vec<Value>,
    },
    Nested {
        data: NestedRecords,
    },
    Bare {
        list: Vec<Value>,
    },
}

#[derive(Deserialize)]
struct NestedRecords {
    list: Vec<Value>,
}

/// Pull the record objects out of one upstream payload, tolerating every
/// known shape and returning an empty list for anything else.
pub(crate) fn record_objects(payload: &Value) -> Vec<Map<String, Value>> {
    let records = match RecordListing::deserialize(payload) {
        Ok(RecordListing::Flat { data }) => data,
        Ok(RecordListing::Nested { data }) => data.list,
        Ok(RecordListing::Bare { list }) => list,
        Err(_) => Vec::new(),
    };
    records
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

/// Classify a batch of fetch results into an [`AggregateReport`].
///
/// Single pass, O(total records) time. Classifying the same input twice
/// yields identical counters and records; only `generated_at` differs.
pub fn classify(results: &[FetchResult]) -> AggregateReport {
    let mut report = AggregateReport {
        generated_at: Utc::now(),
        summary: Summary {
            total_projects: results.len(),
            ..Summary::default()
        },
        by_severity: BTreeMap::new(),
        by_type: BTreeMap::new(),
        by_rule: BTreeMap::new(),
        by_project: BTreeMap::new(),
        all_records: Vec::new(),
        errors: Vec::new(),
    };

    for result in results {
        let Some(payload) = &result.payload else {
            report.summary.failed_projects += 1;
            report.errors.push(ProjectFailure {
                project_id: result.project_id.clone(),
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
            continue;
        };

        report.summary.successful_projects += 1;
        let records = record_objects(payload);
        report.summary.total_function_count += records.len();
        *report
            .by_project
            .entry(result.project_id.clone())
            .or_insert(0) += records.len() as u64;

        for fields in records {
            let record = FunctionRecord::new(&result.project_id, fields);
            *report.by_severity.entry(record.severity()).or_insert(0) += 1;
            *report.by_type.entry(record.kind()).or_insert(0) += 1;
            *report.by_rule.entry(record.rule()).or_insert(0) += 1;
            report.all_records.push(record);
        }
    }

    log::info!(
        "classified {} records from {} projects ({} failed)",
        report.summary.total_function_count,
        report.summary.total_projects,
        report.summary.failed_projects
    );
    report
}
