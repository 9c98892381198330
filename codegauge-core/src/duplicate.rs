//! Duplicate-function group model and batch summarizer.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::fetch::FetchResult;

/// A cluster of near-identical function implementations reported by the
/// duplicate listing API. Field names follow the upstream wire format;
/// anything the upstream omits decodes to its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DuplicateGroup {
    /// Representative name of the duplicated function.
    pub group_name: String,
    /// How many function copies the cluster contains.
    pub num_functions: u64,
    /// How many files the copies span.
    pub num_files: u64,
    /// Highest cyclomatic complexity among the copies.
    pub max_complexity: u64,
    /// Average line count of the copies.
    pub avg_lines: f64,
    /// Implementation language.
    pub language: String,
    /// Paths of the affected files.
    pub file_paths: Vec<String>,
    /// Author emails touching the cluster.
    pub emails: Vec<String>,
    /// Owning project, stamped during summarization.
    pub project_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DuplicatePayload {
    total: u64,
    data: Vec<Value>,
}

/// Per-project roll-up inside [`DuplicateStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProjectDuplicateSummary {
    /// Project identifier.
    pub project_id: String,
    /// Duplicate groups found in the project.
    pub groups: usize,
    /// Total duplicated function copies.
    pub functions: u64,
    /// Total affected files.
    pub files: u64,
}

/// Duplicate-group counts bucketed by maximum cyclomatic complexity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ComplexityBuckets {
    /// Complexity 1-3.
    pub low: u64,
    /// Complexity 4-7.
    pub medium: u64,
    /// Complexity 8 and up.
    pub high: u64,
}

/// Aggregate view over a batch of duplicate-listing fetch results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateStats {
    /// Projects in the batch.
    pub total_projects: usize,
    /// Projects whose fetch succeeded.
    pub successful_projects: usize,
    /// Projects whose fetch failed.
    pub failed_projects: usize,
    /// Successful projects reporting at least one duplicate.
    pub projects_with_duplicates: usize,
    /// Duplicate groups across all projects.
    pub total_groups: usize,
    /// Duplicated function copies across all groups.
    pub total_functions: u64,
    /// Files touched by any duplicate group.
    pub total_files: u64,
    /// Distinct author emails across all groups.
    pub distinct_authors: usize,
    /// Duplicated function count per language.
    pub language_distribution: BTreeMap<String, u64>,
    /// Group counts per complexity bucket.
    pub complexity: ComplexityBuckets,
    /// Largest groups first, capped at twenty.
    pub top_groups: Vec<DuplicateGroup>,
    /// Per-project roll-ups for projects that reported duplicates.
    pub projects: Vec<ProjectDuplicateSummary>,
}

const TOP_GROUPS: usize = 20;

/// Summarize a batch of duplicate-listing fetch results in one pass.
pub fn summarize_duplicates(results: &[FetchResult]) -> DuplicateStats {
    let mut stats = DuplicateStats {
        total_projects: results.len(),
        ..DuplicateStats::default()
    };
    let mut authors = BTreeSet::new();
    let mut all_groups: Vec<DuplicateGroup> = Vec::new();

    for result in results {
        let Some(payload) = &result.payload else {
            stats.failed_projects += 1;
            continue;
        };
        stats.successful_projects += 1;

        let parsed = DuplicatePayload::deserialize(payload).unwrap_or_default();
        if parsed.total > 0 {
            stats.projects_with_duplicates += 1;
        }

        let mut project_functions = 0;
        let mut project_files = 0;
        let mut project_groups = 0;
        for entry in parsed.data {
            let Ok(mut group) = DuplicateGroup::deserialize(&entry) else {
                continue;
            };
            group.project_id = result.project_id.clone();

            project_groups += 1;
            project_functions += group.num_functions;
            project_files += group.num_files;
            authors.extend(group.emails.iter().cloned());

            let language = if group.language.is_empty() {
                "Unknown".to_string()
            } else {
                group.language.clone()
            };
            *stats.language_distribution.entry(language).or_insert(0) += group.num_functions;

            match group.max_complexity {
                0..=3 => stats.complexity.low += 1,
                4..=7 => stats.complexity.medium += 1,
                _ => stats.complexity.high += 1,
            }

            all_groups.push(group);
        }

        stats.total_groups += project_groups;
        stats.total_functions += project_functions;
        stats.total_files += project_files;
        if project_groups > 0 {
            stats.projects.push(ProjectDuplicateSummary {
                project_id: result.project_id.clone(),
                groups: project_groups,
                functions: project_functions,
                files: project_files,
            });
        }
    }

    stats.distinct_authors = authors.len();
    all_groups.sort_by(|a, b| b.num_functions.cmp(&a.num_functions));
    all_groups.truncate(TOP_GROUPS);
    stats.top_groups = all_groups;
    stats
}

#[cfg(test)]
mod tests {
    use super::{DuplicateGroup, summarize_duplicates};
    use crate::fetch::FetchResult;
    use serde_json::json;

    fn group(name: &str, functions: u64, files: u64, complexity: u64) -> serde_json::Value {
        json!({
            "groupName": name,
            "numFunctions": functions,
            "numFiles": files,
            "maxComplexity": complexity,
            "avgLines": 12.5,
            "language": "Java",
            "filePaths": ["src/A.java"],
            "emails": ["dev@example.com"]
        })
    }

    #[test]
    fn summarize_counts_groups_and_authors() {
        let results = vec![
            FetchResult::success(
                "proj-a",
                json!({"total": 2, "data": [group("parse", 5, 3, 9), group("format", 2, 2, 2)]}),
            ),
            FetchResult::success("proj-b", json!({"total": 0, "data": []})),
            FetchResult::failure("proj-c", "timeout"),
        ];

        let stats = summarize_duplicates(&results);

        assert_eq!(stats.total_projects, 3);
        assert_eq!(stats.successful_projects, 2);
        assert_eq!(stats.failed_projects, 1);
        assert_eq!(stats.projects_with_duplicates, 1);
        assert_eq!(stats.total_groups, 2);
        assert_eq!(stats.total_functions, 7);
        assert_eq!(stats.total_files, 5);
        assert_eq!(stats.distinct_authors, 1);
        assert_eq!(stats.language_distribution.get("Java"), Some(&7));
        assert_eq!(stats.complexity.low, 1);
        assert_eq!(stats.complexity.high, 1);
        assert_eq!(stats.projects.len(), 1);
        assert_eq!(stats.projects[0].project_id, "proj-a");
    }

    #[test]
    fn top_groups_are_ranked_by_function_count() {
        let results = vec![
            FetchResult::success("a", json!({"total": 1, "data": [group("small", 2, 1, 1)]})),
            FetchResult::success("b", json!({"total": 1, "data": [group("big", 9, 4, 5)]})),
        ];

        let stats = summarize_duplicates(&results);

        assert_eq!(stats.top_groups.len(), 2);
        assert_eq!(stats.top_groups[0].group_name, "big");
        assert_eq!(stats.top_groups[0].project_id, "b");
        assert_eq!(stats.top_groups[1].group_name, "small");
    }

    #[test]
    fn lenient_decode_defaults_missing_fields() {
        let value = json!({"groupName": "orphan"});
        let group: DuplicateGroup = serde_json::from_value(value).expect("decode");

        assert_eq!(group.group_name, "orphan");
        assert_eq!(group.num_functions, 0);
        assert!(group.file_paths.is_empty());
    }

    #[test]
    fn malformed_payload_contributes_nothing() {
        let results = vec![FetchResult::success("weird", json!([1, 2, 3]))];
        let stats = summarize_duplicates(&results);

        assert_eq!(stats.successful_projects, 1);
        assert_eq!(stats.total_groups, 0);
    }
}
