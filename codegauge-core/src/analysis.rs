//! Orchestration of the fetch, classify, and render pipelines.
//!
//! Fetch failures for single projects are absorbed into the aggregate
//! report; snapshot and render failures are logged and absorbed (the run
//! still counts as a success); missing configuration is fatal.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::artifacts::OutputStore;
use crate::classify::{AggregateReport, Summary, classify};
use crate::duplicate::summarize_duplicates;
use crate::error::{CodeGaugeError, Result};
use crate::fetch::{DuplicateFetcher, UncommentedFetcher, load_project_ids};
use crate::report::{
    RenderOptions, render_duplicate_html, render_duplicate_text, render_html_report,
    render_text_report,
};
use crate::settings::Settings;

/// Outcome of one uncommented-function analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UncommentedOutcome {
    /// Headline counters from classification.
    pub summary: Summary,
    /// Rendered console report.
    pub report_text: String,
    /// Path of the HTML report, when it was written.
    pub report_file: Option<String>,
    /// Path of the CSV export, when it was written.
    pub csv_file: Option<String>,
    /// Completion timestamp, RFC 3339.
    pub completed_at: String,
}

/// Outcome of one duplicate-function analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DuplicateOutcome {
    /// Projects in the batch.
    pub total: usize,
    /// Projects fetched successfully.
    pub successful: usize,
    /// Projects whose fetch failed.
    pub failed: usize,
    /// Rendered console report.
    pub report_text: String,
    /// Path of the HTML report, when it was written.
    pub report_file: Option<String>,
    /// Path of the CSV export, when it was written.
    pub csv_file: Option<String>,
    /// Completion timestamp, RFC 3339.
    pub completed_at: String,
}

/// Result of one branch inside a combined run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BranchResult {
    /// `success` or `failed`.
    pub status: String,
    /// Failure description when the branch failed.
    pub error: Option<String>,
    /// Path of the branch's HTML report, when it was written.
    pub report_file: Option<String>,
}

/// Outcome of a combined run over both analysis types. One branch failing
/// never hides the other.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CombinedOutcome {
    /// Uncommented-function branch.
    pub uncommented: BranchResult,
    /// Duplicate-function branch.
    pub duplicate: BranchResult,
    /// Completion timestamp, RFC 3339.
    pub completed_at: String,
}

/// High-level analysis entry points shared by the CLI, the REST service,
/// and the scheduler.
#[derive(Debug, Clone)]
pub struct AnalysisService {
    settings: Settings,
    store: OutputStore,
}

impl AnalysisService {
    /// Build a service from settings.
    pub fn new(settings: Settings) -> Self {
        let store = OutputStore::from_settings(&settings);
        Self { settings, store }
    }

    /// The artifact store backing this service.
    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    /// Presentation options derived from the settings.
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            top_n: self.settings.output.top_n,
            ..RenderOptions::default()
        }
    }

    /// Run the uncommented-function analysis end to end.
    pub fn run_uncommented(&self) -> Result<UncommentedOutcome> {
        log::info!("starting uncommented-function analysis");
        let fetcher = UncommentedFetcher::from_settings(&self.settings)?;
        let project_ids = load_project_ids(&self.settings.merico.project_ids_file)?;
        let results = fetcher.fetch_all(&project_ids);

        self.store.ensure()?;
        let stamp = OutputStore::timestamp();
        if self.settings.output.save_raw {
            soft_save(
                self.store
                    .save_json(&format!("raw_results_{stamp}.json"), &results),
                "raw snapshot",
            );
        }

        let report = classify(&results);
        if self.settings.output.save_classified {
            soft_save(
                self.store
                    .save_json(&format!("classified_results_{stamp}.json"), &report),
                "classified snapshot",
            );
        }

        let options = self.render_options();
        let text = render_text_report(&report, &options);
        soft_save(
            self.store
                .save_text(&format!("uncommented_functions_report_{stamp}.txt"), &text),
            "text report",
        );
        let report_file = soft_save(
            self.store.save_text(
                &format!("uncommented_functions_report_{stamp}.html"),
                &render_html_report(&report, &options),
            ),
            "html report",
        );
        let csv_file = soft_save(
            self.store.save_records_csv(
                &format!("uncommented_functions_export_{stamp}.csv"),
                &report.all_records,
            ),
            "csv export",
        );

        log::info!("uncommented-function analysis complete");
        Ok(UncommentedOutcome {
            summary: report.summary,
            report_text: text,
            report_file,
            csv_file,
            completed_at: Utc::now().to_rfc3339(),
        })
    }

    /// Run the duplicate-function analysis end to end.
    pub fn run_duplicate(&self) -> Result<DuplicateOutcome> {
        log::info!("starting duplicate-function analysis");
        let fetcher = DuplicateFetcher::from_settings(&self.settings)?;
        let project_ids = load_project_ids(&self.settings.merico.project_ids_file)?;
        let results = fetcher.fetch_all(&project_ids);

        self.store.ensure()?;
        let stamp = OutputStore::timestamp();
        if self.settings.output.save_raw {
            soft_save(
                self.store
                    .save_json(&format!("duplicate_functions_{stamp}.json"), &results),
                "raw snapshot",
            );
        }

        let stats = summarize_duplicates(&results);
        let options = self.render_options();
        let text = render_duplicate_text(&stats, &options);
        let report_file = soft_save(
            self.store.save_text(
                &format!("duplicate_functions_report_{stamp}.html"),
                &render_duplicate_html(&stats, &options),
            ),
            "html report",
        );
        let csv_file = soft_save(
            self.store.save_groups_csv(
                &format!("duplicate_functions_export_{stamp}.csv"),
                &stats.top_groups,
            ),
            "csv export",
        );

        log::info!("duplicate-function analysis complete");
        Ok(DuplicateOutcome {
            total: stats.total_projects,
            successful: stats.successful_projects,
            failed: stats.failed_projects,
            report_text: text,
            report_file,
            csv_file,
            completed_at: Utc::now().to_rfc3339(),
        })
    }

    /// Run both analyses, absorbing each branch's failure separately.
    pub fn run_all(&self) -> CombinedOutcome {
        log::info!("starting combined analysis");
        let uncommented = match self.run_uncommented() {
            Ok(outcome) => BranchResult {
                status: "success".to_string(),
                error: None,
                report_file: outcome.report_file,
            },
            Err(err) => {
                log::error!("uncommented-function analysis failed: {err}");
                BranchResult {
                    status: "failed".to_string(),
                    error: Some(err.to_string()),
                    report_file: None,
                }
            }
        };
        let duplicate = match self.run_duplicate() {
            Ok(outcome) => BranchResult {
                status: "success".to_string(),
                error: None,
                report_file: outcome.report_file,
            },
            Err(err) => {
                log::error!("duplicate-function analysis failed: {err}");
                BranchResult {
                    status: "failed".to_string(),
                    error: Some(err.to_string()),
                    report_file: None,
                }
            }
        };
        CombinedOutcome {
            uncommented,
            duplicate,
            completed_at: Utc::now().to_rfc3339(),
        }
    }

    /// Load a classified snapshot, either from an explicit path or the
    /// newest snapshot in the output directory.
    pub fn load_classified(&self, path: Option<&Path>) -> Result<AggregateReport> {
        let path: PathBuf = match path {
            Some(path) => path.to_path_buf(),
            None => self.store.latest_classified().ok_or_else(|| {
                CodeGaugeError::Config(format!(
                    "no classified snapshot found in {}",
                    self.store.output_dir().display()
                ))
            })?,
        };
        let contents = fs::read_to_string(&path).map_err(|err| {
            CodeGaugeError::Config(format!("cannot read snapshot {}: {err}", path.display()))
        })?;
        let report = serde_json::from_str(&contents).map_err(|err| {
            CodeGaugeError::Schema(format!("malformed snapshot {}: {err}", path.display()))
        })?;
        log::info!("loaded classified snapshot {}", path.display());
        Ok(report)
    }
}

fn soft_save(result: Result<PathBuf>, what: &str) -> Option<String> {
    match result {
        Ok(path) => Some(path.display().to_string()),
        Err(err) => {
            log::warn!("could not save {what}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AnalysisService;
    use crate::settings::Settings;
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;
    use std::path::PathBuf;

    static UNIQUE_COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    fn unique_dir() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        let counter = UNIQUE_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        std::env::temp_dir().join(format!("codegauge_analysis_test_{nanos}_{counter}"))
    }

    fn test_settings(root: &PathBuf, api_url: String, duplicate_url: String) -> Settings {
        let ids_file = root.join("project_ids.json");
        std::fs::create_dir_all(root).expect("create root");
        std::fs::write(&ids_file, r#"["proj-a", "proj-b"]"#).expect("write ids");

        let mut settings = Settings::default();
        settings.merico.api_url = api_url;
        settings.merico.duplicate_url = duplicate_url;
        settings.merico.token = "test-token".to_string();
        settings.merico.project_ids_file = ids_file;
        settings.request.retry_times = 1;
        settings.request.retry_delay_secs = 0.0;
        settings.request.batch_delay_secs = 0.0;
        settings.output.output_dir = root.join("output");
        settings
    }

    #[test]
    fn run_uncommented_writes_snapshots_and_reports() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/list");
            then.status(200).json_body(json!({
                "data": [{"severity": "high", "type": "api"}]
            }));
        });

        let root = unique_dir();
        let settings = test_settings(&root, server.url("/list"), String::new());
        let service = AnalysisService::new(settings);

        let outcome = service.run_uncommented().expect("outcome");

        assert_eq!(outcome.summary.total_projects, 2);
        assert_eq!(outcome.summary.successful_projects, 2);
        assert_eq!(outcome.summary.total_function_count, 2);
        assert!(outcome.report_text.contains("CodeGauge"));
        assert!(outcome.report_file.is_some());
        assert!(outcome.csv_file.is_some());

        let reports = service.store().list_reports(None).expect("list");
        assert_eq!(reports.len(), 1);
        assert!(service.store().latest_classified().is_some());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn run_uncommented_requires_configuration() {
        let root = unique_dir();
        let settings = test_settings(&root, String::new(), String::new());
        let service = AnalysisService::new(settings);

        assert!(service.run_uncommented().is_err());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn run_all_absorbs_single_branch_failures() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/list");
            then.status(200).json_body(json!({"data": []}));
        });

        let root = unique_dir();
        // duplicate_url left unset, so that branch fails on configuration
        let settings = test_settings(&root, server.url("/list"), String::new());
        let service = AnalysisService::new(settings);

        let outcome = service.run_all();

        assert_eq!(outcome.uncommented.status, "success");
        assert_eq!(outcome.duplicate.status, "failed");
        assert!(
            outcome
                .duplicate
                .error
                .as_deref()
                .unwrap_or("")
                .contains("duplicate_url")
        );

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn run_duplicate_summarizes_groups() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/dup");
            then.status(200).json_body(json!({
                "total": 1,
                "data": [{"groupName": "copy_me", "numFunctions": 3, "numFiles": 2, "maxComplexity": 5}]
            }));
        });

        let root = unique_dir();
        let settings = test_settings(&root, String::new(), server.url("/dup"));
        let service = AnalysisService::new(settings);

        let outcome = service.run_duplicate().expect("outcome");

        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.successful, 2);
        assert!(outcome.report_text.contains("copy_me"));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn load_classified_round_trips_a_snapshot() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/list");
            then.status(200).json_body(json!({"data": [{"severity": "low"}]}));
        });

        let root = unique_dir();
        let settings = test_settings(&root, server.url("/list"), String::new());
        let service = AnalysisService::new(settings);
        service.run_uncommented().expect("outcome");

        let report = service.load_classified(None).expect("snapshot");
        assert_eq!(report.summary.total_projects, 2);
        assert_eq!(report.all_records.len(), 2);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn load_classified_without_snapshot_is_a_config_error() {
        let root = unique_dir();
        let settings = test_settings(&root, String::new(), String::new());
        let service = AnalysisService::new(settings);
        service.store().ensure().expect("dirs");

        assert!(service.load_classified(None).is_err());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }
}
