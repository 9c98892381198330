#![deny(missing_docs)]
//! CodeGauge core library.
//!
//! This crate contains the upstream API clients, classification pass, and
//! report rendering that power the CodeGauge reporting platform.

pub mod analysis;
pub mod artifacts;
pub mod classify;
pub mod duplicate;
pub mod error;
pub mod fetch;
pub mod http;
pub mod report;
pub mod settings;
pub mod weekly;

pub use analysis::{
    AnalysisService, BranchResult, CombinedOutcome, DuplicateOutcome, UncommentedOutcome,
};
pub use artifacts::{OutputStore, ReportFile};
pub use classify::{AggregateReport, FunctionRecord, ProjectFailure, Summary, classify};
pub use duplicate::{DuplicateGroup, DuplicateStats, summarize_duplicates};
pub use error::{CodeGaugeError, Result};
pub use fetch::{DuplicateFetcher, FetchResult, UncommentedFetcher, load_project_ids};
pub use http::{HttpClient, HttpClientConfig};
pub use report::{
    RenderOptions, render_duplicate_html, render_duplicate_text, render_html_report,
    render_text_report,
};
pub use settings::Settings;
pub use weekly::{ChatCompleter, CommitRecord, GlmChatClient, TapdClient, WeeklyReportGenerator};
