//! OpenAPI specification for the CodeGauge server.

use utoipa::OpenApi;

use codegauge_core::{
    BranchResult, CombinedOutcome, CommitRecord, DuplicateGroup, DuplicateOutcome, ProjectFailure,
    ReportFile, Summary, UncommentedOutcome,
};

use crate::routes::{
    ErrorDetail, ErrorResponse, HealthResponse, ReportListResponse, StatusResponse,
    WeeklyGenerateRequest, WeeklyGenerateResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::status,
        crate::routes::run_uncommented_analysis,
        crate::routes::run_duplicate_analysis,
        crate::routes::run_all_analysis,
        crate::routes::list_reports,
        crate::routes::download_report,
        crate::routes::generate_weekly,
        crate::routes::list_weekly,
        crate::routes::download_weekly,
        crate::routes::openapi_json
    ),
    components(
        schemas(
            HealthResponse,
            StatusResponse,
            ErrorDetail,
            ErrorResponse,
            ReportListResponse,
            ReportFile,
            Summary,
            ProjectFailure,
            UncommentedOutcome,
            DuplicateOutcome,
            BranchResult,
            CombinedOutcome,
            DuplicateGroup,
            CommitRecord,
            WeeklyGenerateRequest,
            WeeklyGenerateResponse
        )
    ),
    tags(
        (name = "system", description = "Health and status probes"),
        (name = "analysis", description = "Code-quality analysis runs and reports"),
        (name = "weekly", description = "Weekly narrative reports")
    )
)]
/// OpenAPI specification for the CodeGauge server.
pub struct ApiDoc;
