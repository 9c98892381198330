//! HTTP handlers for the CodeGauge server.

use std::fs;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, Responder, get, post, web};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use codegauge_core::error::CodeGaugeError;
use codegauge_core::{
    AnalysisService, CombinedOutcome, DuplicateOutcome, OutputStore, ReportFile, Settings,
    UncommentedOutcome, WeeklyReportGenerator,
};

use crate::openapi::ApiDoc;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loaded pipeline settings.
    pub settings: Settings,
}

/// Health probe payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service health indicator.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Response timestamp, RFC 3339.
    pub timestamp: String,
}

/// Service status payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// Environment label.
    pub env: String,
    /// Whether the daily scheduler is enabled.
    pub schedule_enabled: bool,
    /// Daily run time (`HH:MM`, local).
    pub schedule_time: String,
    /// Output directory for generated artifacts.
    pub output_dir: String,
    /// Response timestamp, RFC 3339.
    pub timestamp: String,
}

/// Detail inside an error envelope.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Uniform error envelope returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Error detail.
    pub error: ErrorDetail,
    /// Response timestamp, RFC 3339.
    pub timestamp: String,
}

/// Report listing payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportListResponse {
    /// Report files, newest first.
    pub reports: Vec<ReportFile>,
    /// Number of reports listed.
    pub total: usize,
}

/// Query parameters for the report listing.
#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    /// Report family filter (`uncommented`, `duplicate`, `all`).
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Request payload for weekly report generation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WeeklyGenerateRequest {
    /// Entity (task/ticket) identifier.
    pub entity_id: String,
    /// Workspace identifier.
    pub workspace_id: String,
    /// Caller-supplied prompt override.
    pub custom_prompt: Option<String>,
    /// Whether to persist the report as Markdown (default true).
    pub save_to_file: Option<bool>,
}

/// Response payload for weekly report generation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WeeklyGenerateResponse {
    /// Generated prose report.
    pub report: String,
    /// Path of the saved Markdown file, when persisted.
    pub file_path: Option<String>,
    /// Completion timestamp, RFC 3339.
    pub completed_at: String,
}

pub(crate) fn error_response(status: StatusCode, code: &str, message: String) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        success: false,
        error: ErrorDetail {
            code: code.to_string(),
            message,
        },
        timestamp: Utc::now().to_rfc3339(),
    })
}

fn core_error_response(err: &CodeGaugeError) -> HttpResponse {
    let (status, code) = match err {
        CodeGaugeError::Transport(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE"),
        CodeGaugeError::Application { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
        CodeGaugeError::Schema(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_SCHEMA_ERROR"),
        CodeGaugeError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
        CodeGaugeError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RENDER_ERROR"),
        CodeGaugeError::Io(_) | CodeGaugeError::Json(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };
    error_response(status, code, err.to_string())
}

/// Run blocking pipeline work off the actix worker threads.
async fn run_blocking<T, F>(task: F) -> Result<T, HttpResponse>
where
    T: Send + 'static,
    F: FnOnce() -> codegauge_core::Result<T> + Send + 'static,
{
    match web::block(task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            log::error!("request failed: {err}");
            Err(core_error_response(&err))
        }
        Err(err) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            format!("blocking task failed: {err}"),
        )),
    }
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
#[get("/api/health")]
/// Liveness probe.
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "codegauge".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Service status", body = StatusResponse)
    ),
    tag = "system"
)]
#[get("/api/status")]
/// Service status summary.
pub async fn status(state: web::Data<AppState>) -> impl Responder {
    let settings = &state.settings;
    HttpResponse::Ok().json(StatusResponse {
        env: settings.env.clone(),
        schedule_enabled: settings.schedule.enabled,
        schedule_time: format!("{:02}:{:02}", settings.schedule.hour, settings.schedule.minute),
        output_dir: settings.output.output_dir.display().to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    post,
    path = "/api/analysis/uncommented/run",
    responses(
        (status = 200, description = "Analysis finished", body = UncommentedOutcome),
        (status = 502, description = "Upstream failure", body = ErrorResponse),
        (status = 500, description = "Internal failure", body = ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/api/analysis/uncommented/run")]
/// Run the uncommented-function analysis.
pub async fn run_uncommented_analysis(state: web::Data<AppState>) -> impl Responder {
    let settings = state.settings.clone();
    match run_blocking(move || AnalysisService::new(settings).run_uncommented()).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(response) => response,
    }
}

#[utoipa::path(
    post,
    path = "/api/analysis/duplicate/run",
    responses(
        (status = 200, description = "Analysis finished", body = DuplicateOutcome),
        (status = 502, description = "Upstream failure", body = ErrorResponse),
        (status = 500, description = "Internal failure", body = ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/api/analysis/duplicate/run")]
/// Run the duplicate-function analysis.
pub async fn run_duplicate_analysis(state: web::Data<AppState>) -> impl Responder {
    let settings = state.settings.clone();
    match run_blocking(move || AnalysisService::new(settings).run_duplicate()).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(response) => response,
    }
}

#[utoipa::path(
    post,
    path = "/api/analysis/all/run",
    responses(
        (status = 200, description = "Combined analysis finished", body = CombinedOutcome),
        (status = 500, description = "Internal failure", body = ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/api/analysis/all/run")]
/// Run both analyses; each branch's failure is reported in place.
pub async fn run_all_analysis(state: web::Data<AppState>) -> impl Responder {
    let settings = state.settings.clone();
    match run_blocking(move || Ok(AnalysisService::new(settings).run_all())).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(response) => response,
    }
}

#[utoipa::path(
    get,
    path = "/api/analysis/reports",
    responses(
        (status = 200, description = "Generated reports", body = ReportListResponse),
        (status = 500, description = "Internal failure", body = ErrorResponse)
    ),
    tag = "analysis"
)]
#[get("/api/analysis/reports")]
/// List generated analysis reports, newest first.
pub async fn list_reports(
    state: web::Data<AppState>,
    query: web::Query<ReportListQuery>,
) -> impl Responder {
    let store = OutputStore::from_settings(&state.settings);
    match store.list_reports(query.kind.as_deref()) {
        Ok(reports) => HttpResponse::Ok().json(ReportListResponse {
            total: reports.len(),
            reports,
        }),
        Err(err) => core_error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/analysis/reports/{filename}",
    responses(
        (status = 200, description = "Report contents"),
        (status = 400, description = "Invalid file name", body = ErrorResponse),
        (status = 404, description = "Report not found", body = ErrorResponse)
    ),
    tag = "analysis"
)]
#[get("/api/analysis/reports/{filename}")]
/// Download a generated analysis report.
pub async fn download_report(
    state: web::Data<AppState>,
    filename: web::Path<String>,
) -> impl Responder {
    let store = OutputStore::from_settings(&state.settings);
    serve_file(store.resolve_report(&filename))
}

#[utoipa::path(
    post,
    path = "/api/weekly-report/generate",
    request_body = WeeklyGenerateRequest,
    responses(
        (status = 200, description = "Weekly report generated", body = WeeklyGenerateResponse),
        (status = 400, description = "Missing parameters", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse)
    ),
    tag = "weekly"
)]
#[post("/api/weekly-report/generate")]
/// Generate a weekly narrative report from an entity's commit history.
pub async fn generate_weekly(
    state: web::Data<AppState>,
    payload: web::Json<WeeklyGenerateRequest>,
) -> impl Responder {
    let payload = payload.into_inner();
    if payload.entity_id.trim().is_empty() || payload.workspace_id.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "entity_id and workspace_id are required".to_string(),
        );
    }

    let settings = state.settings.clone();
    let save_to_file = payload.save_to_file.unwrap_or(true);
    let result = run_blocking(move || {
        let generator = WeeklyReportGenerator::from_settings(&settings)?;
        let report = generator.generate(
            &payload.entity_id,
            &payload.workspace_id,
            payload.custom_prompt.as_deref(),
        )?;

        let mut file_path = None;
        if save_to_file {
            let store = OutputStore::from_settings(&settings);
            store.ensure()?;
            let name = format!(
                "weekly_report_{}_{}.md",
                payload.entity_id,
                OutputStore::timestamp()
            );
            match store.save_weekly(&name, &report) {
                Ok(path) => file_path = Some(path.display().to_string()),
                Err(err) => log::warn!("could not save weekly report: {err}"),
            }
        }

        Ok(WeeklyGenerateResponse {
            report,
            file_path,
            completed_at: Utc::now().to_rfc3339(),
        })
    })
    .await;

    match result {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(response) => response,
    }
}

#[utoipa::path(
    get,
    path = "/api/weekly-report/list",
    responses(
        (status = 200, description = "Weekly reports", body = ReportListResponse),
        (status = 500, description = "Internal failure", body = ErrorResponse)
    ),
    tag = "weekly"
)]
#[get("/api/weekly-report/list")]
/// List generated weekly reports, newest first.
pub async fn list_weekly(state: web::Data<AppState>) -> impl Responder {
    let store = OutputStore::from_settings(&state.settings);
    match store.list_weekly(None) {
        Ok(reports) => HttpResponse::Ok().json(ReportListResponse {
            total: reports.len(),
            reports,
        }),
        Err(err) => core_error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/weekly-report/{filename}",
    responses(
        (status = 200, description = "Weekly report contents"),
        (status = 400, description = "Invalid file name", body = ErrorResponse),
        (status = 404, description = "Report not found", body = ErrorResponse)
    ),
    tag = "weekly"
)]
#[get("/api/weekly-report/{filename}")]
/// Download a generated weekly report.
pub async fn download_weekly(
    state: web::Data<AppState>,
    filename: web::Path<String>,
) -> impl Responder {
    let store = OutputStore::from_settings(&state.settings);
    serve_file(store.resolve_weekly(&filename))
}

#[utoipa::path(
    get,
    path = "/api/openapi.json",
    responses(
        (status = 200, description = "OpenAPI specification")
    ),
    tag = "system"
)]
#[get("/api/openapi.json")]
/// Serve the OpenAPI specification.
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

fn serve_file(path: codegauge_core::Result<std::path::PathBuf>) -> HttpResponse {
    let path = match path {
        Ok(path) => path,
        Err(err) => {
            return error_response(StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string());
        }
    };
    if !path.is_file() {
        return error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("report not found: {}", path.display()),
        );
    }
    match fs::read(&path) {
        Ok(contents) => HttpResponse::Ok()
            .content_type(content_type_for(&path))
            .body(contents),
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            format!("cannot read {}: {err}", path.display()),
        ),
    }
}

fn content_type_for(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("csv") => "text/csv; charset=utf-8",
        Some("json") => "application/json",
        Some("md") => "text/markdown; charset=utf-8",
        _ => "text/plain; charset=utf-8",
    }
}

#[cfg(test)]
mod tests {
    use super::{AppState, download_report, health, list_reports, list_weekly, status};
    use actix_web::{App, test, web};
    use codegauge_core::{OutputStore, Settings};
    use std::path::PathBuf;

    static UNIQUE_COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    fn unique_dir() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        let counter = UNIQUE_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        std::env::temp_dir().join(format!("codegauge_routes_test_{nanos}_{counter}"))
    }

    fn test_state(output_dir: PathBuf) -> web::Data<AppState> {
        let mut settings = Settings::default();
        settings.output.output_dir = output_dir;
        web::Data::new(AppState { settings })
    }

    #[actix_web::test]
    async fn health_reports_healthy() {
        let app = test::init_service(App::new().service(health)).await;
        let request = test::TestRequest::get().uri("/api/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;

        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "codegauge");
    }

    #[actix_web::test]
    async fn status_reports_schedule_time() {
        let root = unique_dir();
        let app = test::init_service(
            App::new().app_data(test_state(root.clone())).service(status),
        )
        .await;
        let request = test::TestRequest::get().uri("/api/status").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;

        assert_eq!(body["schedule_time"], "07:00");
        assert_eq!(body["schedule_enabled"], true);
    }

    #[actix_web::test]
    async fn report_listing_returns_generated_files() {
        let root = unique_dir();
        let store = OutputStore::new(root.clone(), true);
        store.ensure().expect("dirs");
        store
            .save_text("uncommented_functions_report_20240101_000000.html", "<html>")
            .expect("write");

        let app = test::init_service(
            App::new()
                .app_data(test_state(root.clone()))
                .service(list_reports),
        )
        .await;
        let request = test::TestRequest::get()
            .uri("/api/analysis/reports?type=uncommented")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;

        assert_eq!(body["total"], 1);
        assert_eq!(body["reports"][0]["kind"], "uncommented");

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[actix_web::test]
    async fn download_rejects_missing_reports() {
        let root = unique_dir();
        let store = OutputStore::new(root.clone(), true);
        store.ensure().expect("dirs");

        let app = test::init_service(
            App::new()
                .app_data(test_state(root.clone()))
                .service(download_report),
        )
        .await;
        let request = test::TestRequest::get()
            .uri("/api/analysis/reports/nope.html")
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), 404);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[actix_web::test]
    async fn download_serves_html_with_content_type() {
        let root = unique_dir();
        let store = OutputStore::new(root.clone(), true);
        store.ensure().expect("dirs");
        store
            .save_text("uncommented_functions_report_20240101_000000.html", "<html></html>")
            .expect("write");

        let app = test::init_service(
            App::new()
                .app_data(test_state(root.clone()))
                .service(download_report),
        )
        .await;
        let request = test::TestRequest::get()
            .uri("/api/analysis/reports/uncommented_functions_report_20240101_000000.html")
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), 200);
        assert_eq!(
            response
                .headers()
                .get("content-type")
                .and_then(|value| value.to_str().ok()),
            Some("text/html; charset=utf-8")
        );

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[actix_web::test]
    async fn weekly_generation_runs_against_mocked_upstreams() {
        use httpmock::Method::{GET, POST};
        use httpmock::MockServer;
        use serde_json::json;

        let upstream = MockServer::start();
        upstream.mock(|when, then| {
            when.method(GET).path("/get_related_commits");
            then.status(200).json_body(json!({
                "meta": {"code": "0"},
                "data": {
                    "commits": [{
                        "message": "feat: wire up exports",
                        "user_name": "ada",
                        "commit_time": "2024-03-01 09:00:00",
                        "commit_id": "a1"
                    }],
                    "total_count": 1
                }
            }));
        });
        upstream.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "choices": [{"message": {"content": "Exports were wired up this week."}}]
            }));
        });

        let root = unique_dir();
        let mut settings = Settings::default();
        settings.output.output_dir = root.clone();
        settings.tapd.base_url = upstream.base_url();
        settings.llm.api_url = upstream.url("/chat/completions");
        settings.llm.api_key = "test-key".to_string();
        settings.request.retry_times = 1;
        settings.request.retry_delay_secs = 0.0;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState { settings }))
                .service(super::generate_weekly),
        )
        .await;
        let request = test::TestRequest::post()
            .uri("/api/weekly-report/generate")
            .set_json(serde_json::json!({
                "entity_id": "42",
                "workspace_id": "1001"
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;

        assert_eq!(body["report"], "Exports were wired up this week.");
        assert!(body["file_path"].as_str().unwrap_or("").contains("weekly_report_42_"));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[actix_web::test]
    async fn weekly_generation_requires_identifiers() {
        let root = unique_dir();
        let app = test::init_service(
            App::new()
                .app_data(test_state(root.clone()))
                .service(super::generate_weekly),
        )
        .await;
        let request = test::TestRequest::post()
            .uri("/api/weekly-report/generate")
            .set_json(serde_json::json!({"entity_id": "", "workspace_id": "1001"}))
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(response.status(), 400);
    }

    #[actix_web::test]
    async fn weekly_listing_is_empty_without_reports() {
        let root = unique_dir();
        let store = OutputStore::new(root.clone(), true);
        store.ensure().expect("dirs");

        let app = test::init_service(
            App::new()
                .app_data(test_state(root.clone()))
                .service(list_weekly),
        )
        .await;
        let request = test::TestRequest::get()
            .uri("/api/weekly-report/list")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;

        assert_eq!(body["total"], 0);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }
}
