//! Sequential fetchers for the Merico listing APIs.
//!
//! Projects are fetched one at a time with a flat delay between calls to
//! avoid overloading the upstream service. A single project's failure is
//! recorded and never aborts the batch.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{CodeGaugeError, Result};
use crate::http::{HttpClient, HttpClientConfig};
use crate::settings::Settings;

/// Outcome of one project fetch attempt. Exactly one of `payload` and
/// `error` is set; the value is never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    /// Identifier of the fetched project.
    pub project_id: String,
    /// Raw upstream response, present on success.
    pub payload: Option<Value>,
    /// Failure description, present on error.
    pub error: Option<String>,
    /// When the attempt finished.
    pub timestamp: DateTime<Utc>,
}

impl FetchResult {
    /// Record a successful fetch.
    pub fn success(project_id: &str, payload: Value) -> Self {
        Self {
            project_id: project_id.to_string(),
            payload: Some(payload),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Record a failed fetch.
    pub fn failure(project_id: &str, error: impl Into<String>) -> Self {
        Self {
            project_id: project_id.to_string(),
            payload: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    /// Whether this fetch produced a payload.
    pub fn is_success(&self) -> bool {
        self.payload.is_some()
    }
}

/// Load the project identifier list from a JSON array file.
pub fn load_project_ids(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path).map_err(|err| {
        CodeGaugeError::Config(format!(
            "cannot read project id file {}: {err}",
            path.display()
        ))
    })?;
    let ids: Vec<String> = serde_json::from_str(&contents).map_err(|err| {
        CodeGaugeError::Config(format!(
            "malformed project id file {}: {err}",
            path.display()
        ))
    })?;
    log::info!("loaded {} project ids from {}", ids.len(), path.display());
    Ok(ids)
}

/// Fetcher for the uncommented-function listing API.
#[derive(Debug)]
pub struct UncommentedFetcher {
    client: HttpClient,
    api_url: String,
    page_size: u32,
    frequent_authors: Vec<String>,
    batch_delay: Duration,
}

impl UncommentedFetcher {
    /// Build a fetcher with explicit parts.
    pub fn new(
        client: HttpClient,
        api_url: String,
        page_size: u32,
        frequent_authors: Vec<String>,
        batch_delay: Duration,
    ) -> Self {
        Self {
            client,
            api_url,
            page_size,
            frequent_authors,
            batch_delay,
        }
    }

    /// Build a fetcher from settings. Missing endpoint or credentials are a
    /// fatal configuration error.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = merico_client(settings, "merico.api_url", &settings.merico.api_url)?;
        Ok(Self::new(
            client,
            settings.merico.api_url.clone(),
            settings.request.page_size,
            settings.merico.frequent_authors.clone(),
            settings.request.batch_delay(),
        ))
    }

    /// Request body for one project listing call.
    pub(crate) fn request_payload(&self, project_id: &str, page: u32) -> Value {
        json!({
            "params": [
                project_id,
                {
                    "page": page,
                    "pageSize": self.page_size,
                    "sortField": "cyclomatic",
                    "sortOrder": "descend",
                    "location": "",
                    "frequentAuthors": self.frequent_authors,
                    "cyclomatic": {"min": 0, "max": null},
                    "isDocCovered": false
                }
            ]
        })
    }

    /// Fetch one project's listing.
    pub fn fetch_one(&self, project_id: &str) -> Result<Value> {
        self.client
            .post_json(&self.api_url, &self.request_payload(project_id, 1))
    }

    /// Fetch every project in order, recording failures in place.
    pub fn fetch_all(&self, project_ids: &[String]) -> Vec<FetchResult> {
        fetch_each(project_ids, self.batch_delay, |id| self.fetch_one(id))
    }
}

/// Fetcher for the duplicate-function listing API.
#[derive(Debug)]
pub struct DuplicateFetcher {
    client: HttpClient,
    api_url: String,
    page_size: u32,
    emails: Vec<String>,
    batch_delay: Duration,
}

impl DuplicateFetcher {
    /// Build a fetcher with explicit parts.
    pub fn new(
        client: HttpClient,
        api_url: String,
        page_size: u32,
        emails: Vec<String>,
        batch_delay: Duration,
    ) -> Self {
        Self {
            client,
            api_url,
            page_size,
            emails,
            batch_delay,
        }
    }

    /// Build a fetcher from settings. Missing endpoint or credentials are a
    /// fatal configuration error.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = merico_client(
            settings,
            "merico.duplicate_url",
            &settings.merico.duplicate_url,
        )?;
        Ok(Self::new(
            client,
            settings.merico.duplicate_url.clone(),
            settings.request.page_size,
            settings.merico.duplicate_emails.clone(),
            settings.request.batch_delay(),
        ))
    }

    /// Request body for one project's duplicate listing call.
    pub(crate) fn request_payload(&self, project_id: &str, page: u32) -> Value {
        json!({
            "id": project_id,
            "page": page,
            "pageSize": self.page_size,
            "filter": {"search": "", "emails": self.emails},
            "sort": {"field": "numFunctions", "direction": "desc"}
        })
    }

    /// Fetch one project's duplicate groups.
    pub fn fetch_one(&self, project_id: &str) -> Result<Value> {
        self.client
            .post_json(&self.api_url, &self.request_payload(project_id, 1))
    }

    /// Fetch every project in order, recording failures in place.
    pub fn fetch_all(&self, project_ids: &[String]) -> Vec<FetchResult> {
        fetch_each(project_ids, self.batch_delay, |id| self.fetch_one(id))
    }
}

fn merico_client(settings: &Settings, url_key: &str, url: &str) -> Result<HttpClient> {
    if url.trim().is_empty() {
        return Err(CodeGaugeError::Config(format!("{url_key} is not configured")));
    }
    if settings.merico.token.trim().is_empty() {
        return Err(CodeGaugeError::Config(
            "merico.token is not configured (set MERICO_TOKEN)".to_string(),
        ));
    }
    let client = HttpClient::new(HttpClientConfig {
        timeout: settings.request.timeout(),
        retry_times: settings.request.retry_times,
        retry_delay: settings.request.retry_delay(),
        headers: Vec::new(),
    })?;
    Ok(client.with_bearer_token(&settings.merico.token))
}

/// Sequentially fetch each project, sleeping `batch_delay` between calls and
/// converting per-project errors into failure results.
fn fetch_each<F>(project_ids: &[String], batch_delay: Duration, fetch: F) -> Vec<FetchResult>
where
    F: Fn(&str) -> Result<Value>,
{
    let total = project_ids.len();
    let mut results = Vec::with_capacity(total);
    for (index, project_id) in project_ids.iter().enumerate() {
        log::info!("fetching project {}/{total}: {project_id}", index + 1);
        match fetch(project_id) {
            Ok(payload) => results.push(FetchResult::success(project_id, payload)),
            Err(err) => {
                log::warn!("project {project_id} failed: {err}");
                results.push(FetchResult::failure(project_id, err.to_string()));
            }
        }
        if index + 1 < total && !batch_delay.is_zero() {
            thread::sleep(batch_delay);
        }
    }
    results
}
