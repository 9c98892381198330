//! Weekly narrative generation from commit history.
//!
//! An independent side-chain of the pipeline: commit records are pulled
//! from the TAPD API page by page, grouped by author, and handed to an LLM
//! completion call that turns them into a prose weekly report.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::error::{CodeGaugeError, Result};
use crate::http::{HttpClient, HttpClientConfig};
use crate::settings::Settings;

/// One commit pulled from the commit-history API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CommitRecord {
    /// Commit message.
    pub message: String,
    /// Author display name.
    pub user_name: String,
    /// Commit timestamp as reported upstream.
    pub commit_time: String,
    /// Commit hash.
    pub commit_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommitEnvelope {
    meta: CommitMeta,
    data: CommitData,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CommitMeta {
    code: String,
    message: Option<String>,
}

impl Default for CommitMeta {
    fn default() -> Self {
        Self {
            code: "0".to_string(),
            message: None,
        }
    }
}

/// One page of commits plus the server-reported total.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommitData {
    /// Commits on this page.
    pub commits: Vec<CommitRecord>,
    /// Total commits available, reported as a number or a numeric string.
    #[serde(deserialize_with = "de_count")]
    pub total_count: u64,
}

fn de_count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom("total_count is not a non-negative integer")),
        Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom("total_count is not numeric")),
        Value::Null => Ok(0),
        _ => Err(serde::de::Error::custom("total_count has an unexpected type")),
    }
}

/// Query scope for one entity's commit history.
#[derive(Debug, Clone)]
pub struct CommitQuery {
    /// Entity (task/ticket) identifier.
    pub entity_id: String,
    /// Workspace identifier.
    pub workspace_id: String,
    /// Entity type, `story` by default.
    pub entity_type: String,
    /// Related id filter, `-1` by default.
    pub related_id: String,
    /// SCM backend, `gitlab` by default.
    pub scm_type: String,
    /// Page size for offset pagination.
    pub per_page: u32,
}

impl CommitQuery {
    /// Query with the default scope parameters.
    pub fn new(entity_id: &str, workspace_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            workspace_id: workspace_id.to_string(),
            entity_type: "story".to_string(),
            related_id: "-1".to_string(),
            scm_type: "gitlab".to_string(),
            per_page: 100,
        }
    }
}

/// Client for the TAPD commit-history API.
#[derive(Debug)]
pub struct TapdClient {
    client: HttpClient,
    base_url: String,
}

impl TapdClient {
    /// Build a client with explicit parts.
    pub fn new(client: HttpClient, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Build a client from settings, attaching the configured cookie jar.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let cookies: Vec<(String, String)> = settings
            .tapd
            .cookies
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let client = HttpClient::new(HttpClientConfig {
            timeout: settings.request.timeout(),
            retry_times: settings.request.retry_times,
            retry_delay: settings.request.retry_delay(),
            headers: vec![(
                "Accept".to_string(),
                "application/json, text/plain, */*".to_string(),
            )],
        })?
        .with_cookies(&cookies);
        Ok(Self::new(client, settings.tapd.base_url.clone()))
    }

    /// Fetch one page of commits. A non-`"0"` envelope code is an
    /// application-level error.
    pub fn fetch_page(&self, query: &CommitQuery, page: u32) -> Result<CommitData> {
        let url = format!(
            "{}/get_related_commits",
            self.base_url.trim_end_matches('/')
        );
        let params = [
            ("workspace_id", query.workspace_id.clone()),
            ("entity_id", query.entity_id.clone()),
            ("entity_type", query.entity_type.clone()),
            ("related_id", query.related_id.clone()),
            ("page", page.to_string()),
            ("per_page", query.per_page.to_string()),
            ("scm_type", query.scm_type.clone()),
        ];
        log::info!(
            "fetching commits: entity_id={}, page={page}",
            query.entity_id
        );
        let value = self.client.get_json(&url, &params)?;
        let envelope = CommitEnvelope::deserialize(&value)
            .map_err(|err| CodeGaugeError::Schema(format!("commit envelope: {err}")))?;
        if envelope.meta.code != "0" {
            return Err(CodeGaugeError::Application {
                code: envelope.meta.code,
                message: envelope
                    .meta
                    .message
                    .unwrap_or_else(|| "unknown upstream error".to_string()),
            });
        }
        Ok(envelope.data)
    }

    /// Fetch every page of commits for the query. The loop ends when the
    /// collected count reaches the server-reported total or a page comes
    /// back empty.
    pub fn fetch_all_commits(&self, query: &CommitQuery) -> Result<Vec<CommitRecord>> {
        let mut commits = Vec::new();
        let mut page = 1;
        loop {
            let data = self.fetch_page(query, page)?;
            if data.commits.is_empty() {
                break;
            }
            commits.extend(data.commits);
            if commits.len() as u64 >= data.total_count {
                break;
            }
            page += 1;
        }
        log::info!("fetched {} commits total", commits.len());
        Ok(commits)
    }
}

/// A single-shot chat-completion backend.
#[cfg_attr(test, mockall::automock)]
pub trait ChatCompleter {
    /// Run one completion call; failures propagate to the caller unretried.
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Chat-completion client for the GLM API.
#[derive(Debug)]
pub struct GlmChatClient {
    client: HttpClient,
    api_url: String,
    model: String,
}

impl GlmChatClient {
    /// Build a client with explicit parts. The completion call is
    /// single-shot, so the underlying client gets exactly one attempt.
    pub fn new(api_url: String, api_key: &str, model: String) -> Result<Self> {
        let client = HttpClient::new(HttpClientConfig {
            retry_times: 1,
            ..HttpClientConfig::default()
        })?
        .with_bearer_token(api_key);
        Ok(Self {
            client,
            api_url,
            model,
        })
    }

    /// Build a client from settings. A missing API key is a fatal
    /// configuration error.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        if settings.llm.api_key.trim().is_empty() {
            return Err(CodeGaugeError::Config(
                "llm.api_key is not configured (set GLM_API_KEY)".to_string(),
            ));
        }
        Self::new(
            settings.llm.api_url.clone(),
            &settings.llm.api_key,
            settings.llm.model.clone(),
        )
    }
}

impl ChatCompleter for GlmChatClient {
    fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0.7,
            "top_p": 0.9
        });
        let value = self.client.post_json(&self.api_url, &body)?;
        value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                CodeGaugeError::Schema(
                    "completion response missing choices[0].message.content".to_string(),
                )
            })
    }
}

const SYSTEM_PROMPT: &str = "You are an assistant that turns raw commit \
history into a clear, professional engineering weekly report.";

/// Generates prose weekly reports from an entity's commit history.
pub struct WeeklyReportGenerator {
    tapd: TapdClient,
    chat: Box<dyn ChatCompleter>,
}

impl WeeklyReportGenerator {
    /// Build a generator with explicit clients.
    pub fn new(tapd: TapdClient, chat: Box<dyn ChatCompleter>) -> Self {
        Self { tapd, chat }
    }

    /// Build a generator from settings with the live GLM backend.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            TapdClient::from_settings(settings)?,
            Box::new(GlmChatClient::from_settings(settings)?),
        ))
    }

    /// Fetch all commits for an entity.
    pub fn fetch_commits(&self, entity_id: &str, workspace_id: &str) -> Result<Vec<CommitRecord>> {
        self.tapd
            .fetch_all_commits(&CommitQuery::new(entity_id, workspace_id))
    }

    /// Generate the weekly report: fetch commits, group them by author,
    /// and run one completion call with the default or caller-supplied
    /// prompt.
    pub fn generate(
        &self,
        entity_id: &str,
        workspace_id: &str,
        custom_prompt: Option<&str>,
    ) -> Result<String> {
        let commits = self.fetch_commits(entity_id, workspace_id)?;
        if commits.is_empty() {
            log::warn!("no commits found for entity {entity_id}");
            return Ok("No commits were found for this entity.".to_string());
        }
        log::info!("generating weekly report from {} commits", commits.len());
        let prompt = match custom_prompt {
            Some(prompt) => prompt.to_string(),
            None => build_default_prompt(&commits),
        };
        self.chat.complete(SYSTEM_PROMPT, &prompt)
    }
}

/// Group commits by author name, preserving per-author commit order.
pub(crate) fn group_by_author(commits: &[CommitRecord]) -> BTreeMap<&str, Vec<&CommitRecord>> {
    let mut grouped: BTreeMap<&str, Vec<&CommitRecord>> = BTreeMap::new();
    for commit in commits {
        grouped.entry(commit.user_name.as_str()).or_default().push(commit);
    }
    grouped
}

/// The default prompt: the commit log grouped by author followed by the
/// report structure the model should produce.
pub(crate) fn build_default_prompt(commits: &[CommitRecord]) -> String {
    use std::fmt::Write;

    let mut log_text = String::from("## Commit log\n\n");
    for (author, commits) in group_by_author(commits) {
        let _ = writeln!(log_text, "### {author} ({} commits)\n", commits.len());
        for commit in commits {
            let _ = writeln!(log_text, "- time: {}", commit.commit_time);
            let _ = writeln!(log_text, "  message: {}\n", commit.message.trim());
        }
    }

    format!(
        "Write a weekly engineering report from the commit log below.\n\n\
{log_text}\n\
Use this structure:\n\n\
# Weekly Summary\n\n\
## Overview\n\
A short paragraph covering the week's main work and outcomes.\n\n\
## Details\n\
Grouped by feature or task, covering what was delivered, the technical \
approach, and notable problems solved.\n\n\
Keep the language professional and concise, group related commits \
together, and do not simply restate the raw commit messages."
    )
}
