//! Typed configuration for the CodeGauge pipeline.
//!
//! Settings come from three layers, highest precedence first: environment
//! variables, a JSON config file, built-in defaults. Secrets (API tokens,
//! LLM keys) are expected to arrive via the environment.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CodeGaugeError, Result};

/// HTTP service bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Whether debug mode is enabled.
    pub debug: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            debug: false,
        }
    }
}

/// Merico code-quality API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MericoSettings {
    /// Endpoint for the uncommented-function listing API.
    pub api_url: String,
    /// Endpoint for the duplicate-function listing API.
    pub duplicate_url: String,
    /// Bearer token for both endpoints.
    pub token: String,
    /// Path to the JSON file listing project identifiers.
    pub project_ids_file: PathBuf,
    /// Author filter applied to uncommented-function queries.
    pub frequent_authors: Vec<String>,
    /// Author filter applied to duplicate-function queries.
    pub duplicate_emails: Vec<String>,
}

/// LLM completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat-completion endpoint.
    pub api_url: String,
    /// API key.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_url: "https://open.bigmodel.cn/api/paas/v4/chat/completions".to_string(),
            api_key: String::new(),
            model: "glm-4.5-flash".to_string(),
        }
    }
}

/// TAPD commit-history API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TapdSettings {
    /// API base URL.
    pub base_url: String,
    /// Session cookies sent with every request.
    pub cookies: BTreeMap<String, String>,
}

impl Default for TapdSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.tapd.cn/api/devops/source_code".to_string(),
            cookies: BTreeMap::new(),
        }
    }
}

/// Outbound request settings shared by all upstream clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
    /// Total attempts per request.
    pub retry_times: u32,
    /// Constant delay between attempts, in seconds.
    pub retry_delay_secs: f64,
    /// Flat delay between successive project fetches, in seconds.
    pub batch_delay_secs: f64,
    /// Page size for listing requests.
    pub page_size: u32,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry_times: 3,
            retry_delay_secs: 2.0,
            batch_delay_secs: 0.5,
            page_size: 100,
        }
    }
}

impl RequestSettings {
    /// Per-attempt timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry delay as a [`Duration`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_secs.max(0.0))
    }

    /// Batch delay as a [`Duration`].
    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs_f64(self.batch_delay_secs.max(0.0))
    }
}

/// Artifact output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Directory for generated artifacts.
    pub output_dir: PathBuf,
    /// Whether raw fetch snapshots are persisted.
    pub save_raw: bool,
    /// Whether classified snapshots are persisted.
    pub save_classified: bool,
    /// Whether JSON snapshots are pretty-printed.
    pub pretty_print: bool,
    /// How many entries ranked tables display.
    pub top_n: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            save_raw: true,
            save_classified: true,
            pretty_print: true,
            top_n: 20,
        }
    }
}

/// Daily analysis schedule settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Whether the daily trigger runs at all.
    pub enabled: bool,
    /// Local hour of the daily run.
    pub hour: u32,
    /// Local minute of the daily run.
    pub minute: u32,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 7,
            minute: 0,
        }
    }
}

/// Top-level settings for the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Environment label (`development`, `production`).
    pub env: String,
    /// HTTP service settings.
    pub server: ServerSettings,
    /// Merico API settings.
    pub merico: MericoSettings,
    /// LLM API settings.
    pub llm: LlmSettings,
    /// TAPD API settings.
    pub tapd: TapdSettings,
    /// Outbound request settings.
    pub request: RequestSettings,
    /// Artifact output settings.
    pub output: OutputSettings,
    /// Daily schedule settings.
    pub schedule: ScheduleSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            server: ServerSettings::default(),
            merico: MericoSettings {
                project_ids_file: PathBuf::from("project_ids.json"),
                ..MericoSettings::default()
            },
            llm: LlmSettings::default(),
            tapd: TapdSettings::default(),
            request: RequestSettings::default(),
            output: OutputSettings::default(),
            schedule: ScheduleSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional JSON config file, then apply
    /// environment overrides on top.
    ///
    /// A config path that was explicitly given but does not exist is a fatal
    /// configuration error. With no path, defaults plus the environment are
    /// used.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = match config_path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|err| {
                    CodeGaugeError::Config(format!(
                        "cannot read config file {}: {err}",
                        path.display()
                    ))
                })?;
                serde_json::from_str(&contents).map_err(|err| {
                    CodeGaugeError::Config(format!(
                        "malformed config file {}: {err}",
                        path.display()
                    ))
                })?
            }
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply environment-style overrides from the given lookup. Present keys
    /// win over file and default values.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(env) = lookup("ENV") {
            self.env = env;
        }
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT").and_then(|value| value.parse().ok()) {
            self.server.port = port;
        }
        if let Some(debug) = lookup("DEBUG") {
            self.server.debug = debug.eq_ignore_ascii_case("true");
        }
        if let Some(token) = lookup("MERICO_TOKEN") {
            self.merico.token = token;
        }
        if let Some(url) = lookup("MERICO_API_URL") {
            self.merico.api_url = url;
        }
        if let Some(url) = lookup("MERICO_DUPLICATE_URL") {
            self.merico.duplicate_url = url;
        }
        if let Some(key) = lookup("GLM_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(model) = lookup("GLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("TAPD_BASE_URL") {
            self.tapd.base_url = url;
        }
    }

    /// Create the output directory tree if it is missing.
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output.output_dir)?;
        fs::create_dir_all(self.output.output_dir.join("weekly_reports"))?;
        Ok(())
    }

    /// Whether this is a production deployment.
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::Settings;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.request.timeout_secs, 30);
        assert_eq!(settings.request.retry_times, 3);
        assert_eq!(settings.request.retry_delay_secs, 2.0);
        assert_eq!(settings.request.batch_delay_secs, 0.5);
        assert_eq!(settings.request.page_size, 100);
        assert_eq!(settings.schedule.hour, 7);
        assert_eq!(settings.output.output_dir, PathBuf::from("output"));
        assert_eq!(settings.llm.model, "glm-4.5-flash");
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut settings: Settings = serde_json::from_str(
            r#"{
                "merico": {"token": "file-token", "api_url": "https://file.example/api"},
                "server": {"port": 9000}
            }"#,
        )
        .expect("parse config");
        assert_eq!(settings.merico.token, "file-token");
        assert_eq!(settings.server.port, 9000);

        let mut env = BTreeMap::new();
        env.insert("MERICO_TOKEN".to_string(), "env-token".to_string());
        env.insert("SERVER_PORT".to_string(), "9100".to_string());
        env.insert("DEBUG".to_string(), "true".to_string());
        settings.apply_overrides(|key| env.get(key).cloned());

        assert_eq!(settings.merico.token, "env-token");
        assert_eq!(settings.merico.api_url, "https://file.example/api");
        assert_eq!(settings.server.port, 9100);
        assert!(settings.server.debug);
    }

    #[test]
    fn load_rejects_missing_explicit_config() {
        let missing = std::env::temp_dir().join("codegauge_settings_missing.json");
        let result = Settings::load(Some(&missing));
        assert!(result.is_err());
    }

    #[test]
    fn unparseable_port_override_is_ignored() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| {
            (key == "SERVER_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(settings.server.port, 8080);
    }
}
