//! Retrying HTTP client shared by all upstream API calls.
//!
//! Every request gets a per-attempt timeout and up to a configured total
//! number of attempts, with a constant delay between attempts. Any transport
//! failure or non-2xx status counts as a failed attempt. Authentication is
//! attached once at construction and reused for the life of the client.

use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header;
use serde_json::Value;

use crate::error::{CodeGaugeError, Result};

/// Configuration for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Timeout applied to each attempt.
    pub timeout: Duration,
    /// Total attempts per request.
    pub retry_times: u32,
    /// Constant delay between attempts.
    pub retry_delay: Duration,
    /// Extra headers attached to every request.
    pub headers: Vec<(String, String)>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_times: 3,
            retry_delay: Duration::from_secs(2),
            headers: Vec::new(),
        }
    }
}

/// Blocking HTTP client with bounded constant-backoff retries.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    auth_header: Option<String>,
    cookie_header: Option<String>,
}

impl HttpClient {
    /// Build a client from the given configuration.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| CodeGaugeError::Transport(format!("cannot build http client: {err}")))?;
        Ok(Self {
            client,
            config,
            auth_header: None,
            cookie_header: None,
        })
    }

    /// Attach a static bearer token used for every request on this client.
    pub fn with_bearer_token(mut self, token: &str) -> Self {
        self.auth_header = Some(format!("Bearer {token}"));
        self
    }

    /// Attach a static cookie jar used for every request on this client.
    pub fn with_cookies(mut self, cookies: &[(String, String)]) -> Self {
        if !cookies.is_empty() {
            let header = cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            self.cookie_header = Some(header);
        }
        self
    }

    /// Issue a GET request and decode the response body as JSON.
    pub fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self.execute("GET", url, || self.client.get(url).query(query))?;
        response
            .json()
            .map_err(|err| CodeGaugeError::Transport(format!("invalid json from {url}: {err}")))
    }

    /// Issue a POST request with a JSON body and decode the response as JSON.
    pub fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let response = self.execute("POST", url, || self.client.post(url).json(body))?;
        response
            .json()
            .map_err(|err| CodeGaugeError::Transport(format!("invalid json from {url}: {err}")))
    }

    fn execute<F>(&self, method: &str, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        retry_loop(
            self.config.retry_times,
            self.config.retry_delay,
            |attempt, total| {
                log::debug!("{method} {url} (attempt {attempt}/{total})");
                let mut request = build();
                for (name, value) in &self.config.headers {
                    request = request.header(name, value);
                }
                if let Some(auth) = &self.auth_header {
                    request = request.header(header::AUTHORIZATION, auth);
                }
                if let Some(cookie) = &self.cookie_header {
                    request = request.header(header::COOKIE, cookie);
                }
                match request.send() {
                    Ok(response) => match response.error_for_status() {
                        Ok(response) => {
                            log::debug!("{method} {url} succeeded");
                            Ok(response)
                        }
                        Err(err) => Err(err.to_string()),
                    },
                    Err(err) => Err(err.to_string()),
                }
            },
        )
        .map_err(|last_error| {
            log::error!("{method} {url} failed after {} attempts", self.config.retry_times.max(1));
            CodeGaugeError::Transport(format!("{method} {url}: {last_error}"))
        })
    }
}

/// Run `attempt` up to `retry_times` total attempts, sleeping a constant
/// `retry_delay` between attempts. Returns the first success, or the last
/// observed error once attempts are exhausted.
pub(crate) fn retry_loop<T, F>(
    retry_times: u32,
    retry_delay: Duration,
    mut attempt: F,
) -> std::result::Result<T, String>
where
    F: FnMut(u32, u32) -> std::result::Result<T, String>,
{
    let total = retry_times.max(1);
    let mut last_error = String::new();
    for current in 1..=total {
        match attempt(current, total) {
            Ok(value) => return Ok(value),
            Err(error) => {
                log::warn!("request failed (attempt {current}/{total}): {error}");
                last_error = error;
            }
        }
        if current < total && !retry_delay.is_zero() {
            thread::sleep(retry_delay);
        }
    }
    Err(last_error)
}
