//! REST access to the payouts API.
//!
//! Every response uses the `{ success, message, data }` envelope. It is
//! decoded once, here, into an [`Outcome`]; transport problems and
//! undecodable bodies come back as `Err`.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use ureq::{Agent, RequestBuilder};

use crate::config::ApiSettings;
use crate::error::{PayoutError, Result};

/// Decoded envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        data: Value,
        message: Option<String>,
    },
    Failure {
        reason: String,
    },
}

impl Outcome {
    pub fn into_data(self) -> Result<Value> {
        match self {
            Outcome::Success { data, .. } => Ok(data),
            Outcome::Failure { reason } => Err(PayoutError::Rejected(reason)),
        }
    }
}

pub trait RemoteSource {
    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Outcome>;
    /// Create/submit actions; the payout operations here do not need it yet.
    fn post(&self, path: &str, body: &Value) -> Result<Outcome>;
    fn put(&self, path: &str, body: &Value) -> Result<Outcome>;
    fn delete(&self, path: &str) -> Result<Outcome>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Map an HTTP status and body onto the envelope taxonomy
pub(crate) fn decode_response(status: u16, body: &str) -> Result<Outcome> {
    let ok_status = (200..300).contains(&status);

    match serde_json::from_str::<Envelope>(body) {
        Ok(env) if env.success && ok_status => Ok(Outcome::Success {
            data: env.data.unwrap_or(Value::Null),
            message: env.message,
        }),
        Ok(env) if !env.success && status < 500 => Ok(Outcome::Failure {
            reason: env
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("Request failed with status {status}")),
        }),
        Ok(_) => Err(PayoutError::Transport(format!(
            "server returned HTTP {status}"
        ))),
        Err(_) if !ok_status => Err(PayoutError::Transport(format!(
            "server returned HTTP {status}"
        ))),
        Err(e) => Err(PayoutError::Decode(e.to_string())),
    }
}

/// Blocking HTTP client for the versioned API
pub struct HttpSource {
    agent: Agent,
    base_url: String,
    token: Option<String>,
}

impl HttpSource {
    pub fn new(settings: &ApiSettings) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(settings.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone().filter(|t| !t.trim().is_empty()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn prepare<B>(&self, request: RequestBuilder<B>) -> RequestBuilder<B> {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    fn finish(
        &self,
        method: &str,
        url: &str,
        result: std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    ) -> Result<Outcome> {
        let mut response = result.map_err(|e| {
            tracing::debug!(%method, %url, error = %e, "request failed");
            PayoutError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| PayoutError::Transport(e.to_string()))?;

        tracing::debug!(%method, %url, status, "response received");
        decode_response(status, &body)
    }
}

impl RemoteSource for HttpSource {
    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Outcome> {
        let url = self.url(path);
        let mut request = self.prepare(self.agent.get(&url));
        for (key, value) in query {
            request = request.query(*key, value.as_str());
        }
        self.finish("GET", &url, request.call())
    }

    fn post(&self, path: &str, body: &Value) -> Result<Outcome> {
        let url = self.url(path);
        let request = self
            .prepare(self.agent.post(&url))
            .header("Content-Type", "application/json");
        self.finish("POST", &url, request.send(body.to_string()))
    }

    fn put(&self, path: &str, body: &Value) -> Result<Outcome> {
        let url = self.url(path);
        let request = self
            .prepare(self.agent.put(&url))
            .header("Content-Type", "application/json");
        self.finish("PUT", &url, request.send(body.to_string()))
    }

    fn delete(&self, path: &str) -> Result<Outcome> {
        let url = self.url(path);
        let request = self.prepare(self.agent.delete(&url));
        self.finish("DELETE", &url, request.call())
    }
}
