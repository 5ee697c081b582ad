//! Text generation backend and the per-step client wrapper.

pub mod extract;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub use extract::extract_structured;

/// Default per-step budget when a step declares none.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// A backend that turns a prompt into generated text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    content: String,
    #[serde(default)]
    usage: Option<Value>,
}

/// HTTP generation backend.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: Option<String>,
    system: Option<String>,
    temperature: Option<f64>,
}

impl HttpGenerator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: None,
            system: None,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            message: prompt,
            model: self.model.as_deref(),
            system: self.system.as_deref(),
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::ServiceUnavailable(format!(
                "generation endpoint returned {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("malformed response: {}", e)))?;

        if let Some(usage) = &body.usage {
            debug!(%usage, "generation usage");
        }

        Ok(body.content)
    }
}

/// One step's generation outcome. Never an `Err`; failures are carried
/// in-band so downstream steps can branch on them and the run can keep
/// going with a partial result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub raw_text: String,
    pub parsed_value: Option<Value>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            raw_text: String::new(),
            parsed_value: None,
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Wraps a [`Generator`] with timeout enforcement and structured-result
/// extraction.
pub struct GenerationClient {
    generator: Arc<dyn Generator>,
    default_timeout_secs: u64,
}

impl GenerationClient {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Override the budget applied to steps that declare no timeout.
    pub fn with_default_timeout(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs.max(1);
        self
    }

    /// Run a prompt under the given budget. Timeouts and backend failures
    /// become unsuccessful results rather than errors.
    pub async fn process(&self, prompt: &str, timeout_secs: Option<u64>) -> GenerationResult {
        let budget = Duration::from_secs(timeout_secs.unwrap_or(self.default_timeout_secs));

        let text = match tokio::time::timeout(budget, self.generator.generate(prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(code = e.code(), "generation failed: {}", e);
                return GenerationResult::failure(format!("[{}] {}", e.code(), e));
            }
            Err(_) => {
                let e = Error::Timeout(budget.as_secs());
                warn!(code = e.code(), "generation timed out after {}s", budget.as_secs());
                return GenerationResult::failure(format!("[{}] {}", e.code(), e));
            }
        };

        let parsed_value = extract_structured(&text);
        GenerationResult {
            raw_text: text,
            parsed_value,
            success: true,
            error: None,
        }
    }
}
