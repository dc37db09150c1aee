use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EmbedError;
use crate::provider::EmbeddingProvider;
use crate::retry::{RetryPolicy, send_with_retry};

pub const DEFAULT_BASE_URL: &str = "https://api.pinecone.io";
pub const DEFAULT_MODEL: &str = "llama-text-embed-v2";
pub const API_VERSION: &str = "2025-04";

const PROVIDER: &str = "pinecone";

/// Client for the Pinecone hosted inference `embed` endpoint.
#[derive(Clone)]
pub struct PineconeEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    input_type: String,
    truncate: String,
    retry: RetryPolicy,
}

impl fmt::Debug for PineconeEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PineconeEmbedder")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("input_type", &self.input_type)
            .field("truncate", &self.truncate)
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Serialize)]
struct EmbedParameters<'a> {
    input_type: &'a str,
    truncate: &'a str,
}

#[derive(Serialize)]
struct EmbedInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    parameters: EmbedParameters<'a>,
    inputs: Vec<EmbedInput<'a>>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    #[serde(default)]
    values: Vec<f32>,
}

impl PineconeEmbedder {
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            input_type: "passage".to_owned(),
            truncate: "END".to_owned(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = input_type.into();
        self
    }

    #[must_use]
    pub fn with_truncate(mut self, truncate: impl Into<String>) -> Self {
        self.truncate = truncate.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if self.api_key.is_empty() {
            return Err(EmbedError::MissingApiKey { provider: PROVIDER });
        }

        let body = EmbedRequest {
            model: &self.model,
            parameters: EmbedParameters {
                input_type: &self.input_type,
                truncate: &self.truncate,
            },
            inputs: texts.iter().map(|t| EmbedInput { text: t }).collect(),
        };
        let url = format!("{}/embed", self.base_url);

        tracing::debug!(inputs = texts.len(), model = %self.model, "sending embed request");
        let response = send_with_retry(PROVIDER, &self.retry, || {
            self.client
                .post(&url)
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(EmbedError::RateLimited { provider: PROVIDER });
        }
        if !status.is_success() {
            return Err(EmbedError::Status {
                provider: PROVIDER,
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: EmbedResponse = serde_json::from_str(&text)?;
        if parsed.data.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                provider: PROVIDER,
                expected: texts.len(),
                got: parsed.data.len(),
            });
        }
        Ok(parsed.data.into_iter().map(|d| d.values).collect())
    }
}

impl EmbeddingProvider for PineconeEmbedder {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}
