use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use phishvec_embed::{RetryPolicy, send_with_retry};
use serde::{Deserialize, Serialize};

use crate::vector_store::{
    BoxFuture, IndexSpec, UpsertAck, VectorPoint, VectorStore, VectorStoreError,
};

pub const DEFAULT_CONTROL_URL: &str = "https://api.pinecone.io";
pub const API_VERSION: &str = "2025-04";

const PROVIDER: &str = "pinecone";
const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pinecone serverless index client: control plane for index lifecycle, data plane for upserts.
pub struct PineconeStore {
    client: reqwest::Client,
    api_key: String,
    control_url: String,
    retry: RetryPolicy,
    ready_timeout: Duration,
    poll_interval: Duration,
    hosts: RwLock<HashMap<String, String>>,
}

impl fmt::Debug for PineconeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PineconeStore")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("control_url", &self.control_url)
            .field("retry", &self.retry)
            .field("ready_timeout", &self.ready_timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Serialize)]
struct IndexSpecBody<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: u64,
    metric: &'a str,
    spec: IndexSpecBody<'a>,
}

#[derive(Deserialize)]
struct IndexDescription {
    #[serde(default)]
    dimension: Option<u64>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    status: Option<IndexStatus>,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a HashMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

fn with_scheme(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_owned()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
    }
}

fn connection(e: &reqwest::Error) -> VectorStoreError {
    VectorStoreError::Connection(e.to_string())
}

impl PineconeStore {
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            control_url: DEFAULT_CONTROL_URL.to_owned(),
            retry: RetryPolicy::default(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_control_url(mut self, url: impl Into<String>) -> Self {
        self.control_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_ready_timeout(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.ready_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    fn check_key(&self) -> Result<(), VectorStoreError> {
        if self.api_key.is_empty() {
            return Err(VectorStoreError::MissingApiKey { provider: PROVIDER });
        }
        Ok(())
    }

    fn cached_host(&self, index: &str) -> Option<String> {
        self.hosts.read().ok()?.get(index).cloned()
    }

    fn remember_host(&self, index: &str, host: &str) {
        if let Ok(mut hosts) = self.hosts.write() {
            hosts.insert(index.to_owned(), with_scheme(host));
        }
    }

    /// `None` when the index does not exist.
    async fn describe(&self, index: &str) -> Result<Option<IndexDescription>, VectorStoreError> {
        self.check_key()?;
        let url = format!("{}/indexes/{index}", self.control_url);
        let response = send_with_retry(PROVIDER, &self.retry, || {
            self.client
                .get(&url)
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .send()
        })
        .await
        .map_err(|e| connection(&e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response.text().await.map_err(|e| connection(&e))?;
        if !status.is_success() {
            return Err(VectorStoreError::Index(format!(
                "describe {index} failed ({status}): {text}"
            )));
        }
        let description: IndexDescription = serde_json::from_str(&text)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
        if let Some(host) = &description.host {
            self.remember_host(index, host);
        }
        Ok(Some(description))
    }

    async fn index_dimension_impl(&self, index: &str) -> Result<Option<u64>, VectorStoreError> {
        match self.describe(index).await? {
            None => Ok(None),
            Some(IndexDescription {
                dimension: Some(dimension),
                ..
            }) => Ok(Some(dimension)),
            Some(_) => Err(VectorStoreError::Index(format!(
                "index {index} reports no dimension"
            ))),
        }
    }

    async fn create_index_impl(&self, spec: &IndexSpec) -> Result<(), VectorStoreError> {
        self.check_key()?;
        let body = CreateIndexRequest {
            name: &spec.name,
            dimension: spec.dimension,
            metric: "cosine",
            spec: IndexSpecBody {
                serverless: ServerlessSpec {
                    cloud: &spec.cloud,
                    region: &spec.region,
                },
            },
        };
        let url = format!("{}/indexes", self.control_url);
        tracing::info!(index = %spec.name, dimension = spec.dimension, "creating index");

        let response = send_with_retry(PROVIDER, &self.retry, || {
            self.client
                .post(&url)
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .json(&body)
                .send()
        })
        .await
        .map_err(|e| connection(&e))?;

        let status = response.status();
        if status == reqwest::StatusCode::CONFLICT {
            tracing::info!(index = %spec.name, "index already exists");
        } else if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::Index(format!(
                "create {} failed ({status}): {text}",
                spec.name
            )));
        }

        self.wait_ready(&spec.name).await
    }

    async fn wait_ready(&self, index: &str) -> Result<(), VectorStoreError> {
        let started = Instant::now();
        loop {
            if let Some(description) = self.describe(index).await?
                && description.status.is_some_and(|s| s.ready)
            {
                tracing::info!(index, "index ready");
                return Ok(());
            }
            if started.elapsed() >= self.ready_timeout {
                return Err(VectorStoreError::NotReady {
                    index: index.to_owned(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tracing::debug!(index, "waiting for index to become ready");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn resolve_host(&self, index: &str) -> Result<String, VectorStoreError> {
        if let Some(host) = self.cached_host(index) {
            return Ok(host);
        }
        self.describe(index).await?;
        self.cached_host(index)
            .ok_or_else(|| VectorStoreError::Index(format!("index {index} has no host")))
    }

    async fn upsert_impl(
        &self,
        index: &str,
        points: Vec<VectorPoint>,
    ) -> Result<UpsertAck, VectorStoreError> {
        if points.is_empty() {
            return Ok(UpsertAck { upserted: 0 });
        }
        let host = self.resolve_host(index).await?;
        let body = UpsertRequest {
            vectors: points
                .iter()
                .map(|p| UpsertVector {
                    id: &p.id,
                    values: &p.vector,
                    metadata: &p.payload,
                })
                .collect(),
        };
        let url = format!("{host}/vectors/upsert");

        let response = send_with_retry(PROVIDER, &self.retry, || {
            self.client
                .post(&url)
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .json(&body)
                .send()
        })
        .await
        .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
        if !status.is_success() {
            return Err(VectorStoreError::Upsert(format!(
                "upsert into {index} failed ({status}): {text}"
            )));
        }
        let parsed: UpsertResponse = serde_json::from_str(&text)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
        Ok(UpsertAck {
            upserted: parsed.upserted_count,
        })
    }
}

impl VectorStore for PineconeStore {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn index_dimension(&self, index: &str) -> BoxFuture<'_, Result<Option<u64>, VectorStoreError>> {
        let index = index.to_owned();
        Box::pin(async move { self.index_dimension_impl(&index).await })
    }

    fn create_index(&self, spec: &IndexSpec) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let spec = spec.clone();
        Box::pin(async move { self.create_index_impl(&spec).await })
    }

    fn upsert(
        &self,
        index: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<UpsertAck, VectorStoreError>> {
        let index = index.to_owned();
        Box::pin(async move { self.upsert_impl(&index, points).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> PineconeStore {
        PineconeStore::new(reqwest::Client::new(), "pc-key")
            .with_control_url(server.uri())
            .with_retry(RetryPolicy::new(1).with_base_backoff(Duration::from_millis(1)))
            .with_ready_timeout(Duration::from_millis(200), Duration::from_millis(5))
    }

    fn point(id: &str) -> VectorPoint {
        VectorPoint {
            id: id.to_owned(),
            vector: vec![0.1, 0.2],
            payload: HashMap::from([("label".to_owned(), json!("spam"))]),
        }
    }

    #[test]
    fn host_gets_https_scheme() {
        assert_eq!(with_scheme("idx-abc.svc.pinecone.io"), "https://idx-abc.svc.pinecone.io");
        assert_eq!(with_scheme("http://localhost:5081/"), "http://localhost:5081");
    }

    #[test]
    fn debug_redacts_api_key() {
        let s = PineconeStore::new(reqwest::Client::new(), "pc-secret");
        assert!(!format!("{s:?}").contains("pc-secret"));
    }

    #[tokio::test]
    async fn missing_index_reports_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/fraud-email-index"))
            .and(header("Api-Key", "pc-key"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(
            store(&server)
                .index_dimension("fraud-email-index")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn existing_index_reports_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/idx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "idx", "dimension": 1024, "host": "idx.example", "status": {"ready": true}
            })))
            .mount(&server)
            .await;

        assert_eq!(store(&server).index_dimension("idx").await.unwrap(), Some(1024));
    }

    #[tokio::test]
    async fn description_without_dimension_is_index_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/idx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "idx", "host": "idx.example"
            })))
            .mount(&server)
            .await;

        let err = store(&server).index_dimension("idx").await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Index(msg) if msg.contains("no dimension")));
    }

    #[tokio::test]
    async fn describe_server_error_is_index_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = store(&server).index_dimension("idx").await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Index(_)));
    }

    #[tokio::test]
    async fn create_posts_serverless_spec_and_waits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .and(body_partial_json(json!({
                "name": "idx",
                "dimension": 1024,
                "metric": "cosine",
                "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "idx"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/indexes/idx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "idx", "host": "idx.example", "status": {"ready": false}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/indexes/idx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "idx", "host": "idx.example", "status": {"ready": true}
            })))
            .mount(&server)
            .await;

        store(&server)
            .create_index(&IndexSpec::new("idx", 1024))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_conflict_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/indexes/idx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "host": "idx.example", "status": {"ready": true}
            })))
            .mount(&server)
            .await;

        assert!(
            store(&server)
                .create_index(&IndexSpec::new("idx", 8))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn index_never_ready_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "host": "idx.example", "status": {"ready": false}
            })))
            .mount(&server)
            .await;

        let err = store(&server)
            .create_index(&IndexSpec::new("idx", 8))
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::NotReady { .. }));
    }

    #[tokio::test]
    async fn upsert_uses_index_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/idx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "host": server.uri(), "status": {"ready": true}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(body_partial_json(json!({
                "vectors": [{"id": "a", "metadata": {"label": "spam"}}, {"id": "b"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 2})))
            .expect(2)
            .mount(&server)
            .await;

        let store = store(&server);
        let ack = store.upsert("idx", vec![point("a"), point("b")]).await.unwrap();
        assert_eq!(ack.upserted, 2);
        // host is cached, no second describe
        store.upsert("idx", vec![point("a"), point("b")]).await.unwrap();
    }

    #[tokio::test]
    async fn upsert_failure_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/idx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "host": server.uri(), "status": {"ready": true}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad vector"))
            .mount(&server)
            .await;

        let err = store(&server)
            .upsert("idx", vec![point("a")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(msg) if msg.contains("bad vector")));
    }

    #[tokio::test]
    async fn missing_key_is_rejected() {
        let s = PineconeStore::new(reqwest::Client::new(), "");
        assert!(matches!(
            s.index_dimension("idx").await,
            Err(VectorStoreError::MissingApiKey { .. })
        ));
    }
}
