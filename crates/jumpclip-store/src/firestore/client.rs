//! Firestore REST client.
//!
//! - Token caching with a refresh margin, or the emulator's fixed bearer
//! - One retry after an expired-token 401
//! - Tracing spans and request metrics per call

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{info_span, Instrument};

use super::error::{FirestoreError, FirestoreResult};
use super::metrics::record_request;
use super::retry::RetryConfig;
use super::token_cache::TokenCache;
use super::types::{Document, RunQueryRequest, RunQueryResponse, StructuredQuery, Value};

const PRODUCTION_ORIGIN: &str = "https://firestore.googleapis.com";

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Usually "(default)"
    pub database_id: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
    /// Emulator origin such as `http://localhost:8080`; disables OAuth.
    pub emulator_origin: Option<String>,
}

impl FirestoreConfig {
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let emulator_origin = std::env::var("FIRESTORE_EMULATOR_HOST")
            .ok()
            .filter(|h| !h.is_empty())
            .map(|h| format!("http://{}", h));

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
            emulator_origin,
        })
    }

    /// Config that talks to an emulator (or a mock server) at `origin`.
    pub fn emulator(project_id: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry: RetryConfig {
                max_retries: 2,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
            emulator_origin: Some(origin.into()),
        }
    }
}

enum Auth {
    ServiceAccount(Arc<TokenCache>),
    Emulator,
}

#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    auth: Arc<Auth>,
}

impl FirestoreClient {
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let auth = match config.emulator_origin {
            Some(_) => Auth::Emulator,
            None => Auth::ServiceAccount(Arc::new(TokenCache::new(Self::create_auth_provider()?))),
        };

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("jumpclip-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let origin = config
            .emulator_origin
            .as_deref()
            .unwrap_or(PRODUCTION_ORIGIN)
            .trim_end_matches('/');
        let base_url = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            origin, config.project_id, config.database_id
        );

        Ok(Self {
            http,
            config,
            base_url,
            auth: Arc::new(auth),
        })
    }

    pub async fn from_env() -> FirestoreResult<Self> {
        Self::new(FirestoreConfig::from_env()?).await
    }

    fn create_auth_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    async fn token(&self) -> FirestoreResult<String> {
        match self.auth.as_ref() {
            Auth::ServiceAccount(cache) => cache.get_token().await,
            Auth::Emulator => Ok("owner".to_string()),
        }
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    /// Send a request, refreshing the token once on an expired-token 401.
    async fn send<F>(&self, url: &str, build: F) -> FirestoreResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.token().await?;
        let response = build(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match self.auth.as_ref() {
            Auth::ServiceAccount(cache) if Self::is_access_token_expired(&body) => {
                cache.invalidate().await;
                let token = cache.get_token().await?;
                Ok(build(&token).send().await?)
            }
            _ => Err(FirestoreError::from_http_status(
                status.as_u16(),
                format!("{} failed: {}", url, body),
            )),
        }
    }

    // =========================================================================
    // Documents
    // =========================================================================

    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);

        self.execute_request("get_document", collection, Some(doc_id), async {
            let response = self
                .send(&url, |token| self.http.get(&url).bearer_auth(token))
                .await?;
            match response.status() {
                StatusCode::OK => Ok(Some(response.json().await?)),
                StatusCode::NOT_FOUND => Ok(None),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Create a document; fails with `AlreadyExists` if the id is taken.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );
        let body = Document::new(fields);

        self.execute_request("create_document", collection, Some(doc_id), async {
            let response = self
                .send(&url, |token| self.http.post(&url).bearer_auth(token).json(&body))
                .await?;
            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json().await?),
                StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Patch a document.
    ///
    /// With `update_mask`, only the listed fields are written. With
    /// `update_time`, the write only lands if the stored document still has
    /// that update time; otherwise `PreconditionFailed`. Without either,
    /// this is an upsert of the whole document.
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: Option<&[&str]>,
        update_time: Option<&str>,
    ) -> FirestoreResult<Document> {
        let mut params: Vec<String> = Vec::new();
        if let Some(mask) = update_mask {
            params.extend(mask.iter().map(|f| format!("updateMask.fieldPaths={}", f)));
        }
        if let Some(ts) = update_time {
            params.push(format!(
                "currentDocument.updateTime={}",
                urlencoding::encode(ts)
            ));
        }
        let mut url = self.document_path(collection, doc_id);
        if !params.is_empty() {
            url = format!("{}?{}", url, params.join("&"));
        }
        let body = Document::new(fields);

        self.execute_request("update_document", collection, Some(doc_id), async {
            let response = self
                .send(&url, |token| self.http.patch(&url).bearer_auth(token).json(&body))
                .await?;
            match response.status() {
                StatusCode::OK => Ok(response.json().await?),
                StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
                    let body_text = response.text().await.unwrap_or_default();
                    Err(FirestoreError::PreconditionFailed(format!(
                        "{}/{}: {}",
                        collection, doc_id, body_text
                    )))
                }
                StatusCode::NOT_FOUND => Err(FirestoreError::NotFound(format!(
                    "{}/{}",
                    collection, doc_id
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Run a structured query against the root collections.
    pub async fn run_query(&self, query: StructuredQuery) -> FirestoreResult<Vec<Document>> {
        let url = format!("{}:runQuery", self.base_url);
        let collection = query
            .from
            .first()
            .map(|c| c.collection_id.clone())
            .unwrap_or_default();
        let request = RunQueryRequest {
            structured_query: query,
        };

        self.execute_request("run_query", &collection, None, async {
            let response = self
                .send(&url, |token| self.http.post(&url).bearer_auth(token).json(&request))
                .await?;
            match response.status() {
                StatusCode::OK => {
                    let body = response.text().await.unwrap_or_default();
                    // runQuery streams a JSON array; a row without `document` marks the end
                    let rows: Vec<RunQueryResponse> = serde_json::from_str(&body).map_err(|e| {
                        FirestoreError::request_failed(format!(
                            "Failed to parse runQuery response: {} (body prefix: {})",
                            e,
                            body.chars().take(200).collect::<String>()
                        ))
                    })?;
                    Ok(rows.into_iter().filter_map(|r| r.document).collect())
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    pub async fn with_retry<T, F, Fut>(&self, operation: &str, op: F) -> FirestoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = FirestoreResult<T>>,
    {
        super::retry::with_retry(&self.config.retry, operation, op).await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = match doc_id {
            Some(id) => info_span!("firestore_request", operation = %operation, collection = %collection, doc_id = %id),
            None => info_span!("firestore_request", operation = %operation, collection = %collection),
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_requires_project_id() {
        std::env::remove_var("GCP_PROJECT_ID");
        std::env::remove_var("FIREBASE_PROJECT_ID");
        assert!(FirestoreConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_config_reads_emulator_host() {
        std::env::set_var("GCP_PROJECT_ID", "test-project");
        std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8080");
        std::env::remove_var("FIRESTORE_CONNECT_TIMEOUT_SECS");
        let config = FirestoreConfig::from_env().unwrap();
        std::env::remove_var("FIRESTORE_EMULATOR_HOST");
        std::env::remove_var("GCP_PROJECT_ID");

        assert_eq!(config.emulator_origin.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.database_id, "(default)");
    }

    #[tokio::test]
    async fn test_emulator_base_url() {
        let client = FirestoreClient::new(FirestoreConfig::emulator("p1", "http://127.0.0.1:9000/"))
            .await
            .unwrap();
        assert_eq!(
            client.document_path("jobs", "j1"),
            "http://127.0.0.1:9000/v1/projects/p1/databases/(default)/documents/jobs/j1"
        );
    }
}
