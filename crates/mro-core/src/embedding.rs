//! Text → vector, through a hosted embedding model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::error::ServiceError;
use crate::http;

pub const DEFAULT_COHERE_MODEL: &str = "embed-multilingual-v3.0";
pub const COHERE_BASE_URL: &str = "https://api.cohere.com";

const SERVICE: &str = "cohere";

/// What the text will be used for. Some models embed documents and queries differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Document,
    Query,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single string. One call per text; no batching.
    async fn embed(&self, text: &str, kind: InputKind) -> Result<Vec<f32>, ServiceError>;

    fn model(&self) -> &str;
}

/// Cohere `/v1/embed` client.
#[derive(Debug, Clone)]
pub struct CohereEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: [&'a str; 1],
    model: &'a str,
    input_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl CohereEmbedder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            client: http::client(http::DEFAULT_TIMEOUT)?,
            api_key: api_key.into(),
            model: model.into(),
            base_url: COHERE_BASE_URL.to_string(),
        })
    }

    /// Point at another host (proxies, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn input_type(kind: InputKind) -> &'static str {
        match kind {
            InputKind::Document => "classification",
            InputKind::Query => "search_query",
        }
    }
}

#[async_trait]
impl Embedder for CohereEmbedder {
    async fn embed(&self, text: &str, kind: InputKind) -> Result<Vec<f32>, ServiceError> {
        let body = EmbedRequest {
            texts: [text],
            model: &self.model,
            input_type: Self::input_type(kind),
        };
        let request = self
            .client
            .post(format!("{}/v1/embed", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body);
        let res: EmbedResponse = http::send_json(SERVICE, request).await?;
        let embedding = res
            .embeddings
            .into_iter()
            .next()
            .filter(|e| !e.is_empty())
            .ok_or(ServiceError::Empty {
                service: SERVICE,
                what: "embedding",
            })?;
        debug!(dims = embedding.len(), ?kind, "embedded text");
        Ok(embedding)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn embedder(server: &MockServer) -> CohereEmbedder {
        CohereEmbedder::new("co-key", DEFAULT_COHERE_MODEL)
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn embeds_documents_with_classification_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed"))
            .and(header("authorization", "Bearer co-key"))
            .and(body_partial_json(serde_json::json!({
                "texts": ["Torque to 45 Nm"],
                "model": "embed-multilingual-v3.0",
                "input_type": "classification"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "x", "embeddings": [[0.1, 0.2, 0.3]]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let v = embedder(&server)
            .embed("Torque to 45 Nm", InputKind::Document)
            .await
            .unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn queries_use_search_query_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed"))
            .and(body_partial_json(serde_json::json!({"input_type": "search_query"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"embeddings": [[1.0]]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let v = embedder(&server).embed("brake wear", InputKind::Query).await.unwrap();
        assert_eq!(v, vec![1.0]);
    }

    #[tokio::test]
    async fn http_errors_carry_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embed"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api token"))
            .mount(&server)
            .await;

        let err = embedder(&server).embed("x", InputKind::Query).await.unwrap_err();
        match err {
            ServiceError::Status { service, status, body } => {
                assert_eq!(service, "cohere");
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_embedding_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"embeddings": []})))
            .mount(&server)
            .await;

        let err = embedder(&server).embed("x", InputKind::Document).await.unwrap_err();
        assert!(matches!(err, ServiceError::Empty { what: "embedding", .. }));
    }
}
