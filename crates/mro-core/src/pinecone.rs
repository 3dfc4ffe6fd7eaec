//! Pinecone data-plane client (upsert, query, index stats) over its REST API.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::error::ServiceError;
use crate::http;
use crate::store::{ChunkMetadata, IndexStats, Match, VectorRecord, VectorStore};

const SERVICE: &str = "pinecone";

/// One Pinecone index, addressed by its host URL.
#[derive(Debug, Clone)]
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    host: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<WireVector<'a>>,
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
struct WireVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: &'a ChunkMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    namespaces: BTreeMap<String, NamespaceStats>,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: u64,
}

impl PineconeIndex {
    /// `host` is the index host from the Pinecone console, with or without scheme.
    pub fn new(
        api_key: impl Into<String>,
        host: &str,
        name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let host = host.trim().trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        url::Url::parse(&host).map_err(|e| ConfigError::InvalidUrl(format!("PINECONE_HOST: {e}")))?;
        Ok(Self {
            client: http::client(http::DEFAULT_TIMEOUT)?,
            api_key: api_key.into(),
            host,
            name: name.into(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.host))
            .header("Api-Key", &self.api_key)
    }
}

#[async_trait]
impl VectorStore for PineconeIndex {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<(), ServiceError> {
        let body = UpsertRequest {
            vectors: records
                .iter()
                .map(|r| WireVector {
                    id: &r.id,
                    values: &r.values,
                    metadata: &r.metadata,
                })
                .collect(),
            namespace,
        };
        let res: UpsertResponse = http::send_json(SERVICE, self.post("/vectors/upsert").json(&body)).await?;
        debug!(index = %self.name, namespace, upserted = res.upserted_count, "upserted vectors");
        Ok(())
    }

    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<Match>, ServiceError> {
        let body = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace,
        };
        let res: QueryResponse = http::send_json(SERVICE, self.post("/query").json(&body)).await?;
        Ok(res.matches)
    }

    async fn describe_stats(&self) -> Result<IndexStats, ServiceError> {
        let res: StatsResponse = http::send_json(
            SERVICE,
            self.post("/describe_index_stats").json(&serde_json::json!({})),
        )
        .await?;
        info!(index = %self.name, total = res.total_vector_count, "index stats");
        Ok(IndexStats {
            dimension: res.dimension,
            total_vector_count: res.total_vector_count,
            namespaces: res
                .namespaces
                .into_iter()
                .map(|(ns, s)| (ns, s.vector_count))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn index(server: &MockServer) -> PineconeIndex {
        PineconeIndex::new("pc-key", &server.uri(), "mro").unwrap()
    }

    #[test]
    fn host_without_scheme_gets_https() {
        let idx = PineconeIndex::new("k", "mro-abc123.svc.us-east1.pinecone.io/", "mro").unwrap();
        assert_eq!(idx.host(), "https://mro-abc123.svc.us-east1.pinecone.io");
    }

    #[tokio::test]
    async fn upsert_sends_namespace_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(header("Api-Key", "pc-key"))
            .and(body_json(serde_json::json!({
                "vectors": [{
                    "id": "abc",
                    "values": [0.5, 0.25],
                    "metadata": {"source": "data/amm.pdf", "page": 3, "text": "Fig. 32-4",
                                 "figure_reference": "Fig. 32-4", "low_text": true}
                }],
                "namespace": "ns1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"upsertedCount": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let record = VectorRecord {
            id: "abc".to_string(),
            values: vec![0.5, 0.25],
            metadata: ChunkMetadata {
                source: "data/amm.pdf".to_string(),
                page: Some(3),
                text: "Fig. 32-4".to_string(),
                figure_reference: Some("Fig. 32-4".to_string()),
                low_text: true,
                ..ChunkMetadata::default()
            },
        };
        index(&server).upsert("ns1", vec![record]).await.unwrap();
    }

    #[tokio::test]
    async fn query_returns_matches_in_store_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(serde_json::json!({
                "topK": 5, "includeMetadata": true, "namespace": "ns1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "matches": [
                    {"id": "b", "score": 0.91, "values": [],
                     "metadata": {"source": "amm.pdf", "page": 12.0, "text": "Brake wear limits"}},
                    {"id": "a", "score": 0.42,
                     "metadata": {"source": "amm.txt", "text": "Cabin lights"}}
                ],
                "namespace": "ns1"
            })))
            .mount(&server)
            .await;

        let hits = index(&server).query("ns1", &[0.1, 0.2], 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "b");
        assert_eq!(hits[0].metadata.page, Some(12));
        assert_eq!(hits[1].metadata.page, None);
        assert_eq!(hits[1].metadata.text, "Cabin lights");
    }

    #[tokio::test]
    async fn describe_stats_maps_namespaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/describe_index_stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "namespaces": {"ns1": {"vectorCount": 42}},
                "dimension": 1024,
                "indexFullness": 0.0,
                "totalVectorCount": 42
            })))
            .mount(&server)
            .await;

        let stats = index(&server).describe_stats().await.unwrap();
        assert_eq!(stats.total_vector_count, 42);
        assert_eq!(stats.dimension, Some(1024));
        assert_eq!(stats.namespaces.get("ns1"), Some(&42));
    }

    #[tokio::test]
    async fn auth_failure_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = index(&server).query("ns1", &[1.0], 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Status { service: "pinecone", status: 403, .. }));
    }
}
