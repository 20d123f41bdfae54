//! # Vector Store Client
//!
//! ## Purpose
//! Contract and HTTP implementation for the external vector store holding
//! per-scope collections of embedding points with filterable payloads
//! (Qdrant-style REST API).
//!
//! ## Input/Output Specification
//! - **Input**: Collection name, vectors, native filter conditions, limits
//! - **Output**: Upsert acknowledgements, scored points with payloads,
//!   fetched points with optional vectors
//! - **Payloads**: Denormalized resolution metadata for faceted search

use crate::errors::{IntelError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A point to upsert into a collection
#[derive(Debug, Clone, Serialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

/// A similarity hit returned by a search
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: Value,
    pub score: f32,
    #[serde(default)]
    pub payload: Value,
}

impl ScoredPoint {
    /// Resolution id carried in the point payload, if any
    pub fn resolution_id(&self) -> Option<&str> {
        self.payload.get("resolution_id").and_then(Value::as_str)
    }
}

/// A point fetched by id
#[derive(Debug, Clone, Deserialize)]
pub struct FetchedPoint {
    pub id: Value,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
    #[serde(default)]
    pub payload: Value,
}

/// Contract for the vector store
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert points into a collection
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()>;

    /// Search a collection by similarity with an optional native filter
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: Option<Value>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredPoint>>;

    /// Fetch points by id, optionally including their vectors
    async fn fetch(
        &self,
        collection: &str,
        ids: &[String],
        with_vector: bool,
    ) -> Result<Vec<FetchedPoint>>;
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct FetchResponse {
    #[serde(default)]
    result: Vec<FetchedPoint>,
}

/// Qdrant-style REST client
pub struct QdrantClient {
    client: reqwest::Client,
    config: crate::config::VectorConfig,
}

impl QdrantClient {
    pub fn new(config: crate::config::VectorConfig) -> Result<Self> {
        let client = super::http_client(config.timeout_seconds, super::USER_AGENT)?;
        Ok(Self { client, config })
    }

    fn points_url(&self, collection: &str, suffix: &str) -> String {
        format!(
            "{}/collections/{}/points{}",
            self.config.url.trim_end_matches('/'),
            collection,
            suffix
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    fn check_status(response: &reqwest::Response, operation: &str) -> Result<()> {
        if !response.status().is_success() {
            return Err(IntelError::ExternalService {
                service: "vector-store".to_string(),
                details: format!("{} returned HTTP {}", operation, response.status()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantClient {
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()> {
        let body = serde_json::json!({ "points": points });

        let response = self
            .authorized(self.client.put(self.points_url(collection, "")))
            .json(&body)
            .send()
            .await?;

        Self::check_status(&response, "upsert")
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        filter: Option<Value>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<ScoredPoint>> {
        let mut body = serde_json::json!({
            "vector": vector,
            "limit": limit,
            "score_threshold": min_score,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }

        let response = self
            .authorized(self.client.post(self.points_url(collection, "/search")))
            .json(&body)
            .send()
            .await?;

        Self::check_status(&response, "search")?;

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.result)
    }

    async fn fetch(
        &self,
        collection: &str,
        ids: &[String],
        with_vector: bool,
    ) -> Result<Vec<FetchedPoint>> {
        let body = serde_json::json!({
            "ids": ids,
            "with_vector": with_vector,
            "with_payload": true,
        });

        let response = self
            .authorized(self.client.post(self.points_url(collection, "")))
            .json(&body)
            .send()
            .await?;

        Self::check_status(&response, "fetch")?;

        let parsed: FetchResponse = response.json().await?;
        Ok(parsed.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: String) -> VectorConfig {
        VectorConfig {
            url,
            api_key: None,
            collection_national: "legal_intelligence".to_string(),
            collection_cross_border: "legal_intelligence_eu".to_string(),
            timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn test_search_deserializes_scored_points() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/collections/legal_intelligence/points/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [
                    {
                        "id": "11111111-1111-1111-1111-111111111111",
                        "score": 0.83,
                        "payload": {"resolution_id": "22222222-2222-2222-2222-222222222222"}
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = QdrantClient::new(test_config(server.uri())).unwrap();
        let hits = client
            .search("legal_intelligence", &[0.1, 0.2], None, 10, 0.65)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(
            hits[0].resolution_id(),
            Some("22222222-2222-2222-2222-222222222222")
        );
    }

    #[tokio::test]
    async fn test_upsert_error_status_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/collections/legal_intelligence/points"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = QdrantClient::new(test_config(server.uri())).unwrap();
        let result = client
            .upsert(
                "legal_intelligence",
                vec![VectorPoint {
                    id: "p1".to_string(),
                    vector: vec![0.0; 4],
                    payload: serde_json::json!({}),
                }],
            )
            .await;

        assert!(result.is_err());
    }
}
