//! # Search Resolver Module
//!
//! ## Purpose
//! Resolves user queries against the enriched resolution corpus: exact
//! juridical references short-circuit to a store lookup, free text goes
//! through query embedding and per-scope vector search with conjunctive
//! faceted filters, cross-collection deduplication and hydration.
//!
//! ## Input/Output Specification
//! - **Input**: Query text, optional facet filters, scope, result limit
//! - **Output**: Structured response with hydrated hits, facet counts and a
//!   generic error message on failure (never a raw exception)
//! - **Reference Patterns**: DGT consultations, supreme/constitutional court
//!   judgments, administrative appeals, ECLI, EU case numbers, CELEX
//!
//! ## Key Features
//! - Exact-then-fuzzy reference lookup bypassing the vector store entirely
//! - Query embedding with a small in-memory cache
//! - Conjunctive (`AND`) filter construction with inclusive date ranges
//! - Cross-collection dedup keeping the best score per resolution

use crate::clients::ai::EmbeddingProvider;
use crate::clients::vector::{ScoredPoint, VectorStore};
use crate::config::{SearchConfig, VectorConfig};
use crate::storage::DocumentStore;
use crate::utils::round_score;
use crate::{Resolution, ResolutionId, Scope};
use chrono::NaiveDate;
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;
use uuid::Uuid;

/// Facet filters applied conjunctively to a search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub source_id: Option<String>,
    pub jurisdiction: Option<String>,
    pub resolution_type: Option<String>,
    pub issuing_body: Option<String>,
    pub status_legal: Option<String>,
    pub importance_level: Option<u8>,
    /// Inclusive lower bound on issue date
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on issue date
    pub date_to: Option<NaiveDate>,
}

/// One hydrated search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub source_id: String,
    pub external_ref: String,
    pub resolution_type: String,
    pub issuing_body: String,
    pub jurisdiction: String,
    pub date_issued: String,
    pub status_legal: String,
    pub abstract_ai: String,
    pub key_holdings: String,
    pub topics: Vec<String>,
    pub original_url: String,
    pub importance_level: u8,
    pub is_cross_border: bool,
    pub ecli: String,
    pub celex_number: String,
    pub impact_analysis: String,
    pub score: f32,
}

/// Structured search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub facets: HashMap<String, HashMap<String, usize>>,
    pub error: Option<String>,
}

impl SearchResponse {
    fn failure(message: &str) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            total: 0,
            facets: HashMap::new(),
            error: Some(message.to_string()),
        }
    }

    fn success(results: Vec<SearchHit>) -> Self {
        let facets = build_facets(&results);
        Self {
            success: true,
            total: results.len(),
            results,
            facets,
            error: None,
        }
    }
}

/// Patterns that identify a query as an exact juridical reference.
///
/// A match bypasses vector search entirely in favor of a store lookup.
fn reference_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // DGT binding consultations: V0123-24.
            r"(?i)^V\d{4}-\d{2}$",
            // Supreme court judgments: STS 1234/2024.
            r"(?i)^STS\s+\d+/\d{4}$",
            // Constitutional court judgments: STC 1/2024.
            r"(?i)^STC\s+\d+/\d{4}$",
            // Administrative appeal resolutions: RG 1234/2024.
            r"(?i)^RG\s+\d+/\d{4}$",
            // European Case Law Identifier: ECLI:EU:C:2013:164.
            r"(?i)^ECLI:[A-Z]{2}:[A-Z]:\d{4}:\d+$",
            // EU court cases: C-415/11.
            r"(?i)^C-\d+/\d{2}$",
            // CELEX numbers: 62011CJ0415.
            r"(?i)^\d{5}[A-Z]{2}\d{4}$",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// Per-field facet counts over a result set
fn build_facets(results: &[SearchHit]) -> HashMap<String, HashMap<String, usize>> {
    let mut facets: HashMap<String, HashMap<String, usize>> = HashMap::new();

    for field in [
        "source_id",
        "jurisdiction",
        "resolution_type",
        "issuing_body",
        "status_legal",
    ] {
        facets.insert(field.to_string(), HashMap::new());
    }

    for hit in results {
        let values = [
            ("source_id", &hit.source_id),
            ("jurisdiction", &hit.jurisdiction),
            ("resolution_type", &hit.resolution_type),
            ("issuing_body", &hit.issuing_body),
            ("status_legal", &hit.status_legal),
        ];
        for (field, value) in values {
            if !value.is_empty() {
                if let Some(counts) = facets.get_mut(field) {
                    *counts.entry(value.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    facets
}

/// Semantic search resolver
pub struct SearchResolver {
    store: Arc<DocumentStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStore>,
    search_config: SearchConfig,
    vector_config: VectorConfig,
    embedding_cache: DashMap<String, Vec<f32>>,
}

impl SearchResolver {
    pub fn new(
        store: Arc<DocumentStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        search_config: SearchConfig,
        vector_config: VectorConfig,
    ) -> Self {
        Self {
            store,
            embeddings,
            vectors,
            search_config,
            vector_config,
            embedding_cache: DashMap::new(),
        }
    }

    /// Resolve a query with optional facet filters.
    ///
    /// Exact juridical references are answered from the document store with
    /// a similarity score of 1.0; everything else goes through embedding and
    /// per-scope vector search.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        scope: Scope,
        limit: usize,
    ) -> SearchResponse {
        let max_results = if limit > 0 {
            limit
        } else {
            self.search_config.max_results
        };

        let query = query.trim();
        if query.is_empty() {
            return SearchResponse::failure("Query is empty.");
        }

        if Self::is_exact_reference(query) {
            return self.lookup_by_reference(query);
        }

        let Some(embedding) = self.embed_query(query).await else {
            return SearchResponse::failure("Could not generate query embedding.");
        };

        let filter = build_vector_filter(filters);

        // Collections are independent; query them concurrently.
        let searches = self.collections_for_scope(scope).into_iter().map(|collection| {
            let filter = filter.clone();
            let embedding = &embedding;
            async move {
                (
                    collection,
                    self.vectors
                        .search(
                            collection,
                            embedding,
                            filter,
                            max_results * 3,
                            self.search_config.min_score,
                        )
                        .await,
                )
            }
        });

        let mut raw_hits: Vec<ScoredPoint> = Vec::new();
        for (collection, result) in futures::future::join_all(searches).await {
            match result {
                Ok(points) => raw_hits.extend(points),
                Err(e) => {
                    tracing::warn!(collection, error = %e, "Vector search failed for collection");
                }
            }
        }

        let mut deduped = Self::deduplicate(raw_hits);
        deduped.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        deduped.truncate(max_results);

        let hydrated = self.hydrate(&deduped);
        SearchResponse::success(hydrated)
    }

    /// Look up resolutions similar to a given one, reusing its own stored
    /// vector and excluding the document itself.
    pub async fn find_similar(&self, resolution_id: ResolutionId, limit: usize) -> Vec<SearchHit> {
        let resolution = match self.store.get_resolution(&resolution_id) {
            Ok(Some(resolution)) => resolution,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(id = %resolution_id, error = %e, "Similar lookup could not load resolution");
                return Vec::new();
            }
        };

        let Some(first_vector_id) = resolution.vector_ids.first() else {
            return Vec::new();
        };

        let collection = if resolution.vector_collection.is_empty() {
            self.vector_config.collection_national.clone()
        } else {
            resolution.vector_collection.clone()
        };

        let fetched = match self
            .vectors
            .fetch(&collection, &[first_vector_id.clone()], true)
            .await
        {
            Ok(points) => points,
            Err(e) => {
                tracing::warn!(id = %resolution_id, error = %e, "Similar lookup could not fetch vector");
                return Vec::new();
            }
        };

        let Some(vector) = fetched.into_iter().next().and_then(|p| p.vector) else {
            return Vec::new();
        };

        let filter = json!({
            "must_not": [
                {"key": "resolution_id", "match": {"value": resolution_id.to_string()}},
            ],
        });

        let points = match self
            .vectors
            .search(
                &collection,
                &vector,
                Some(filter),
                limit * 3,
                self.search_config.min_score,
            )
            .await
        {
            Ok(points) => points,
            Err(e) => {
                tracing::warn!(id = %resolution_id, error = %e, "Similar search failed");
                return Vec::new();
            }
        };

        let mut deduped = Self::deduplicate(points);
        deduped.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        deduped.truncate(limit);

        self.hydrate(&deduped)
    }

    /// Exact (then fuzzy substring) lookup by external reference
    pub fn lookup_by_reference(&self, reference: &str) -> SearchResponse {
        let exact = match self.store.find_by_external_ref(reference) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(reference, error = %e, "Reference lookup failed");
                return SearchResponse::failure("Error looking up reference.");
            }
        };

        let resolutions = match exact {
            Some(resolution) => vec![resolution],
            None => match self.store.find_external_ref_contains(reference, 10) {
                Ok(matches) => matches,
                Err(e) => {
                    tracing::error!(reference, error = %e, "Fuzzy reference lookup failed");
                    return SearchResponse::failure("Error looking up reference.");
                }
            },
        };

        let hits = resolutions
            .into_iter()
            .map(|r| resolution_to_hit(&r, 1.0))
            .collect();

        SearchResponse::success(hits)
    }

    /// Whether the query matches a known exact-reference pattern
    pub fn is_exact_reference(query: &str) -> bool {
        let query = query.trim();
        reference_patterns().iter().any(|p| p.is_match(query))
    }

    /// Embed the query with the indexing-time model, via a bounded cache
    async fn embed_query(&self, query: &str) -> Option<Vec<f32>> {
        if let Some(cached) = self.embedding_cache.get(query) {
            return Some(cached.clone());
        }

        match self.embeddings.embed(query).await {
            Ok(vector) => {
                if self.embedding_cache.len() >= self.search_config.embedding_cache_size {
                    // Simple eviction: drop an arbitrary entry.
                    if let Some(key) = self.embedding_cache.iter().next().map(|e| e.key().clone()) {
                        self.embedding_cache.remove(&key);
                    }
                }
                self.embedding_cache.insert(query.to_string(), vector.clone());
                Some(vector)
            }
            Err(e) => {
                tracing::error!(error = %e, "Query embedding failed");
                None
            }
        }
    }

    /// Collections implied by the search scope
    fn collections_for_scope(&self, scope: Scope) -> Vec<&str> {
        match scope {
            Scope::National => vec![self.vector_config.collection_national.as_str()],
            Scope::CrossBorder => vec![self.vector_config.collection_cross_border.as_str()],
            Scope::All => vec![
                self.vector_config.collection_national.as_str(),
                self.vector_config.collection_cross_border.as_str(),
            ],
        }
    }

    /// Keep the best-scored point per resolution across collections.
    ///
    /// Multiple chunks of the same resolution surface as separate points;
    /// only the highest score survives.
    fn deduplicate(points: Vec<ScoredPoint>) -> Vec<ScoredPoint> {
        let mut best: HashMap<String, ScoredPoint> = HashMap::new();

        for point in points {
            let Some(resolution_id) = point.resolution_id().map(str::to_string) else {
                continue;
            };

            match best.get(&resolution_id) {
                Some(existing) if existing.score >= point.score => {}
                _ => {
                    best.insert(resolution_id, point);
                }
            }
        }

        best.into_values().collect()
    }

    /// Load the backing resolutions; records deleted since indexing are
    /// silently dropped.
    fn hydrate(&self, points: &[ScoredPoint]) -> Vec<SearchHit> {
        let mut hits = Vec::with_capacity(points.len());

        for point in points {
            let Some(id) = point
                .resolution_id()
                .and_then(|raw| Uuid::parse_str(raw).ok())
            else {
                continue;
            };

            match self.store.get_resolution(&id) {
                Ok(Some(resolution)) => hits.push(resolution_to_hit(&resolution, point.score)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Hydration failed for resolution");
                }
            }
        }

        hits
    }
}

/// Conjunctive vector-store filter from the user's facet filters
fn build_vector_filter(filters: &SearchFilters) -> Option<Value> {
    let mut must = Vec::new();

    let match_fields = [
        ("source_id", &filters.source_id),
        ("jurisdiction", &filters.jurisdiction),
        ("resolution_type", &filters.resolution_type),
        ("issuing_body", &filters.issuing_body),
        ("status_legal", &filters.status_legal),
    ];

    for (key, value) in match_fields {
        if let Some(value) = value {
            if !value.is_empty() {
                must.push(json!({"key": key, "match": {"value": value}}));
            }
        }
    }

    if let Some(importance) = filters.importance_level {
        must.push(json!({"key": "importance_level", "match": {"value": importance}}));
    }

    if let Some(date_from) = filters.date_from {
        must.push(json!({
            "key": "date_issued",
            "range": {"gte": date_from.format("%Y-%m-%d").to_string()},
        }));
    }

    if let Some(date_to) = filters.date_to {
        must.push(json!({
            "key": "date_issued",
            "range": {"lte": date_to.format("%Y-%m-%d").to_string()},
        }));
    }

    if must.is_empty() {
        None
    } else {
        Some(json!({"must": must}))
    }
}

/// Flatten a resolution into the wire-format search hit
fn resolution_to_hit(resolution: &Resolution, score: f32) -> SearchHit {
    SearchHit {
        id: resolution.id.to_string(),
        title: resolution.title.clone(),
        source_id: resolution.source_id.clone(),
        external_ref: resolution.external_ref.clone(),
        resolution_type: resolution.resolution_type.clone(),
        issuing_body: resolution.issuing_body.clone(),
        jurisdiction: resolution.jurisdiction.clone(),
        date_issued: resolution
            .date_issued
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        status_legal: resolution.status_legal.as_str().to_string(),
        abstract_ai: resolution.abstract_ai.clone(),
        key_holdings: resolution.key_holdings.clone(),
        topics: resolution.topics.clone(),
        original_url: resolution.original_url.clone(),
        importance_level: resolution.importance_level,
        is_cross_border: resolution.is_cross_border(),
        ecli: resolution.ecli.clone(),
        celex_number: resolution.celex_number.clone(),
        impact_analysis: resolution.impact_analysis.clone(),
        score: round_score(score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::errors::{IntelError, Result};
    use crate::storage::tests::{sample_resolution, temp_store};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbeddings {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbeddings {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.5; 8])
        }
    }

    struct FailingEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbeddings {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(IntelError::ExternalService {
                service: "ai-embeddings".to_string(),
                details: "down".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct ScriptedVectorStore {
        points: Vec<ScoredPoint>,
        fetch_vector: Option<Vec<f32>>,
        captured_filters: Mutex<Vec<Option<Value>>>,
    }

    #[async_trait]
    impl VectorStore for ScriptedVectorStore {
        async fn upsert(
            &self,
            _collection: &str,
            _points: Vec<crate::clients::vector::VectorPoint>,
        ) -> Result<()> {
            Ok(())
        }

        async fn search(
            &self,
            _collection: &str,
            _vector: &[f32],
            filter: Option<Value>,
            _limit: usize,
            _min_score: f32,
        ) -> Result<Vec<ScoredPoint>> {
            self.captured_filters.lock().push(filter);
            Ok(self.points.clone())
        }

        async fn fetch(
            &self,
            _collection: &str,
            ids: &[String],
            _with_vector: bool,
        ) -> Result<Vec<crate::clients::vector::FetchedPoint>> {
            Ok(self
                .fetch_vector
                .as_ref()
                .map(|v| {
                    vec![crate::clients::vector::FetchedPoint {
                        id: Value::from(ids[0].clone()),
                        vector: Some(v.clone()),
                        payload: Value::Null,
                    }]
                })
                .unwrap_or_default())
        }
    }

    fn scored(resolution_id: &str, score: f32) -> ScoredPoint {
        ScoredPoint {
            id: Value::from(Uuid::new_v4().to_string()),
            score,
            payload: json!({"resolution_id": resolution_id}),
        }
    }

    fn resolver_with(
        embeddings: Arc<dyn EmbeddingProvider>,
        vectors: ScriptedVectorStore,
    ) -> (SearchResolver, Arc<DocumentStore>, tempfile::TempDir) {
        let (store, dir) = temp_store();
        let store = Arc::new(store);
        let config = Config::default();
        let resolver = SearchResolver::new(
            store.clone(),
            embeddings,
            Arc::new(vectors),
            config.search.clone(),
            config.vector.clone(),
        );
        (resolver, store, dir)
    }

    #[test]
    fn test_reference_patterns() {
        for query in [
            "V0123-24",
            "STS 1234/2024",
            "STC 1/2024",
            "RG 1234/2024",
            "ECLI:EU:C:2013:164",
            "C-415/11",
            "62011CJ0415",
            "  C-415/11  ",
        ] {
            assert!(SearchResolver::is_exact_reference(query), "{}", query);
        }

        for query in [
            "deducción por inversión en vivienda",
            "STS sobre IRPF",
            "C-415",
            "",
        ] {
            assert!(!SearchResolver::is_exact_reference(query), "{}", query);
        }
    }

    #[tokio::test]
    async fn test_exact_reference_bypasses_embedding() {
        let embeddings = Arc::new(CountingEmbeddings {
            calls: AtomicUsize::new(0),
        });
        let (resolver, store, _dir) =
            resolver_with(embeddings.clone(), ScriptedVectorStore::default());

        store
            .create_resolution(&sample_resolution("C-415/11", "tjue"))
            .unwrap();

        let response = resolver
            .search("C-415/11", &SearchFilters::default(), Scope::All, 10)
            .await;

        assert!(response.success);
        assert_eq!(response.total, 1);
        assert_eq!(response.results[0].score, 1.0);
        assert_eq!(response.results[0].external_ref, "C-415/11");
        assert_eq!(embeddings.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cross_collection_dedup_keeps_best_score() {
        let resolution = sample_resolution("STS 10/2024", "cendoj");
        let id = resolution.id.to_string();

        // Both collections return chunks of the same resolution; the higher
        // score must win and only one hit must survive.
        let vectors = ScriptedVectorStore {
            points: vec![scored(&id, 0.71), scored(&id, 0.88)],
            ..Default::default()
        };
        let embeddings = Arc::new(CountingEmbeddings {
            calls: AtomicUsize::new(0),
        });
        let (resolver, store, _dir) = resolver_with(embeddings, vectors);
        store.create_resolution(&resolution).unwrap();

        let response = resolver
            .search(
                "cláusulas suelo",
                &SearchFilters::default(),
                Scope::National,
                10,
            )
            .await;

        assert!(response.success);
        assert_eq!(response.total, 1);
        assert_eq!(response.results[0].score, 0.88);
    }

    #[tokio::test]
    async fn test_deleted_resolutions_are_silently_dropped() {
        let vectors = ScriptedVectorStore {
            points: vec![scored(&Uuid::new_v4().to_string(), 0.9)],
            ..Default::default()
        };
        let embeddings = Arc::new(CountingEmbeddings {
            calls: AtomicUsize::new(0),
        });
        let (resolver, _store, _dir) = resolver_with(embeddings, vectors);

        let response = resolver
            .search("plusvalía municipal", &SearchFilters::default(), Scope::All, 10)
            .await;

        assert!(response.success);
        assert_eq!(response.total, 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_returns_structured_error() {
        let (resolver, _store, _dir) =
            resolver_with(Arc::new(FailingEmbeddings), ScriptedVectorStore::default());

        let response = resolver
            .search("despido improcedente", &SearchFilters::default(), Scope::All, 10)
            .await;

        assert!(!response.success);
        assert!(response.error.is_some());
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let embeddings = Arc::new(CountingEmbeddings {
            calls: AtomicUsize::new(0),
        });
        let (resolver, _store, _dir) = resolver_with(embeddings, ScriptedVectorStore::default());

        let response = resolver
            .search("   ", &SearchFilters::default(), Scope::All, 10)
            .await;
        assert!(!response.success);
    }

    #[test]
    fn test_conjunctive_filter_construction() {
        let filters = SearchFilters {
            source_id: Some("boe".to_string()),
            importance_level: Some(1),
            date_from: NaiveDate::from_ymd_opt(2024, 1, 1),
            date_to: NaiveDate::from_ymd_opt(2024, 12, 31),
            ..Default::default()
        };

        let filter = build_vector_filter(&filters).unwrap();
        let must = filter["must"].as_array().unwrap();
        assert_eq!(must.len(), 4);
        assert_eq!(must[0]["key"], "source_id");
        assert_eq!(must[2]["range"]["gte"], "2024-01-01");
        assert_eq!(must[3]["range"]["lte"], "2024-12-31");

        assert!(build_vector_filter(&SearchFilters::default()).is_none());
    }

    #[tokio::test]
    async fn test_find_similar_excludes_source_document() {
        let similar = sample_resolution("STS 20/2024", "cendoj");
        let vectors = ScriptedVectorStore {
            points: vec![scored(&similar.id.to_string(), 0.8)],
            fetch_vector: Some(vec![0.4; 8]),
            ..Default::default()
        };
        let embeddings = Arc::new(CountingEmbeddings {
            calls: AtomicUsize::new(0),
        });
        let (resolver, store, _dir) = resolver_with(embeddings, vectors);

        let mut source = sample_resolution("STS 19/2024", "cendoj");
        source.vector_ids = vec!["v1".to_string()];
        source.vector_collection = "legal_intelligence".to_string();
        store.create_resolution(&source).unwrap();
        store.create_resolution(&similar).unwrap();

        let hits = resolver.find_similar(source.id, 5).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].external_ref, "STS 20/2024");
    }

    #[tokio::test]
    async fn test_find_similar_without_vectors_is_empty() {
        let embeddings = Arc::new(CountingEmbeddings {
            calls: AtomicUsize::new(0),
        });
        let (resolver, store, _dir) = resolver_with(embeddings, ScriptedVectorStore::default());

        let source = sample_resolution("STS 21/2024", "cendoj");
        store.create_resolution(&source).unwrap();

        assert!(resolver.find_similar(source.id, 5).await.is_empty());
    }

    #[test]
    fn test_facet_counts() {
        let mut a = sample_resolution("STS 1/2024", "cendoj");
        a.jurisdiction = "fiscal".to_string();
        let mut b = sample_resolution("STS 2/2024", "cendoj");
        b.jurisdiction = "fiscal".to_string();
        let mut c = sample_resolution("BOE-A-2024-1", "boe");
        c.jurisdiction = String::new();

        let hits: Vec<SearchHit> = [&a, &b, &c]
            .iter()
            .map(|r| resolution_to_hit(r, 0.8))
            .collect();
        let facets = build_facets(&hits);

        assert_eq!(facets["source_id"]["cendoj"], 2);
        assert_eq!(facets["source_id"]["boe"], 1);
        assert_eq!(facets["jurisdiction"]["fiscal"], 2);
        assert!(!facets["jurisdiction"].contains_key(""));
    }
}
