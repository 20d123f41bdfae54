//! # Enrichment Pipeline Module
//!
//! ## Purpose
//! Nine-stage pipeline that turns a freshly ingested raw resolution into
//! structured, searchable knowledge: plain text, structural segments,
//! juridical entities, AI classification and summaries, embedding vectors,
//! vector-store points and citation-graph edges.
//!
//! ## Input/Output Specification
//! - **Input**: Resolution id of an ingested document
//! - **Output**: Enriched resolution persisted in one final write; vector
//!   points indexed; citation edges upserted
//! - **Stages**: extraction, normalization, segmentation, entity extraction,
//!   classification, summarization, chunking + embedding, indexing,
//!   citation graph
//!
//! ## Failure Model
//! Stage 1 (extraction) is the only hard prerequisite: with no obtainable
//! text the pipeline aborts without mutation. Every later stage is caught
//! at its boundary; a failing stage yields its documented empty/fallback
//! value and the pipeline continues with whatever upstream output exists.

use crate::clients::ai::{parse_model_json, ChatProvider, EmbeddingProvider, ModelJson};
use crate::clients::extraction::TextExtraction;
use crate::clients::nlp::{NerEntity, NlpService, Segment};
use crate::clients::vector::{VectorPoint, VectorStore};
use crate::config::{AiConfig, PipelineConfig, VectorConfig};
use crate::errors::{IntelError, Result};
use crate::storage::DocumentStore;
use crate::text_processing::{self, Chunk};
use crate::{CitationEdge, CitedReference, RelationType, Resolution, ResolutionId};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// An embedded chunk ready for indexing
struct EmbeddedChunk {
    vector: Vec<f32>,
    payload: serde_json::Value,
}

/// Nine-stage enrichment pipeline
pub struct EnrichmentPipeline {
    store: Arc<DocumentStore>,
    extractor: Arc<dyn TextExtraction>,
    nlp: Arc<dyn NlpService>,
    chat: Arc<dyn ChatProvider>,
    embeddings: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStore>,
    config: PipelineConfig,
    ai_config: AiConfig,
    vector_config: VectorConfig,
}

impl EnrichmentPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<DocumentStore>,
        extractor: Arc<dyn TextExtraction>,
        nlp: Arc<dyn NlpService>,
        chat: Arc<dyn ChatProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        config: PipelineConfig,
        ai_config: AiConfig,
        vector_config: VectorConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            nlp,
            chat,
            embeddings,
            vectors,
            config,
            ai_config,
            vector_config,
        }
    }

    /// Run the full pipeline for one resolution.
    ///
    /// All enriched fields are persisted in a single write at the end; a
    /// failing optional stage leaves its fields untouched but never rolls
    /// back what earlier stages produced.
    pub async fn process(&self, resolution_id: ResolutionId) -> Result<()> {
        let mut resolution =
            self.store
                .get_resolution(&resolution_id)?
                .ok_or(IntelError::NotFound {
                    entity: "resolution",
                    id: resolution_id.to_string(),
                })?;

        let external_ref = resolution.external_ref.clone();
        let cross_border = resolution.is_cross_border();

        tracing::info!(external_ref = %external_ref, source = %resolution.source_id, "Starting enrichment");

        // === Stage 1: text extraction ===
        if resolution.full_text.is_empty() && !resolution.original_url.is_empty() {
            match self.extractor.extract(&resolution.original_url).await {
                Ok(text) if !text.is_empty() => {
                    resolution.content_hash =
                        crate::ingestion::IngestionCoordinator::content_hash(&text);
                    resolution.full_text = text;
                }
                Ok(_) => {
                    tracing::warn!(external_ref = %external_ref, "Extraction returned empty text");
                }
                Err(e) => {
                    tracing::error!(external_ref = %external_ref, error = %e, "Text extraction failed");
                }
            }
        }

        if resolution.full_text.is_empty() {
            tracing::warn!(external_ref = %external_ref, "No text available, pipeline aborted");
            return Err(IntelError::MissingText { external_ref });
        }

        // === Stage 2: normalization ===
        let normalized = text_processing::normalize(&resolution.full_text);
        resolution.full_text = normalized.clone();
        let process_text =
            text_processing::truncate_chars(&normalized, self.config.max_text_length).to_string();

        // === Stage 3: segmentation ===
        let segments = self.segment(&process_text, &resolution.source_id).await;

        // === Stage 4: juridical entity extraction ===
        let ner_entities = self.extract_entities(&process_text).await;

        // === Stage 5: classification ===
        let classification = self.classify(&process_text, cross_border).await;
        Self::apply_classification(&mut resolution, &classification);

        // === Stage 6: summarization ===
        let summary = self.summarize(&process_text, cross_border).await;
        Self::apply_summary(&mut resolution, &summary, cross_border);

        // === Stage 7: chunking and embedding ===
        let chunks = text_processing::chunk_segments(
            &segments,
            &process_text,
            self.config.chunk_max_tokens,
            self.config.chunk_overlap_tokens,
        );
        let embedded = self.embed_chunks(&chunks, &resolution).await;

        // === Stage 8: vector indexing ===
        let collection = self
            .vector_config
            .collection_for_source(&resolution.source_id)
            .to_string();
        let vector_ids = self.index_embeddings(&collection, embedded).await;
        resolution.vector_ids = vector_ids;
        resolution.vector_collection = collection;

        // === Stage 9: citation graph ===
        self.build_citation_graph(resolution.id, &external_ref, &ner_entities);

        resolution.cited_legislation = Self::extract_cited_legislation(&ner_entities);
        resolution.last_enriched_at = Some(Utc::now());

        self.store.save_resolution(&resolution)?;

        tracing::info!(
            external_ref = %external_ref,
            chunks = chunks.len(),
            vectors = resolution.vector_ids.len(),
            "Enrichment finished"
        );

        Ok(())
    }

    // =========================================================================
    // Stage 3: segmentation with single-segment fallback.
    // =========================================================================

    async fn segment(&self, text: &str, source_id: &str) -> Vec<Segment> {
        match self.nlp.segment(text, source_id).await {
            Ok(segments) if !segments.is_empty() => segments,
            Ok(_) => vec![Segment::body(text)],
            Err(e) => {
                tracing::warn!(error = %e, "Segmentation failed, using full text as body");
                vec![Segment::body(text)]
            }
        }
    }

    // =========================================================================
    // Stage 4: entity extraction, empty on failure.
    // =========================================================================

    async fn extract_entities(&self, text: &str) -> Vec<NerEntity> {
        match self.nlp.ner(text).await {
            Ok(entities) => entities,
            Err(e) => {
                tracing::warn!(error = %e, "Entity extraction failed");
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Stage 5: AI classification.
    // =========================================================================

    async fn classify(&self, text: &str, cross_border: bool) -> ModelJson {
        let prompt = self.ai_config.classification_prompt_for(cross_border);
        if prompt.is_empty() {
            tracing::warn!("Classification prompt is empty");
            return ModelJson::Empty;
        }

        let truncated = text_processing::truncate_chars(text, self.config.classification_max_chars);
        let user_message = format!("TEXTO DE LA RESOLUCIÓN:\n\n{}", truncated);

        match self
            .chat
            .chat(
                prompt,
                &user_message,
                self.ai_config.temperature,
                self.ai_config.max_tokens,
            )
            .await
        {
            Ok(reply) => parse_model_json(&reply, "classification"),
            Err(e) => {
                tracing::error!(error = %e, "AI classification failed");
                ModelJson::Empty
            }
        }
    }

    /// Apply classification results; only keys present in the parsed reply
    /// touch the resolution.
    fn apply_classification(resolution: &mut Resolution, classification: &ModelJson) {
        let topics = classification.list_field("topics");
        if !topics.is_empty() {
            resolution.topics = topics;
        }

        if let Some(jurisdiction) = classification.str_field("jurisdiction") {
            resolution.jurisdiction = jurisdiction;
        }

        if let Some(resolution_type) = classification.str_field("resolution_type") {
            resolution.resolution_type = resolution_type;
        }

        if let Some(importance) = classification.int_field("importance_level") {
            resolution.importance_level = importance.clamp(1, 3) as u8;
        }

        if let Some(procedure_type) = classification.str_field("procedure_type") {
            resolution.procedure_type = procedure_type;
        }
    }

    // =========================================================================
    // Stage 6: AI summarization.
    // =========================================================================

    async fn summarize(&self, text: &str, cross_border: bool) -> ModelJson {
        let prompt = self.ai_config.summary_prompt_for(cross_border);
        if prompt.is_empty() {
            tracing::warn!("Summary prompt is empty");
            return ModelJson::Empty;
        }

        let truncated = text_processing::truncate_chars(text, self.config.summary_max_chars);
        let user_message = format!("TEXTO DE LA RESOLUCIÓN:\n\n{}", truncated);

        match self
            .chat
            .chat(
                prompt,
                &user_message,
                self.ai_config.temperature,
                self.ai_config.max_tokens,
            )
            .await
        {
            Ok(reply) => parse_model_json(&reply, "summary"),
            Err(e) => {
                tracing::error!(error = %e, "AI summarization failed");
                ModelJson::Empty
            }
        }
    }

    fn apply_summary(resolution: &mut Resolution, summary: &ModelJson, cross_border: bool) {
        if let Some(abstract_ai) = summary.str_field("abstract") {
            resolution.abstract_ai = abstract_ai;
        }

        if let Some(key_holdings) = summary.str_field("key_holdings") {
            resolution.key_holdings = key_holdings;
        }

        if cross_border {
            if let Some(impact) = summary.str_field("impact_analysis") {
                resolution.impact_analysis = impact;
            }
        }
    }

    // =========================================================================
    // Stage 7: per-chunk embedding with payload metadata.
    // =========================================================================

    async fn embed_chunks(&self, chunks: &[Chunk], resolution: &Resolution) -> Vec<EmbeddedChunk> {
        if chunks.is_empty() {
            return Vec::new();
        }

        let base_payload = serde_json::json!({
            "resolution_id": resolution.id.to_string(),
            "source_id": resolution.source_id,
            "external_ref": resolution.external_ref,
            "date_issued": resolution
                .date_issued
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            "jurisdiction": resolution.jurisdiction,
            "issuing_body": resolution.issuing_body,
            "resolution_type": resolution.resolution_type,
            "status_legal": resolution.status_legal.as_str(),
            "importance_level": resolution.importance_level,
        });

        let mut embedded = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            match self.embeddings.embed(&chunk.text).await {
                Ok(vector) => {
                    let mut payload = base_payload.clone();
                    payload["section"] = serde_json::Value::from(chunk.section.clone());
                    payload["chunk_index"] = serde_json::Value::from(chunk.chunk_index);
                    payload["text_preview"] = serde_json::Value::from(
                        text_processing::truncate_chars(&chunk.text, 200).to_string(),
                    );
                    embedded.push(EmbeddedChunk { vector, payload });
                }
                Err(e) => {
                    tracing::warn!(chunk = chunk.chunk_index, error = %e, "Embedding failed for chunk");
                }
            }
        }

        embedded
    }

    // =========================================================================
    // Stage 8: batched indexing; a failing batch drops only its own ids.
    // =========================================================================

    async fn index_embeddings(&self, collection: &str, embedded: Vec<EmbeddedChunk>) -> Vec<String> {
        if embedded.is_empty() {
            return Vec::new();
        }

        let points: Vec<VectorPoint> = embedded
            .into_iter()
            .map(|chunk| VectorPoint {
                id: Uuid::new_v4().to_string(),
                vector: chunk.vector,
                payload: chunk.payload,
            })
            .collect();

        let mut indexed_ids = Vec::with_capacity(points.len());

        for (batch_index, batch) in points.chunks(self.config.index_batch_size).enumerate() {
            let batch_ids: Vec<String> = batch.iter().map(|p| p.id.clone()).collect();

            match self.vectors.upsert(collection, batch.to_vec()).await {
                Ok(()) => indexed_ids.extend(batch_ids),
                Err(e) => {
                    tracing::error!(
                        batch = batch_index,
                        collection,
                        error = %e,
                        "Vector batch upsert failed"
                    );
                }
            }
        }

        indexed_ids
    }

    // =========================================================================
    // Stage 9: citation graph construction.
    // =========================================================================

    /// Resolve `legislation_ref` entities into citation edges.
    ///
    /// Unresolved references and self-citations are skipped; upserts are
    /// idempotent over the `(source, target, relation)` composite key.
    fn build_citation_graph(
        &self,
        source_id: ResolutionId,
        source_external_ref: &str,
        ner_entities: &[NerEntity],
    ) {
        if ner_entities.is_empty() {
            return;
        }

        let mut created = 0;

        for entity in ner_entities {
            if entity.entity_type != "legislation_ref" || entity.reference.is_empty() {
                continue;
            }

            let target = match self.store.find_by_external_ref(&entity.reference) {
                Ok(Some(target)) => target,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(reference = %entity.reference, error = %e, "Citation target lookup failed");
                    continue;
                }
            };

            if target.id == source_id || target.external_ref == source_external_ref {
                continue;
            }

            let edge = CitationEdge {
                source_id,
                target_id: target.id,
                relation: Self::relation_for_subtype(&entity.subtype),
                context: text_processing::truncate_chars(&entity.context, 500).to_string(),
                created_at: Utc::now(),
            };

            match self.store.upsert_citation_edge(&edge) {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        source = %source_id,
                        target = %target.id,
                        error = %e,
                        "Citation edge upsert failed"
                    );
                }
            }
        }

        if created > 0 {
            tracing::info!(resolution = %source_id, edges = created, "Citation edges created");
        }
    }

    /// Map the entity extractor's reference subtype to a graph relation
    fn relation_for_subtype(subtype: &str) -> RelationType {
        match subtype {
            "ley" | "rd" | "articulo" | "directiva_ue" | "reglamento_ue" => RelationType::Applies,
            "sentencia" => RelationType::Cites,
            "consulta_dgt" => RelationType::Follows,
            _ => RelationType::Cites,
        }
    }

    /// Deduplicated cited-legislation summary for the resolution record
    fn extract_cited_legislation(ner_entities: &[NerEntity]) -> Vec<CitedReference> {
        let mut seen = HashSet::new();
        let mut cited = Vec::new();

        for entity in ner_entities {
            if entity.reference.is_empty() || !seen.insert(entity.reference.clone()) {
                continue;
            }

            let ref_type = if !entity.subtype.is_empty() {
                entity.subtype.clone()
            } else if !entity.entity_type.is_empty() {
                entity.entity_type.clone()
            } else {
                "unknown".to_string()
            };

            cited.push(CitedReference {
                reference: entity.reference.clone(),
                ref_type,
            });
        }

        cited
    }
}
