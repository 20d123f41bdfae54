//! # Storage Management Module
//!
//! ## Purpose
//! Persistent storage of resolutions, ingestion sources, subscriber alerts
//! and the citation graph using an embedded database, with secondary indexes
//! for the two deduplication keys.
//!
//! ## Input/Output Specification
//! - **Input**: Resolution records, source bookkeeping, alerts, citation edges
//! - **Output**: Keyed retrieval, dedup lookups, idempotent edge upserts
//! - **Storage**: Sled embedded database, one tree per record family
//!
//! ## Key Features
//! - Secondary indexes on `external_ref` and `content_hash`
//! - Composite-key idempotent upsert for citation edges
//! - Optional compression for stored records
//! - Concurrent non-overlapping writes keyed by document id

use crate::alerts::Alert;
use crate::config::StorageConfig;
use crate::errors::{IntelError, Result};
use crate::{CitationEdge, RelationType, Resolution, ResolutionId, SourceRecord};
use uuid::Uuid;

/// Main document store
pub struct DocumentStore {
    config: StorageConfig,
    db: sled::Db,
    resolutions: sled::Tree,
    idx_external_ref: sled::Tree,
    idx_content_hash: sled::Tree,
    sources: sled::Tree,
    alerts: sled::Tree,
    citation_edges: sled::Tree,
}

impl DocumentStore {
    /// Open (or create) the store at the configured path
    pub fn new(config: &StorageConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = sled::open(&config.db_path)?;

        let resolutions = db.open_tree("resolutions")?;
        let idx_external_ref = db.open_tree("idx_external_ref")?;
        let idx_content_hash = db.open_tree("idx_content_hash")?;
        let sources = db.open_tree("sources")?;
        let alerts = db.open_tree("alerts")?;
        let citation_edges = db.open_tree("citation_edges")?;

        let store = Self {
            config: config.clone(),
            db,
            resolutions,
            idx_external_ref,
            idx_content_hash,
            sources,
            alerts,
            citation_edges,
        };

        tracing::info!(
            "Document store opened with {} resolutions",
            store.resolution_count()
        );

        Ok(store)
    }

    // =========================================================================
    // Resolutions
    // =========================================================================

    /// Persist a brand-new resolution and its dedup indexes.
    ///
    /// Uniqueness of `external_ref` (and `content_hash` when full text is
    /// known) must hold before creation; violations are reported as dedup
    /// conflicts, which callers treat as skips rather than failures.
    pub fn create_resolution(&self, resolution: &Resolution) -> Result<()> {
        if self
            .idx_external_ref
            .contains_key(resolution.external_ref.as_bytes())?
        {
            return Err(IntelError::DuplicateReference {
                external_ref: resolution.external_ref.clone(),
            });
        }

        if !resolution.full_text.is_empty()
            && self
                .idx_content_hash
                .contains_key(resolution.content_hash.as_bytes())?
        {
            return Err(IntelError::DuplicateContent {
                external_ref: resolution.external_ref.clone(),
            });
        }

        self.write_resolution(resolution)?;

        self.idx_external_ref.insert(
            resolution.external_ref.as_bytes(),
            resolution.id.as_bytes().to_vec(),
        )?;
        if !resolution.full_text.is_empty() {
            self.idx_content_hash.insert(
                resolution.content_hash.as_bytes(),
                resolution.id.as_bytes().to_vec(),
            )?;
        }

        tracing::debug!(external_ref = %resolution.external_ref, "Created resolution");
        Ok(())
    }

    /// Persist the current state of an existing resolution
    pub fn save_resolution(&self, resolution: &Resolution) -> Result<()> {
        self.write_resolution(resolution)?;
        // The content hash can become known after extraction; keep the
        // dedup index in sync.
        if !resolution.full_text.is_empty() {
            self.idx_content_hash.insert(
                resolution.content_hash.as_bytes(),
                resolution.id.as_bytes().to_vec(),
            )?;
        }
        Ok(())
    }

    fn write_resolution(&self, resolution: &Resolution) -> Result<()> {
        let encoded = self.encode(resolution)?;
        self.resolutions
            .insert(resolution.id.as_bytes(), encoded)?;
        Ok(())
    }

    /// Load a resolution by id
    pub fn get_resolution(&self, id: &ResolutionId) -> Result<Option<Resolution>> {
        match self.resolutions.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(self.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load many resolutions, silently skipping missing ids
    pub fn load_resolutions(&self, ids: &[ResolutionId]) -> Result<Vec<Resolution>> {
        let mut loaded = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(resolution) = self.get_resolution(id)? {
                loaded.push(resolution);
            }
        }
        Ok(loaded)
    }

    /// Exact lookup by business key
    pub fn find_by_external_ref(&self, external_ref: &str) -> Result<Option<Resolution>> {
        match self.idx_external_ref.get(external_ref.as_bytes())? {
            Some(id_bytes) => self.get_resolution(&Self::id_from_bytes(&id_bytes)?),
            None => Ok(None),
        }
    }

    /// Case-insensitive substring lookup over external refs, bounded by `limit`
    pub fn find_external_ref_contains(&self, needle: &str, limit: usize) -> Result<Vec<Resolution>> {
        let needle = needle.to_lowercase();
        let mut matches = Vec::new();

        for entry in self.idx_external_ref.iter() {
            let (key, id_bytes) = entry?;
            let external_ref = String::from_utf8_lossy(&key);
            if external_ref.to_lowercase().contains(&needle) {
                if let Some(resolution) = self.get_resolution(&Self::id_from_bytes(&id_bytes)?)? {
                    matches.push(resolution);
                }
                if matches.len() >= limit {
                    break;
                }
            }
        }

        Ok(matches)
    }

    /// Dedup lookup by content hash
    pub fn find_by_content_hash(&self, content_hash: &str) -> Result<Option<Resolution>> {
        match self.idx_content_hash.get(content_hash.as_bytes())? {
            Some(id_bytes) => self.get_resolution(&Self::id_from_bytes(&id_bytes)?),
            None => Ok(None),
        }
    }

    /// Number of stored resolutions
    pub fn resolution_count(&self) -> usize {
        self.resolutions.len()
    }

    // =========================================================================
    // Ingestion sources
    // =========================================================================

    /// Persist source bookkeeping
    pub fn put_source(&self, source: &SourceRecord) -> Result<()> {
        let encoded = bincode::serialize(source)?;
        self.sources
            .insert(source.machine_name.as_bytes(), encoded)?;
        Ok(())
    }

    /// Load a source by machine name
    pub fn get_source(&self, machine_name: &str) -> Result<Option<SourceRecord>> {
        match self.sources.get(machine_name.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Active sources ordered by ascending priority
    pub fn active_sources(&self) -> Result<Vec<SourceRecord>> {
        let mut sources = Vec::new();
        for entry in self.sources.iter() {
            let (_, bytes) = entry?;
            let source: SourceRecord = bincode::deserialize(&bytes)?;
            if source.is_active {
                sources.push(source);
            }
        }
        sources.sort_by_key(|s| s.priority);
        Ok(sources)
    }

    // =========================================================================
    // Alerts
    // =========================================================================

    /// Persist an alert (create or update)
    pub fn put_alert(&self, alert: &Alert) -> Result<()> {
        let encoded = bincode::serialize(alert)?;
        self.alerts.insert(alert.id.as_bytes(), encoded)?;
        Ok(())
    }

    /// Load an alert by id
    pub fn get_alert(&self, id: &Uuid) -> Result<Option<Alert>> {
        match self.alerts.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove an alert
    pub fn delete_alert(&self, id: &Uuid) -> Result<()> {
        self.alerts.remove(id.as_bytes())?;
        Ok(())
    }

    /// All currently active alerts, across owners
    pub fn active_alerts(&self) -> Result<Vec<Alert>> {
        let mut active = Vec::new();
        for entry in self.alerts.iter() {
            let (_, bytes) = entry?;
            let alert: Alert = bincode::deserialize(&bytes)?;
            if alert.is_active {
                active.push(alert);
            }
        }
        Ok(active)
    }

    /// Alerts belonging to an owner, newest first
    pub fn alerts_by_owner(&self, owner_id: u64) -> Result<Vec<Alert>> {
        let mut owned = Vec::new();
        for entry in self.alerts.iter() {
            let (_, bytes) = entry?;
            let alert: Alert = bincode::deserialize(&bytes)?;
            if alert.owner_id == owner_id {
                owned.push(alert);
            }
        }
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    /// Number of alerts an owner currently holds
    pub fn count_alerts_for_owner(&self, owner_id: u64) -> Result<u64> {
        Ok(self.alerts_by_owner(owner_id)?.len() as u64)
    }

    // =========================================================================
    // Citation graph
    // =========================================================================

    fn edge_key(source: &ResolutionId, target: &ResolutionId, relation: RelationType) -> Vec<u8> {
        format!("{}|{}|{}", source, target, relation.as_str()).into_bytes()
    }

    /// Idempotent upsert keyed by `(source, target, relation)`.
    ///
    /// Returns `true` when the edge was newly created. An existing edge keeps
    /// its `created_at` and only refreshes the citation context.
    pub fn upsert_citation_edge(&self, edge: &CitationEdge) -> Result<bool> {
        let key = Self::edge_key(&edge.source_id, &edge.target_id, edge.relation);

        let stored = match self.citation_edges.get(&key)? {
            Some(existing) => {
                let mut existing: CitationEdge = bincode::deserialize(&existing)?;
                existing.context = edge.context.clone();
                self.citation_edges
                    .insert(&key, bincode::serialize(&existing)?)?;
                false
            }
            None => {
                self.citation_edges.insert(&key, bincode::serialize(edge)?)?;
                true
            }
        };

        Ok(stored)
    }

    /// Edges citing out of a resolution
    pub fn edges_from(&self, source_id: &ResolutionId) -> Result<Vec<CitationEdge>> {
        let prefix = format!("{}|", source_id);
        let mut edges = Vec::new();
        for entry in self.citation_edges.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = entry?;
            edges.push(bincode::deserialize(&bytes)?);
        }
        Ok(edges)
    }

    /// Edges pointing at a resolution
    pub fn edges_to(&self, target_id: &ResolutionId) -> Result<Vec<CitationEdge>> {
        let target = target_id.to_string();
        let mut edges = Vec::new();
        for entry in self.citation_edges.iter() {
            let (_, bytes) = entry?;
            let edge: CitationEdge = bincode::deserialize(&bytes)?;
            if edge.target_id.to_string() == target {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    /// Total number of citation edges
    pub fn edge_count(&self) -> usize {
        self.citation_edges.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn id_from_bytes(bytes: &[u8]) -> Result<ResolutionId> {
        Uuid::from_slice(bytes).map_err(|e| IntelError::Internal {
            message: format!("Invalid resolution id in index: {}", e),
        })
    }

    fn encode(&self, resolution: &Resolution) -> Result<Vec<u8>> {
        let raw = bincode::serialize(resolution)?;
        if self.config.enable_compression {
            use std::io::Write;
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&raw)?;
            Ok(encoder.finish()?)
        } else {
            Ok(raw)
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Resolution> {
        if self.config.enable_compression {
            use std::io::Read;
            let mut decoder = flate2::read::GzDecoder::new(bytes);
            let mut raw = Vec::new();
            decoder.read_to_end(&mut raw)?;
            Ok(bincode::deserialize(&raw)?)
        } else {
            Ok(bincode::deserialize(bytes)?)
        }
    }

    /// Health check: a full write/read/delete cycle on the database
    pub fn health_check(&self) -> Result<()> {
        let key = b"health_check";
        self.sources.insert(key, b"ok".to_vec())?;
        let read = self.sources.get(key)?;
        self.sources.remove(key)?;

        if read.is_none() {
            return Err(IntelError::Internal {
                message: "Health check value not found after write".to_string(),
            });
        }
        Ok(())
    }

    /// Flush all trees to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    /// Underlying database handle, shared with the enrichment queue
    pub fn database(&self) -> &sled::Db {
        &self.db
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn temp_store() -> (DocumentStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(&StorageConfig {
            db_path: dir.path().join("test.db"),
            enable_compression: true,
        })
        .unwrap();
        (store, dir)
    }

    pub(crate) fn sample_resolution(external_ref: &str, source_id: &str) -> Resolution {
        Resolution {
            id: Uuid::new_v4(),
            source_id: source_id.to_string(),
            external_ref: external_ref.to_string(),
            content_hash: format!("hash-of-{}", external_ref),
            title: format!("Resolución {}", external_ref),
            resolution_type: "sentencia".to_string(),
            issuing_body: "Tribunal Supremo".to_string(),
            jurisdiction: "fiscal".to_string(),
            date_issued: Some(chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
            date_published: None,
            original_url: String::new(),
            full_text: "texto completo de la resolución".to_string(),
            status_legal: Default::default(),
            language_original: "es".to_string(),
            topics: Vec::new(),
            importance_level: 3,
            procedure_type: String::new(),
            abstract_ai: String::new(),
            key_holdings: String::new(),
            impact_analysis: String::new(),
            cited_legislation: Vec::new(),
            ecli: String::new(),
            celex_number: String::new(),
            case_number: String::new(),
            vector_ids: Vec::new(),
            vector_collection: "legal_intelligence".to_string(),
            ingested_at: Utc::now(),
            last_enriched_at: None,
        }
    }

    #[test]
    fn test_resolution_round_trip_preserves_identity_fields() {
        let (store, _dir) = temp_store();
        let resolution = sample_resolution("STS 1234/2024", "cendoj");

        store.create_resolution(&resolution).unwrap();
        let loaded = store.find_by_external_ref("STS 1234/2024").unwrap().unwrap();

        assert_eq!(loaded.id, resolution.id);
        assert_eq!(loaded.source_id, resolution.source_id);
        assert_eq!(loaded.external_ref, resolution.external_ref);
        assert_eq!(loaded.content_hash, resolution.content_hash);
    }

    #[test]
    fn test_duplicate_external_ref_is_rejected() {
        let (store, _dir) = temp_store();
        store
            .create_resolution(&sample_resolution("STS 1/2024", "cendoj"))
            .unwrap();

        let mut duplicate = sample_resolution("STS 1/2024", "cendoj");
        duplicate.content_hash = "other-hash".to_string();
        let err = store.create_resolution(&duplicate).unwrap_err();
        assert!(err.is_dedup_conflict());
        assert_eq!(store.resolution_count(), 1);
    }

    #[test]
    fn test_duplicate_content_hash_is_rejected() {
        let (store, _dir) = temp_store();
        let first = sample_resolution("STS 1/2024", "cendoj");
        store.create_resolution(&first).unwrap();

        let mut duplicate = sample_resolution("STS 2/2024", "cendoj");
        duplicate.content_hash = first.content_hash.clone();
        let err = store.create_resolution(&duplicate).unwrap_err();
        assert!(err.is_dedup_conflict());
    }

    #[test]
    fn test_fuzzy_external_ref_lookup() {
        let (store, _dir) = temp_store();
        store
            .create_resolution(&sample_resolution("STS 1234/2024", "cendoj"))
            .unwrap();

        let matches = store.find_external_ref_contains("sts 1234", 10).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_citation_edge_upsert_is_idempotent() {
        let (store, _dir) = temp_store();
        let edge = CitationEdge {
            source_id: Uuid::new_v4(),
            target_id: Uuid::new_v4(),
            relation: RelationType::Applies,
            context: "conforme a la Ley 35/2006".to_string(),
            created_at: Utc::now(),
        };

        assert!(store.upsert_citation_edge(&edge).unwrap());
        assert!(!store.upsert_citation_edge(&edge).unwrap());
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn test_active_sources_ordered_by_priority() {
        let (store, _dir) = temp_store();
        let mut boe = crate::SourceRecord::new("boe", 2, crate::SyncFrequency::Daily);
        let tjue = crate::SourceRecord::new("tjue", 1, crate::SyncFrequency::Weekly);
        let mut inactive = crate::SourceRecord::new("teac", 0, crate::SyncFrequency::Monthly);
        inactive.is_active = false;
        boe.total_documents = 12;

        store.put_source(&boe).unwrap();
        store.put_source(&tjue).unwrap();
        store.put_source(&inactive).unwrap();

        let active = store.active_sources().unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].machine_name, "tjue");
        assert_eq!(active[1].machine_name, "boe");
    }
}
