//! # Ingestion Module
//!
//! ## Purpose
//! Coordinates scheduled crawling of all configured juridical sources:
//! evaluates per-source due times, invokes the source's crawler over a date
//! window, deduplicates raw records on two levels and creates raw
//! resolutions queued for enrichment.
//!
//! ## Input/Output Specification
//! - **Input**: Active source records, crawler registry, current time
//! - **Output**: Newly created resolutions (count) and enqueued enrichment
//!   tasks; per-source bookkeeping updates
//! - **Deduplication**: Level 1 by `external_ref` (business key), level 2 by
//!   `content_hash` (SHA-256 of the full text, only when text is present)
//!
//! ## Key Features
//! - Frequency-based scheduling (daily/weekly/monthly)
//! - Per-source failure isolation with error bookkeeping
//! - Unconditional sync-time updates, including zero-result runs
//! - Idempotent re-runs: dedup keys are the concurrency-safety mechanism

pub mod sources;

use crate::config::VectorConfig;
use crate::errors::Result;
use crate::queue::EnrichmentQueue;
use crate::storage::DocumentStore;
use crate::{LegalStatus, Resolution, ResolutionId, SourceRecord};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sources::{CrawlWindow, CrawlerRegistry, RawRecord};
use std::sync::Arc;
use uuid::Uuid;

pub use sources::{BoeCrawler, Crawler, CuriaCrawler};

/// Coordinates scheduled ingestion across all configured sources
pub struct IngestionCoordinator {
    store: Arc<DocumentStore>,
    queue: Arc<EnrichmentQueue>,
    registry: Arc<CrawlerRegistry>,
    vector_config: VectorConfig,
}

impl IngestionCoordinator {
    pub fn new(
        store: Arc<DocumentStore>,
        queue: Arc<EnrichmentQueue>,
        registry: Arc<CrawlerRegistry>,
        vector_config: VectorConfig,
    ) -> Self {
        Self {
            store,
            queue,
            registry,
            vector_config,
        }
    }

    /// Run ingestion for every active source that is due at `now`.
    ///
    /// Sources are visited in ascending priority order. Failures are caught
    /// per source and recorded on its bookkeeping record without aborting
    /// the overall run. Returns the total number of newly created
    /// resolutions.
    pub async fn run_scheduled_ingestion(&self, now: DateTime<Utc>) -> u64 {
        let sources = match self.store.active_sources() {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!(error = %e, "Could not load active sources");
                return 0;
            }
        };

        if sources.is_empty() {
            tracing::info!("No active sources configured");
            return 0;
        }

        let mut total_ingested = 0;

        for mut source in sources {
            if !Self::is_due(&source, now) {
                tracing::debug!(source = %source.machine_name, "Source not due yet");
                continue;
            }

            tracing::info!(source = %source.machine_name, "Starting ingestion");

            match self.ingest_from_source(&mut source, now).await {
                Ok(count) => {
                    total_ingested += count;
                    tracing::info!(
                        source = %source.machine_name,
                        new = count,
                        "Source ingestion finished"
                    );
                }
                Err(e) => {
                    source.error_count += 1;
                    source.last_error = Some(e.to_string());
                    tracing::error!(source = %source.machine_name, error = %e, "Source ingestion failed");
                }
            }

            // Sync time and totals update after every attempt, including
            // failed and zero-result runs.
            source.last_sync_at = Some(now);
            if let Err(e) = self.store.put_source(&source) {
                tracing::error!(source = %source.machine_name, error = %e, "Could not persist source bookkeeping");
            }
        }

        tracing::info!(total = total_ingested, "Scheduled ingestion finished");
        total_ingested
    }

    /// Run the full ingestion cycle for one source.
    ///
    /// Invokes the crawler over the window `[now - interval, now]`, applies
    /// both deduplication levels, creates raw resolutions and enqueues them
    /// for enrichment. Updates `total_documents` on the passed record;
    /// persisting it is the caller's responsibility.
    pub async fn ingest_from_source(
        &self,
        source: &mut SourceRecord,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let Some(crawler) = self.registry.get(&source.machine_name) else {
            tracing::warn!(source = %source.machine_name, "No crawler registered for source");
            return Ok(0);
        };

        let interval = Duration::seconds(source.frequency.interval_secs());
        let window = CrawlWindow {
            date_from: (now - interval).date_naive(),
            date_to: now.date_naive(),
        };

        let raw_records = crawler.crawl(&window).await?;

        if raw_records.is_empty() {
            tracing::info!(source = %source.machine_name, "Crawler returned no records");
            return Ok(0);
        }

        let mut new_count = 0;

        for raw in raw_records {
            match self.ingest_record(source, raw) {
                Ok(Some(id)) => {
                    if let Err(e) = self.queue.push(id) {
                        tracing::error!(resolution_id = %id, error = %e, "Could not enqueue enrichment task");
                    }
                    new_count += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(source = %source.machine_name, error = %e, "Could not persist raw resolution");
                }
            }
        }

        source.total_documents += new_count;
        Ok(new_count)
    }

    /// Deduplicate one raw record and create its resolution.
    ///
    /// Returns `Ok(None)` when the record is rejected by either dedup level
    /// or carries no business key.
    fn ingest_record(&self, source: &SourceRecord, raw: RawRecord) -> Result<Option<ResolutionId>> {
        // Level 1: business key must be present and unseen.
        if raw.external_ref.is_empty() {
            tracing::debug!(source = %source.machine_name, "Record without external_ref skipped");
            return Ok(None);
        }

        if self.store.find_by_external_ref(&raw.external_ref)?.is_some() {
            tracing::debug!(external_ref = %raw.external_ref, "Record already exists (external_ref)");
            return Ok(None);
        }

        // Level 2: content hash, only meaningful when full text is present.
        let content_hash = Self::content_hash(&raw.full_text);
        if !raw.full_text.is_empty() && self.store.find_by_content_hash(&content_hash)?.is_some() {
            tracing::debug!(external_ref = %raw.external_ref, "Record duplicates existing content (content_hash)");
            return Ok(None);
        }

        let resolution = self.raw_to_resolution(source, raw, content_hash);
        let id = resolution.id;

        match self.store.create_resolution(&resolution) {
            Ok(()) => Ok(Some(id)),
            // Concurrent runs may have raced us to the same record.
            Err(e) if e.is_dedup_conflict() => {
                tracing::debug!(external_ref = %resolution.external_ref, "Record lost dedup race, skipped");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn raw_to_resolution(
        &self,
        source: &SourceRecord,
        raw: RawRecord,
        content_hash: String,
    ) -> Resolution {
        let source_id = if raw.source_id.is_empty() {
            source.machine_name.clone()
        } else {
            raw.source_id
        };
        let vector_collection = self
            .vector_config
            .collection_for_source(&source_id)
            .to_string();

        Resolution {
            id: Uuid::new_v4(),
            source_id,
            external_ref: raw.external_ref,
            content_hash,
            title: raw.title,
            resolution_type: raw.resolution_type,
            issuing_body: raw.issuing_body,
            jurisdiction: raw.jurisdiction,
            date_issued: raw.date_issued,
            date_published: raw.date_published,
            original_url: raw.original_url,
            full_text: raw.full_text,
            status_legal: raw.status_legal.unwrap_or(LegalStatus::Vigente),
            language_original: raw.language_original.unwrap_or_else(|| "es".to_string()),
            topics: Vec::new(),
            importance_level: raw.importance_level.unwrap_or(3),
            procedure_type: raw.procedure_type,
            abstract_ai: String::new(),
            key_holdings: String::new(),
            impact_analysis: String::new(),
            cited_legislation: Vec::new(),
            ecli: raw.ecli,
            celex_number: raw.celex_number,
            case_number: raw.case_number,
            vector_ids: Vec::new(),
            vector_collection,
            ingested_at: Utc::now(),
            last_enriched_at: None,
        }
    }

    /// Whether a source needs synchronization at `now`.
    ///
    /// Never-synced sources are always due; otherwise the configured
    /// frequency interval must have elapsed since the last sync.
    pub fn is_due(source: &SourceRecord, now: DateTime<Utc>) -> bool {
        match source.last_sync_at {
            None => true,
            Some(last) => (now - last).num_seconds() >= source.frequency.interval_secs(),
        }
    }

    /// SHA-256 hex digest of a document's full text
    pub fn content_hash(full_text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(full_text.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::tests::temp_store;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct ScriptedCrawler {
        source_id: String,
        records: Mutex<Vec<Vec<RawRecord>>>,
        fail: bool,
    }

    impl ScriptedCrawler {
        fn new(source_id: &str, batches: Vec<Vec<RawRecord>>) -> Self {
            Self {
                source_id: source_id.to_string(),
                records: Mutex::new(batches),
                fail: false,
            }
        }

        fn failing(source_id: &str) -> Self {
            Self {
                source_id: source_id.to_string(),
                records: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Crawler for ScriptedCrawler {
        fn source_id(&self) -> &str {
            &self.source_id
        }

        async fn crawl(&self, _window: &CrawlWindow) -> Result<Vec<RawRecord>> {
            if self.fail {
                return Err(crate::IntelError::Network {
                    details: "connection refused".to_string(),
                });
            }
            let mut batches = self.records.lock();
            if batches.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(batches.remove(0))
            }
        }
    }

    fn raw(external_ref: &str, full_text: &str) -> RawRecord {
        RawRecord {
            source_id: "cendoj".to_string(),
            external_ref: external_ref.to_string(),
            title: format!("Sentencia {}", external_ref),
            resolution_type: "sentencia".to_string(),
            full_text: full_text.to_string(),
            ..Default::default()
        }
    }

    fn coordinator_with(
        crawler: ScriptedCrawler,
    ) -> (
        IngestionCoordinator,
        Arc<DocumentStore>,
        Arc<EnrichmentQueue>,
        tempfile::TempDir,
    ) {
        let (store, dir) = temp_store();
        let store = Arc::new(store);
        let queue = Arc::new(EnrichmentQueue::new(store.database()).unwrap());
        let mut registry = CrawlerRegistry::new();
        registry.register(Arc::new(crawler));

        let coordinator = IngestionCoordinator::new(
            store.clone(),
            queue.clone(),
            Arc::new(registry),
            Config::default().vector,
        );
        (coordinator, store, queue, dir)
    }

    #[tokio::test]
    async fn test_duplicate_external_ref_is_dropped() {
        // Two raw documents share "STS 123/2024": only the first survives.
        let crawler = ScriptedCrawler::new(
            "cendoj",
            vec![vec![
                raw("STS 123/2024", "texto de la primera"),
                raw("STS 123/2024", "texto distinto de la segunda"),
            ]],
        );
        let (coordinator, store, queue, _dir) = coordinator_with(crawler);

        let mut source = SourceRecord::new("cendoj", 1, crate::SyncFrequency::Daily);
        let count = coordinator
            .ingest_from_source(&mut source, Utc::now())
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(store.resolution_count(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(source.total_documents, 1);
    }

    #[tokio::test]
    async fn test_duplicate_content_hash_is_dropped() {
        let crawler = ScriptedCrawler::new(
            "cendoj",
            vec![vec![
                raw("STS 1/2024", "el mismo texto completo"),
                raw("STS 2/2024", "el mismo texto completo"),
            ]],
        );
        let (coordinator, store, _queue, _dir) = coordinator_with(crawler);

        let mut source = SourceRecord::new("cendoj", 1, crate::SyncFrequency::Daily);
        let count = coordinator
            .ingest_from_source(&mut source, Utc::now())
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(store.find_by_external_ref("STS 1/2024").unwrap().is_some());
        assert!(store.find_by_external_ref("STS 2/2024").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_records_without_external_ref_are_skipped() {
        let crawler = ScriptedCrawler::new("cendoj", vec![vec![raw("", "algo de texto")]]);
        let (coordinator, store, _queue, _dir) = coordinator_with(crawler);

        let mut source = SourceRecord::new("cendoj", 1, crate::SyncFrequency::Daily);
        let count = coordinator
            .ingest_from_source(&mut source, Utc::now())
            .await
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(store.resolution_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_result_run_still_updates_sync_time() {
        let crawler = ScriptedCrawler::new("cendoj", vec![Vec::new()]);
        let (coordinator, store, _queue, _dir) = coordinator_with(crawler);

        let source = SourceRecord::new("cendoj", 1, crate::SyncFrequency::Daily);
        store.put_source(&source).unwrap();

        let now = Utc::now();
        let total = coordinator.run_scheduled_ingestion(now).await;

        assert_eq!(total, 0);
        let updated = store.get_source("cendoj").unwrap().unwrap();
        assert_eq!(updated.last_sync_at, Some(now));
        assert_eq!(updated.error_count, 0);
    }

    #[tokio::test]
    async fn test_crawler_failure_is_recorded_on_source() {
        let crawler = ScriptedCrawler::failing("cendoj");
        let (coordinator, store, _queue, _dir) = coordinator_with(crawler);

        let source = SourceRecord::new("cendoj", 1, crate::SyncFrequency::Daily);
        store.put_source(&source).unwrap();

        let now = Utc::now();
        let total = coordinator.run_scheduled_ingestion(now).await;

        assert_eq!(total, 0);
        let updated = store.get_source("cendoj").unwrap().unwrap();
        assert_eq!(updated.error_count, 1);
        assert!(updated.last_error.is_some());
        assert_eq!(updated.last_sync_at, Some(now));
    }

    #[tokio::test]
    async fn test_sources_not_due_are_skipped() {
        let crawler = ScriptedCrawler::new("cendoj", vec![vec![raw("STS 9/2024", "texto")]]);
        let (coordinator, store, _queue, _dir) = coordinator_with(crawler);

        let now = Utc::now();
        let mut source = SourceRecord::new("cendoj", 1, crate::SyncFrequency::Daily);
        source.last_sync_at = Some(now - Duration::hours(1));
        store.put_source(&source).unwrap();

        let total = coordinator.run_scheduled_ingestion(now).await;
        assert_eq!(total, 0);
        assert_eq!(store.resolution_count(), 0);
    }

    #[test]
    fn test_is_due_frequencies() {
        let now = Utc::now();

        let never_synced = SourceRecord::new("boe", 1, crate::SyncFrequency::Daily);
        assert!(IngestionCoordinator::is_due(&never_synced, now));

        let mut daily = SourceRecord::new("boe", 1, crate::SyncFrequency::Daily);
        daily.last_sync_at = Some(now - Duration::hours(23));
        assert!(!IngestionCoordinator::is_due(&daily, now));
        daily.last_sync_at = Some(now - Duration::hours(25));
        assert!(IngestionCoordinator::is_due(&daily, now));

        let mut weekly = SourceRecord::new("tjue", 1, crate::SyncFrequency::Weekly);
        weekly.last_sync_at = Some(now - Duration::days(6));
        assert!(!IngestionCoordinator::is_due(&weekly, now));
        weekly.last_sync_at = Some(now - Duration::days(8));
        assert!(IngestionCoordinator::is_due(&weekly, now));
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        let hash = IngestionCoordinator::content_hash("texto");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, IngestionCoordinator::content_hash("texto"));
        assert_ne!(hash, IngestionCoordinator::content_hash("otro texto"));
    }
}
