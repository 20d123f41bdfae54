//! # Legal Intelligence Hub
//!
//! ## Overview
//! This library implements a jurisdiction-aware legal intelligence engine that
//! ingests juridical documents from heterogeneous official sources, enriches
//! them through a nine-stage AI pipeline into structured, searchable knowledge,
//! and serves semantic queries with domain-specific ranking and subscription
//! based change alerts.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `ingestion`: Scheduled crawling with two-level deduplication
//! - `pipeline`: Nine-stage fault-tolerant enrichment (extraction, NLP,
//!   AI classification/summarization, embeddings, indexing, citation graph)
//! - `text_processing`: Normalization and sliding-window chunking
//! - `search`: Semantic search resolver with exact-reference short-circuit
//! - `ranking`: Merge & rank engine with primacy/freshness/importance boosts
//! - `alerts`: Alert matching engine with per-channel dispatch
//! - `clients`: HTTP clients for extraction, NLP, AI providers, vector store
//! - `storage`: Persistent document store and citation graph
//! - `queue`: At-least-once enrichment task queue
//! - `api`: REST API endpoints
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Raw juridical documents (gazette dispositions, court
//!   decisions), natural-language search queries, subscriber alert profiles
//! - **Output**: Enriched resolution records, ranked search results with
//!   facets, alert trigger notifications
//!
//! ## Usage
//! ```rust,no_run
//! use legal_intelligence_hub::{Config, storage::DocumentStore};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.toml")?;
//!     let store = DocumentStore::new(&config.storage)?;
//!     println!("{} resolutions stored", store.resolution_count());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod errors;
pub mod clients;
pub mod storage;
pub mod queue;
pub mod ingestion;
pub mod text_processing;
pub mod pipeline;
pub mod search;
pub mod ranking;
pub mod alerts;
pub mod api;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{IntelError, Result};
pub use search::{SearchFilters, SearchHit, SearchResolver, SearchResponse};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for resolutions
pub type ResolutionId = Uuid;

/// Source identifiers of cross-border authorities.
///
/// Documents from these sources are indexed into the cross-border vector
/// collection, use the cross-border prompt variants and qualify for the
/// primacy score boost.
pub const CROSS_BORDER_SOURCES: &[&str] =
    &["tjue", "eurlex", "tedh", "edpb", "eba", "esma", "ag_tjue"];

/// Legal validity status of a resolution.
///
/// Transitions away from `Vigente` drive the alert matching engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalStatus {
    Vigente,
    Derogada,
    Anulada,
    Superada,
    ParcialmenteDerogada,
}

impl LegalStatus {
    /// Stable string form matching the persisted vocabulary
    pub fn as_str(&self) -> &'static str {
        match self {
            LegalStatus::Vigente => "vigente",
            LegalStatus::Derogada => "derogada",
            LegalStatus::Anulada => "anulada",
            LegalStatus::Superada => "superada",
            LegalStatus::ParcialmenteDerogada => "parcialmente_derogada",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "vigente" => Some(LegalStatus::Vigente),
            "derogada" => Some(LegalStatus::Derogada),
            "anulada" => Some(LegalStatus::Anulada),
            "superada" => Some(LegalStatus::Superada),
            "parcialmente_derogada" => Some(LegalStatus::ParcialmenteDerogada),
            _ => None,
        }
    }
}

impl Default for LegalStatus {
    fn default() -> Self {
        LegalStatus::Vigente
    }
}

/// Search partition selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    National,
    CrossBorder,
    All,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::All
    }
}

/// A legislative or judicial reference detected in a resolution's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedReference {
    /// Reference as written (e.g. "Ley 35/2006", "STS 1234/2024")
    pub reference: String,
    /// Reference subtype reported by the entity extractor
    pub ref_type: String,
}

/// Relation carried by a citation-graph edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Applies,
    Cites,
    Follows,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Applies => "applies",
            RelationType::Cites => "cites",
            RelationType::Follows => "follows",
        }
    }
}

/// Directed edge of the citation graph.
///
/// Keyed by `(source_id, target_id, relation)`; upserts are idempotent and
/// edges are never deleted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationEdge {
    /// Citing resolution (origin of the arc)
    pub source_id: ResolutionId,
    /// Cited resolution
    pub target_id: ResolutionId,
    /// Relation detected from the reference subtype
    pub relation: RelationType,
    /// Text fragment surrounding the citation (truncated to 500 chars)
    pub context: String,
    /// First time this edge was recorded
    pub created_at: DateTime<Utc>,
}

/// Central document entity of the system.
///
/// Created by the ingestion coordinator in a minimal raw state, then mutated
/// in place by each enrichment stage. Partial enrichment from a failed stage
/// is preserved, never rolled back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    /// Internal identifier
    pub id: ResolutionId,
    /// Machine name of the originating source (boe, cendoj, tjue, ...)
    pub source_id: String,
    /// Business key, globally unique once ingested (docket number, case code)
    pub external_ref: String,
    /// SHA-256 of the full text, second deduplication key
    pub content_hash: String,
    /// Official title of the document
    pub title: String,
    /// Normalized document type (ley, sentencia, real_decreto, ...)
    pub resolution_type: String,
    /// Issuing court, ministry or body
    pub issuing_body: String,
    /// Jurisdiction assigned by classification (or by the crawler)
    pub jurisdiction: String,
    /// Date the resolution was issued
    pub date_issued: Option<NaiveDate>,
    /// Date the resolution was published
    pub date_published: Option<NaiveDate>,
    /// URL of the original document, used for text extraction
    pub original_url: String,
    /// Plain text of the document (raw at ingestion, normalized afterwards)
    pub full_text: String,
    /// Legal validity status
    pub status_legal: LegalStatus,
    /// ISO 639-1 language of the original text
    pub language_original: String,
    /// Topics assigned by AI classification
    pub topics: Vec<String>,
    /// Importance level: 1 (landmark) to 3 (routine)
    pub importance_level: u8,
    /// Procedure type, populated for cross-border decisions
    pub procedure_type: String,
    /// AI-generated abstract (3-5 lines)
    pub abstract_ai: String,
    /// AI-extracted key holdings (ratio decidendi)
    pub key_holdings: String,
    /// AI impact analysis, cross-border sources only
    pub impact_analysis: String,
    /// References to legislation detected by the entity extractor
    pub cited_legislation: Vec<CitedReference>,
    /// European Case Law Identifier, if any
    pub ecli: String,
    /// CELEX number, if any
    pub celex_number: String,
    /// Court case number, if any
    pub case_number: String,
    /// Ids of the vector points indexed for this resolution
    pub vector_ids: Vec<String>,
    /// Vector collection the points live in
    pub vector_collection: String,
    /// Ingestion timestamp
    pub ingested_at: DateTime<Utc>,
    /// Last successful pipeline run, if any
    pub last_enriched_at: Option<DateTime<Utc>>,
}

impl Resolution {
    /// Whether this resolution originates from a cross-border authority
    pub fn is_cross_border(&self) -> bool {
        CROSS_BORDER_SOURCES.contains(&self.source_id.as_str())
    }
}

/// Crawl frequency of a configured source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl SyncFrequency {
    /// Interval in seconds: daily = 86400, weekly = 604800, monthly = 2592000
    pub fn interval_secs(&self) -> i64 {
        match self {
            SyncFrequency::Daily => 86_400,
            SyncFrequency::Weekly => 604_800,
            SyncFrequency::Monthly => 2_592_000,
        }
    }
}

impl Default for SyncFrequency {
    fn default() -> Self {
        SyncFrequency::Daily
    }
}

/// Bookkeeping record for a configured ingestion source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Stable machine name, doubles as crawler registry key
    pub machine_name: String,
    /// Inactive sources are skipped by the scheduler
    pub is_active: bool,
    /// Scheduling priority, ascending (lower runs first)
    pub priority: u32,
    /// Crawl frequency
    pub frequency: SyncFrequency,
    /// Last synchronization attempt; `None` means never synced (always due)
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Total resolutions ingested from this source
    pub total_documents: u64,
    /// Accumulated crawl failures, for operational monitoring
    pub error_count: u64,
    /// Message of the most recent failure
    pub last_error: Option<String>,
}

impl SourceRecord {
    pub fn new(machine_name: impl Into<String>, priority: u32, frequency: SyncFrequency) -> Self {
        Self {
            machine_name: machine_name.into(),
            is_active: true,
            priority,
            frequency,
            last_sync_at: None,
            total_documents: 0,
            error_count: 0,
            last_error: None,
        }
    }
}

/// Application state shared across API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub store: Arc<storage::DocumentStore>,
    pub search: Arc<search::SearchResolver>,
    pub ranking: Arc<ranking::MergeRankEngine>,
    pub alerts: Arc<alerts::AlertEngine>,
}
