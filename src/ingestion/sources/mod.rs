//! # Ingestion Sources Module
//!
//! ## Purpose
//! Defines the common crawler interface for juridical sources and the
//! explicit registry that maps source machine names to crawler
//! implementations, resolved once at startup.
//!
//! ## Input/Output Specification
//! - **Input**: Crawl date window, per-source configuration
//! - **Output**: Raw resolution records normalized to a common shape
//! - **Sources**: National official gazette (BOE), cross-border court
//!   (CURIA); extensible by registering further `Crawler` implementations
//!
//! ## Key Features
//! - Unified `Crawler` trait for all sources
//! - Startup-time registry instead of runtime service-name resolution
//! - Defensive parsing: crawl failures yield empty result sets

pub mod boe;
pub mod curia;

use crate::errors::Result;
use crate::LegalStatus;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub use boe::BoeCrawler;
pub use curia::CuriaCrawler;

/// Date window handed to a crawler run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlWindow {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

/// Raw resolution data as produced by a crawler, before deduplication
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    /// Machine name of the source that produced the record
    pub source_id: String,
    /// Business-unique identifier at the source (docket number, case code)
    pub external_ref: String,
    /// Official title
    pub title: String,
    /// Normalized document type, if the source reports one
    pub resolution_type: String,
    /// Issuing body, if known at crawl time
    pub issuing_body: String,
    /// Jurisdiction, if known at crawl time
    pub jurisdiction: String,
    /// Issue date
    pub date_issued: Option<NaiveDate>,
    /// Publication date
    pub date_published: Option<NaiveDate>,
    /// URL of the original document, used later for text extraction
    pub original_url: String,
    /// Full text when the source delivers it inline; empty otherwise
    pub full_text: String,
    /// Legal status, when reported by the source
    pub status_legal: Option<LegalStatus>,
    /// ISO 639-1 language of the original
    pub language_original: Option<String>,
    /// European Case Law Identifier, cross-border sources
    pub ecli: String,
    /// CELEX number, cross-border sources
    pub celex_number: String,
    /// Court case number, cross-border sources
    pub case_number: String,
    /// Procedure type, cross-border sources
    pub procedure_type: String,
    /// Importance level when the source reports one
    pub importance_level: Option<u8>,
}

/// Trait for juridical source crawlers
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Machine name this crawler serves (registry key)
    fn source_id(&self) -> &str;

    /// Fetch raw records published inside the given window.
    ///
    /// Implementations parse defensively and return an empty vector on
    /// recoverable upstream failures rather than erroring the whole run.
    async fn crawl(&self, window: &CrawlWindow) -> Result<Vec<RawRecord>>;
}

/// Startup-time map from source machine name to crawler implementation
#[derive(Default)]
pub struct CrawlerRegistry {
    crawlers: HashMap<String, Arc<dyn Crawler>>,
}

impl CrawlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a crawler under its own source id
    pub fn register(&mut self, crawler: Arc<dyn Crawler>) {
        self.crawlers
            .insert(crawler.source_id().to_string(), crawler);
    }

    /// Resolve the crawler for a source, if one is registered
    pub fn get(&self, source_id: &str) -> Option<Arc<dyn Crawler>> {
        self.crawlers.get(source_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.crawlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crawlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullCrawler;

    #[async_trait]
    impl Crawler for NullCrawler {
        fn source_id(&self) -> &str {
            "null"
        }

        async fn crawl(&self, _window: &CrawlWindow) -> Result<Vec<RawRecord>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_registry_resolves_by_source_id() {
        let mut registry = CrawlerRegistry::new();
        registry.register(Arc::new(NullCrawler));

        assert!(registry.get("null").is_some());
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.len(), 1);
    }
}
