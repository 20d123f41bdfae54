//! # CURIA (Court of Justice of the EU) Crawler
//!
//! ## Purpose
//! Fetches judgments, orders and Advocate General opinions from the EU
//! court's case-law API. Cross-border decisions carry ECLI and CELEX
//! identifiers and are indexed into the cross-border vector collection.
//!
//! ## Input/Output Specification
//! - **Input**: Crawl date window, configured base URL
//! - **Output**: Raw records with case numbers, ECLI/CELEX identifiers and
//!   document URLs
//! - **Failure Behavior**: HTTP or schema errors log and yield an empty set

use super::{CrawlWindow, Crawler, RawRecord};
use crate::config::IngestionConfig;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

/// One decision as returned by the case-law API
#[derive(Debug, Deserialize)]
struct CuriaDocument {
    #[serde(default)]
    ecli: String,
    #[serde(default)]
    celex: String,
    #[serde(default)]
    case_number: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    court: String,
    #[serde(default)]
    document_type: String,
    #[serde(default)]
    procedure_type: String,
    #[serde(default)]
    date_decision: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    importance: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct CuriaResponse {
    #[serde(default)]
    results: Vec<CuriaDocument>,
}

/// Crawler for the EU court case-law API
pub struct CuriaCrawler {
    client: reqwest::Client,
    base_url: String,
}

impl CuriaCrawler {
    pub fn new(base_url: impl Into<String>, config: &IngestionConfig) -> Result<Self> {
        let client =
            crate::clients::http_client(config.request_timeout_seconds, &config.user_agent)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Map the court's document type to the system's resolution type
    fn map_document_type(document_type: &str) -> String {
        let document_type = document_type.to_lowercase();
        let mapped = if document_type.contains("judgment") || document_type.contains("sentencia") {
            "sentencia_tjue"
        } else if document_type.contains("order") || document_type.contains("auto") {
            "auto"
        } else if document_type.contains("opinion") {
            "opinion_ag"
        } else {
            "resolucion"
        };
        mapped.to_string()
    }

    fn convert(&self, doc: CuriaDocument) -> Option<RawRecord> {
        // The case number doubles as the business key (C-415/11 style); fall
        // back to the ECLI when the API omits it.
        let external_ref = if !doc.case_number.is_empty() {
            doc.case_number.clone()
        } else if !doc.ecli.is_empty() {
            doc.ecli.clone()
        } else {
            return None;
        };

        if doc.title.is_empty() {
            return None;
        }

        let date_issued = NaiveDate::parse_from_str(&doc.date_decision, "%Y-%m-%d").ok();

        Some(RawRecord {
            source_id: "tjue".to_string(),
            external_ref,
            title: doc.title,
            resolution_type: Self::map_document_type(&doc.document_type),
            issuing_body: if doc.court.is_empty() {
                "Tribunal de Justicia de la Unión Europea".to_string()
            } else {
                doc.court
            },
            jurisdiction: "eu".to_string(),
            date_issued,
            date_published: date_issued,
            original_url: doc.url,
            full_text: doc.text,
            language_original: Some("es".to_string()),
            ecli: doc.ecli,
            celex_number: doc.celex,
            case_number: doc.case_number,
            procedure_type: doc.procedure_type,
            importance_level: doc.importance,
            ..Default::default()
        })
    }
}

#[async_trait]
impl Crawler for CuriaCrawler {
    fn source_id(&self) -> &str {
        "tjue"
    }

    async fn crawl(&self, window: &CrawlWindow) -> Result<Vec<RawRecord>> {
        let url = format!("{}/documents", self.base_url.trim_end_matches('/'));

        let response = match self
            .client
            .get(&url)
            .query(&[
                ("date_from", window.date_from.format("%Y-%m-%d").to_string()),
                ("date_to", window.date_to.format("%Y-%m-%d").to_string()),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(%url, status = %response.status(), "CURIA request failed");
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::error!(%url, error = %e, "CURIA request errored");
                return Ok(Vec::new());
            }
        };

        let parsed: CuriaResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(%url, error = %e, "CURIA body was not valid JSON");
                return Ok(Vec::new());
            }
        };

        let records: Vec<RawRecord> = parsed
            .results
            .into_iter()
            .filter_map(|doc| self.convert(doc))
            .collect();

        tracing::info!(
            count = records.len(),
            from = %window.date_from,
            to = %window.date_to,
            "CURIA crawl finished"
        );

        Ok(records)
    }
}
