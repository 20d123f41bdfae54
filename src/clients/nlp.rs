//! # NLP Microservice Client
//!
//! ## Purpose
//! Client for the external NLP microservice that segments resolutions into
//! structural sections (antecedentes, fundamentos, fallo, ...) and extracts
//! typed juridical entity references (laws, articles, judgments, directives).
//!
//! ## Input/Output Specification
//! - **Input**: Normalized resolution text, source identifier
//! - **Output**: Structural segments; typed entity references with subtype
//!   and surrounding context
//! - **Failure Behavior**: Callers fall back to a single `body` segment /
//!   an empty entity list; this client only reports the error

use crate::config::NlpConfig;
use crate::errors::{IntelError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Structural section of a resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Section name (antecedentes, fundamentos, fallo, body, ...)
    pub section: String,
    /// Section text
    pub text: String,
}

impl Segment {
    /// Single-segment fallback covering the whole text
    pub fn body(text: impl Into<String>) -> Self {
        Self {
            section: "body".to_string(),
            text: text.into(),
        }
    }
}

/// Typed juridical entity reference detected by NER
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NerEntity {
    /// Entity type (legislation_ref, court_ref, ...)
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Subtype (ley, rd, articulo, sentencia, directiva_ue, ...)
    #[serde(default)]
    pub subtype: String,
    /// Reference as written in the text
    #[serde(default)]
    pub reference: String,
    /// Text fragment where the reference appears
    #[serde(default)]
    pub context: String,
}

/// Contract for the NLP microservice
#[async_trait]
pub trait NlpService: Send + Sync {
    /// Split text into structural sections
    async fn segment(&self, text: &str, source_id: &str) -> Result<Vec<Segment>>;

    /// Extract typed juridical entity references
    async fn ner(&self, text: &str) -> Result<Vec<NerEntity>>;
}

#[derive(Serialize)]
struct SegmentRequest<'a> {
    text: &'a str,
    source_id: &'a str,
}

#[derive(Serialize)]
struct NerRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct NerResponse {
    #[serde(default)]
    entities: Vec<NerEntity>,
}

/// HTTP client for the NLP microservice
pub struct HttpNlpService {
    client: reqwest::Client,
    config: NlpConfig,
}

impl HttpNlpService {
    pub fn new(config: NlpConfig) -> Result<Self> {
        let client = super::http_client(config.timeout_seconds, super::USER_AGENT)?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, task: &str) -> String {
        format!("{}/api/{}", self.config.url.trim_end_matches('/'), task)
    }
}

#[async_trait]
impl NlpService for HttpNlpService {
    async fn segment(&self, text: &str, source_id: &str) -> Result<Vec<Segment>> {
        let response = self
            .client
            .post(self.endpoint("segment"))
            .json(&SegmentRequest { text, source_id })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntelError::ExternalService {
                service: "nlp".to_string(),
                details: format!("segment returned HTTP {}", response.status()),
            });
        }

        Ok(response.json().await?)
    }

    async fn ner(&self, text: &str) -> Result<Vec<NerEntity>> {
        let response = self
            .client
            .post(self.endpoint("ner"))
            .json(&NerRequest { text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntelError::ExternalService {
                service: "nlp".to_string(),
                details: format!("ner returned HTTP {}", response.status()),
            });
        }

        let body: NerResponse = response.json().await?;
        Ok(body.entities)
    }
}
