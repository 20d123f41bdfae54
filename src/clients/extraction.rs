//! # Text Extraction Client
//!
//! ## Purpose
//! Converts raw documents (PDF, DOCX, HTML) into plain text through an
//! Apache Tika-style extraction server. The document is downloaded from its
//! original URL and forwarded to the server for conversion.
//!
//! ## Input/Output Specification
//! - **Input**: Document URL
//! - **Output**: Extracted plain text, or an error when the document cannot
//!   be fetched or converted
//! - **Formats**: PDF, DOCX, HTML and anything the extraction server accepts

use crate::config::ExtractionConfig;
use crate::errors::{IntelError, Result};
use async_trait::async_trait;

/// Contract for the text extraction gateway
#[async_trait]
pub trait TextExtraction: Send + Sync {
    /// Fetch the document at `url` and return its plain text
    async fn extract(&self, url: &str) -> Result<String>;
}

/// HTTP client for a Tika-style extraction server
pub struct TikaExtractor {
    client: reqwest::Client,
    config: ExtractionConfig,
}

impl TikaExtractor {
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        let client = super::http_client(config.timeout_seconds, super::USER_AGENT)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TextExtraction for TikaExtractor {
    async fn extract(&self, url: &str) -> Result<String> {
        // Download the original document.
        let document = self.client.get(url).send().await?;

        if !document.status().is_success() {
            return Err(IntelError::ExternalService {
                service: "extraction".to_string(),
                details: format!("document fetch returned HTTP {}", document.status()),
            });
        }

        let content_type = document
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let body = document.bytes().await?;
        if body.is_empty() {
            return Err(IntelError::ExternalService {
                service: "extraction".to_string(),
                details: format!("empty document downloaded from {}", url),
            });
        }

        // Forward to the extraction server for plain-text conversion.
        let response = self
            .client
            .put(format!("{}/tika", self.config.url.trim_end_matches('/')))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::ACCEPT, "text/plain")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IntelError::ExternalService {
                service: "extraction".to_string(),
                details: format!("extraction server returned HTTP {}", response.status()),
            });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_extract_round_trip() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/docs/boe-a-2024-1.pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"%PDF-1.4 fake".to_vec()),
            )
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/tika"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Texto extraído"))
            .mount(&server)
            .await;

        let extractor = TikaExtractor::new(ExtractionConfig {
            url: server.uri(),
            timeout_seconds: 5,
        })
        .unwrap();

        let text = extractor
            .extract(&format!("{}/docs/boe-a-2024-1.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(text, "Texto extraído");
    }

    #[tokio::test]
    async fn test_extract_fails_on_empty_document() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/docs/empty.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(Vec::new()))
            .mount(&server)
            .await;

        let extractor = TikaExtractor::new(ExtractionConfig {
            url: server.uri(),
            timeout_seconds: 5,
        })
        .unwrap();

        let result = extractor
            .extract(&format!("{}/docs/empty.pdf", server.uri()))
            .await;
        assert!(result.is_err());
    }
}
