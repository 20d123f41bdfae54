//! # External Service Clients Module
//!
//! ## Purpose
//! Narrow contracts for the external collaborators the engine consumes, with
//! HTTP-backed implementations: text extraction, NLP microservice, AI chat
//! and embedding providers, vector store and notification transport.
//!
//! ## Input/Output Specification
//! - **Input**: Service endpoints, credentials, per-call timeouts
//! - **Output**: Typed responses (plain text, segments, entities, vectors,
//!   scored points)
//! - **Failure Behavior**: All outbound calls are synchronous with bounded
//!   timeouts; errors are surfaced as typed results and handled at stage
//!   boundaries, never allowed to crash a worker
//!
//! ## Architecture
//! - `extraction`: document download + plain-text extraction (Tika-style)
//! - `nlp`: segmentation and juridical named-entity recognition
//! - `ai`: chat and embedding providers plus tolerant JSON parsing
//! - `vector`: vector store upsert/search/fetch
//! - `notify`: fire-and-forget notification dispatch

pub mod ai;
pub mod extraction;
pub mod nlp;
pub mod notify;
pub mod vector;

use crate::errors::{IntelError, Result};
use std::time::Duration;

/// Build a reqwest client with the given timeout and user agent
pub(crate) fn http_client(timeout_seconds: u64, user_agent: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(user_agent)
        .build()
        .map_err(|e| IntelError::Network {
            details: e.to_string(),
        })
}

/// Default user agent for service-to-service calls
pub(crate) const USER_AGENT: &str = "LegalIntelligenceHub/1.0";
