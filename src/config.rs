//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration management for the legal intelligence engine,
//! supporting TOML files and environment variable overrides with validation
//! and type-safe access to all system settings.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML), environment variables
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Type checking, range validation, dependency verification
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (highest priority)
//! 2. Configuration files
//! 3. Default values (lowest priority)
//!
//! The loaded configuration is an immutable snapshot: pipeline stages and
//! search paths receive references to it explicitly instead of re-reading
//! ambient state mid-run.

use crate::errors::{IntelError, Result};
use crate::SyncFrequency;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server and API configuration
    pub server: ServerConfig,
    /// Data ingestion settings
    pub ingestion: IngestionConfig,
    /// Enrichment pipeline settings
    pub pipeline: PipelineConfig,
    /// Text extraction service settings
    pub extraction: ExtractionConfig,
    /// NLP microservice settings
    pub nlp: NlpConfig,
    /// AI chat/embedding provider settings
    pub ai: AiConfig,
    /// Vector store settings
    pub vector: VectorConfig,
    /// Search resolver behavior
    pub search: SearchConfig,
    /// Merge & rank boost parameters
    pub ranking: RankingConfig,
    /// Alert engine settings
    pub alerts: AlertsConfig,
    /// Storage and database settings
    pub storage: StorageConfig,
    /// Logging and monitoring
    pub logging: LoggingConfig,
}

/// Server and API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Request timeout in seconds
    pub request_timeout_seconds: u64,
}

/// A configured ingestion source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Machine name, doubles as crawler registry key
    pub machine_name: String,
    /// API base URL of the source
    pub base_url: String,
    /// Inactive sources are skipped by the scheduler
    pub is_active: bool,
    /// Scheduling priority, ascending
    pub priority: u32,
    /// Crawl frequency
    pub frequency: SyncFrequency,
}

/// Data ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Configured sources, registered against the crawler registry at startup
    pub sources: Vec<SourceSettings>,
    /// User-Agent header for outbound crawl requests
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
    /// Scheduler tick interval in seconds
    pub scheduler_interval_seconds: u64,
}

/// Enrichment pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Normalized text is truncated to this length for downstream stages
    pub max_text_length: usize,
    /// Character budget for the classification chat call
    pub classification_max_chars: usize,
    /// Character budget for the summarization chat call
    pub summary_max_chars: usize,
    /// Chunk window size in words
    pub chunk_max_tokens: usize,
    /// Chunk overlap in words (stride = chunk_max_tokens - chunk_overlap_tokens)
    pub chunk_overlap_tokens: usize,
    /// Vector points per upsert batch
    pub index_batch_size: usize,
}

/// Text extraction service (Tika-style) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Base URL of the extraction server
    pub url: String,
    /// Timeout in seconds for download + extraction
    pub timeout_seconds: u64,
}

/// NLP microservice configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NlpConfig {
    /// Base URL of the NLP service
    pub url: String,
    /// Timeout in seconds for segment/ner calls
    pub timeout_seconds: u64,
}

/// AI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Chat completions endpoint
    pub chat_url: String,
    /// Chat model identifier
    pub chat_model: String,
    /// Embeddings endpoint
    pub embeddings_url: String,
    /// Embedding model identifier; must match the model used at indexing time
    pub embedding_model: String,
    /// API key sent as bearer token (optional)
    pub api_key: Option<String>,
    /// Sampling temperature for classification/summarization
    pub temperature: f32,
    /// Max completion tokens
    pub max_tokens: u32,
    /// Timeout in seconds per call
    pub timeout_seconds: u64,
    /// System prompt for national classification
    pub classification_prompt: String,
    /// System prompt for cross-border classification; falls back to the
    /// national prompt when empty
    pub cross_border_classification_prompt: String,
    /// System prompt for national summarization
    pub summary_prompt: String,
    /// System prompt for cross-border summarization
    pub cross_border_summary_prompt: String,
}

impl AiConfig {
    /// Classification prompt for the given document scope
    pub fn classification_prompt_for(&self, cross_border: bool) -> &str {
        if cross_border && !self.cross_border_classification_prompt.is_empty() {
            &self.cross_border_classification_prompt
        } else {
            &self.classification_prompt
        }
    }

    /// Summarization prompt for the given document scope
    pub fn summary_prompt_for(&self, cross_border: bool) -> &str {
        if cross_border && !self.cross_border_summary_prompt.is_empty() {
            &self.cross_border_summary_prompt
        } else {
            &self.summary_prompt
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Base URL of the vector store
    pub url: String,
    /// API key (optional)
    pub api_key: Option<String>,
    /// Collection for national sources
    pub collection_national: String,
    /// Collection for cross-border sources
    pub collection_cross_border: String,
    /// Timeout in seconds per call
    pub timeout_seconds: u64,
}

impl VectorConfig {
    /// Collection a resolution from `source_id` belongs to
    pub fn collection_for_source(&self, source_id: &str) -> &str {
        if crate::CROSS_BORDER_SOURCES.contains(&source_id) {
            &self.collection_cross_border
        } else {
            &self.collection_national
        }
    }
}

/// Search resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default maximum number of results
    pub max_results: usize,
    /// Minimum similarity score for vector hits
    pub min_score: f32,
    /// Query embedding cache size (number of entries)
    pub embedding_cache_size: usize,
}

/// Merge & rank boost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Sources whose documents receive the primacy boost
    pub primacy_sources: Vec<String>,
    /// Fixed boost for primacy sources
    pub primacy_boost: f32,
    /// Rolling freshness window in days
    pub freshness_window_days: i64,
    /// Fixed boost for documents issued inside the window
    pub freshness_boost: f32,
}

/// Alert engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Maximum alerts per owner; 0 = unlimited
    pub max_alerts_per_owner: u32,
    /// Notification transport endpoint
    pub dispatch_url: String,
    /// Timeout in seconds per dispatch
    pub dispatch_timeout_seconds: u64,
}

/// Storage and database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database directory path
    pub db_path: PathBuf,
    /// Enable compression of stored records
    pub enable_compression: bool,
}

/// Logging and monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| IntelError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| IntelError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("LEGAL_INTEL_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("LEGAL_INTEL_PORT") {
            self.server.port = port.parse().map_err(|_| IntelError::Config {
                message: "Invalid port number in LEGAL_INTEL_PORT".to_string(),
            })?;
        }
        if let Ok(db_path) = std::env::var("LEGAL_INTEL_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }
        if let Ok(api_key) = std::env::var("LEGAL_INTEL_AI_API_KEY") {
            self.ai.api_key = Some(api_key);
        }
        if let Ok(api_key) = std::env::var("LEGAL_INTEL_VECTOR_API_KEY") {
            self.vector.api_key = Some(api_key);
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(IntelError::ValidationFailed {
                field: "server.port".to_string(),
                reason: "Port cannot be zero".to_string(),
            });
        }

        if self.pipeline.chunk_max_tokens == 0 {
            return Err(IntelError::ValidationFailed {
                field: "pipeline.chunk_max_tokens".to_string(),
                reason: "Chunk window must be greater than zero".to_string(),
            });
        }

        if self.pipeline.chunk_overlap_tokens >= self.pipeline.chunk_max_tokens {
            return Err(IntelError::ValidationFailed {
                field: "pipeline.chunk_overlap_tokens".to_string(),
                reason: "Overlap must be smaller than the chunk window".to_string(),
            });
        }

        if self.pipeline.index_batch_size == 0 {
            return Err(IntelError::ValidationFailed {
                field: "pipeline.index_batch_size".to_string(),
                reason: "Index batch size must be greater than zero".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.search.min_score) {
            return Err(IntelError::ValidationFailed {
                field: "search.min_score".to_string(),
                reason: "Minimum score must be within [0, 1]".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                enable_cors: true,
                request_timeout_seconds: 30,
            },
            ingestion: IngestionConfig {
                sources: vec![
                    SourceSettings {
                        machine_name: "boe".to_string(),
                        base_url: "https://www.boe.es/datosabiertos/api".to_string(),
                        is_active: true,
                        priority: 1,
                        frequency: SyncFrequency::Daily,
                    },
                    SourceSettings {
                        machine_name: "tjue".to_string(),
                        base_url: "https://curia.europa.eu/api".to_string(),
                        is_active: true,
                        priority: 2,
                        frequency: SyncFrequency::Weekly,
                    },
                ],
                user_agent: "LegalIntelligenceHub/1.0 (legal-research-bot)".to_string(),
                request_timeout_seconds: 60,
                scheduler_interval_seconds: 300,
            },
            pipeline: PipelineConfig {
                max_text_length: 50_000,
                classification_max_chars: 8_000,
                summary_max_chars: 12_000,
                chunk_max_tokens: 512,
                chunk_overlap_tokens: 50,
                index_batch_size: 100,
            },
            extraction: ExtractionConfig {
                url: "http://tika:9998".to_string(),
                timeout_seconds: 60,
            },
            nlp: NlpConfig {
                url: "http://legal-nlp:8001".to_string(),
                timeout_seconds: 120,
            },
            ai: AiConfig {
                chat_url: "https://api.openai.com/v1/chat/completions".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
                embeddings_url: "https://api.openai.com/v1/embeddings".to_string(),
                embedding_model: "text-embedding-3-large".to_string(),
                api_key: None,
                temperature: 0.2,
                max_tokens: 2000,
                timeout_seconds: 60,
                classification_prompt: "You classify Spanish juridical resolutions. \
                    Reply with a single JSON object with keys: jurisdiction (string), \
                    topics (array of strings), resolution_type (string), \
                    importance_level (integer 1-3)."
                    .to_string(),
                cross_border_classification_prompt: "You classify European juridical \
                    resolutions. Reply with a single JSON object with keys: jurisdiction \
                    (string), topics (array of strings), resolution_type (string), \
                    importance_level (integer 1-3), procedure_type (string)."
                    .to_string(),
                summary_prompt: "You summarize Spanish juridical resolutions. Reply with \
                    a single JSON object with keys: abstract (3-5 lines), key_holdings \
                    (ratio decidendi)."
                    .to_string(),
                cross_border_summary_prompt: "You summarize European juridical \
                    resolutions. Reply with a single JSON object with keys: abstract \
                    (3-5 lines), key_holdings (ratio decidendi), impact_analysis \
                    (impact on national law)."
                    .to_string(),
            },
            vector: VectorConfig {
                url: "http://qdrant:6333".to_string(),
                api_key: None,
                collection_national: "legal_intelligence".to_string(),
                collection_cross_border: "legal_intelligence_eu".to_string(),
                timeout_seconds: 30,
            },
            search: SearchConfig {
                max_results: 20,
                min_score: 0.65,
                embedding_cache_size: 1000,
            },
            ranking: RankingConfig {
                primacy_sources: crate::CROSS_BORDER_SOURCES
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                primacy_boost: 0.05,
                freshness_window_days: 180,
                freshness_boost: 0.02,
            },
            alerts: AlertsConfig {
                max_alerts_per_owner: 3,
                dispatch_url: "http://notifier:8025/dispatch".to_string(),
                dispatch_timeout_seconds: 10,
            },
            storage: StorageConfig {
                db_path: PathBuf::from("./data/legal_intel.db"),
                enable_compression: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let mut config = Config::default();
        config.pipeline.chunk_overlap_tokens = config.pipeline.chunk_max_tokens;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_collection_for_source() {
        let config = Config::default();
        assert_eq!(
            config.vector.collection_for_source("boe"),
            "legal_intelligence"
        );
        assert_eq!(
            config.vector.collection_for_source("tjue"),
            "legal_intelligence_eu"
        );
    }

    #[test]
    fn test_cross_border_prompt_falls_back_to_national() {
        let mut config = Config::default();
        config.ai.cross_border_classification_prompt = String::new();
        assert_eq!(
            config.ai.classification_prompt_for(true),
            config.ai.classification_prompt
        );
    }
}
