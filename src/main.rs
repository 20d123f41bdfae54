//! # Legal Intelligence Hub Main Driver
//!
//! ## Purpose
//! Main entry point for the legal intelligence server. Wires storage, the
//! enrichment queue, external service clients, the crawler registry and the
//! engines together, then runs the ingestion scheduler, the enrichment
//! worker and the HTTP API until shutdown.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file, command line arguments, environment
//!   variables
//! - **Output**: Running API server plus background scheduler and worker
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Open the document store and enrichment queue
//! 4. Build service clients and the crawler registry
//! 5. Spawn the ingestion scheduler and the enrichment worker
//! 6. Serve the API and handle shutdown signals gracefully

use clap::{Arg, ArgAction, Command};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use legal_intelligence_hub::{
    alerts::AlertEngine,
    api::ApiServer,
    clients::ai::HttpAiProvider,
    clients::extraction::TikaExtractor,
    clients::nlp::HttpNlpService,
    clients::notify::WebhookDispatcher,
    clients::vector::QdrantClient,
    config::{Config, LoggingConfig},
    errors::Result,
    ingestion::sources::CrawlerRegistry,
    ingestion::{BoeCrawler, CuriaCrawler, IngestionCoordinator},
    pipeline::EnrichmentPipeline,
    queue::EnrichmentQueue,
    ranking::MergeRankEngine,
    search::SearchResolver,
    storage::DocumentStore,
    AppState, SourceRecord,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("legal-intel-server")
        .version("1.0.0")
        .author("Legal Intelligence Team")
        .about("Jurisdiction-aware legal intelligence engine with semantic search and alerting")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Server port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("ingest-now")
                .long("ingest-now")
                .help("Run one ingestion cycle immediately on startup")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();
    let mut config = Config::from_file(config_path)?;
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }
    let config = Arc::new(config);

    init_tracing(&config.logging);

    tracing::info!("Starting legal intelligence hub");

    // Storage and the enrichment queue share one database.
    let store = Arc::new(DocumentStore::new(&config.storage)?);
    let queue = Arc::new(EnrichmentQueue::new(store.database())?);

    // External service clients.
    let extractor = Arc::new(TikaExtractor::new(config.extraction.clone())?);
    let nlp = Arc::new(HttpNlpService::new(config.nlp.clone())?);
    let ai = Arc::new(HttpAiProvider::new(config.ai.clone())?);
    let vectors = Arc::new(QdrantClient::new(config.vector.clone())?);
    let dispatcher = Arc::new(WebhookDispatcher::new(config.alerts.clone())?);

    // Crawler registry and source bookkeeping, resolved once at startup.
    let mut registry = CrawlerRegistry::new();
    for settings in &config.ingestion.sources {
        match settings.machine_name.as_str() {
            "boe" => registry.register(Arc::new(BoeCrawler::new(
                settings.base_url.clone(),
                &config.ingestion,
            )?)),
            "tjue" => registry.register(Arc::new(CuriaCrawler::new(
                settings.base_url.clone(),
                &config.ingestion,
            )?)),
            other => {
                tracing::warn!(source = other, "No crawler implementation for configured source");
            }
        }

        if store.get_source(&settings.machine_name)?.is_none() {
            let mut record =
                SourceRecord::new(&settings.machine_name, settings.priority, settings.frequency);
            record.is_active = settings.is_active;
            store.put_source(&record)?;
        }
    }
    let registry = Arc::new(registry);

    // Engines.
    let coordinator = Arc::new(IngestionCoordinator::new(
        store.clone(),
        queue.clone(),
        registry,
        config.vector.clone(),
    ));
    let pipeline = Arc::new(EnrichmentPipeline::new(
        store.clone(),
        extractor,
        nlp,
        ai.clone(),
        ai.clone(),
        vectors.clone(),
        config.pipeline.clone(),
        config.ai.clone(),
        config.vector.clone(),
    ));
    let alerts = Arc::new(AlertEngine::new(
        store.clone(),
        dispatcher,
        config.alerts.clone(),
    ));
    let search = Arc::new(SearchResolver::new(
        store.clone(),
        ai,
        vectors,
        config.search.clone(),
        config.vector.clone(),
    ));
    let ranking = Arc::new(MergeRankEngine::new(config.ranking.clone()));

    if matches.get_flag("ingest-now") {
        tracing::info!("Running immediate ingestion cycle");
        coordinator.run_scheduled_ingestion(chrono::Utc::now()).await;
    }

    // Ingestion scheduler.
    let scheduler = {
        let coordinator = coordinator.clone();
        let interval_secs = config.ingestion.scheduler_interval_seconds.max(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                coordinator.run_scheduled_ingestion(chrono::Utc::now()).await;
            }
        })
    };

    // Enrichment worker: one task at a time, alert evaluation after each
    // successful enrichment.
    let worker = {
        let queue = queue.clone();
        let pipeline = pipeline.clone();
        let store = store.clone();
        let alerts = alerts.clone();
        tokio::spawn(async move {
            loop {
                match queue.pop() {
                    Ok(Some(resolution_id)) => {
                        match pipeline.process(resolution_id).await {
                            Ok(()) => match store.get_resolution(&resolution_id) {
                                Ok(Some(resolution)) => alerts.on_new_document(&resolution).await,
                                Ok(None) => {}
                                Err(e) => {
                                    tracing::error!(id = %resolution_id, error = %e, "Could not reload enriched resolution");
                                }
                            },
                            Err(e) => {
                                tracing::warn!(id = %resolution_id, error = %e, "Enrichment failed");
                            }
                        }
                    }
                    Ok(None) => tokio::time::sleep(Duration::from_secs(2)).await,
                    Err(e) => {
                        tracing::error!(error = %e, "Queue read failed");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        })
    };

    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        search,
        ranking,
        alerts,
    };
    let server = ApiServer::new(state);

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    scheduler.abort();
    worker.abort();
    store.flush().await?;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Initialize tracing from the logging configuration; `RUST_LOG` wins when
/// set.
fn init_tracing(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    if config.json_format {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
