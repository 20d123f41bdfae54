//! # API Server Module
//!
//! ## Purpose
//! REST API surface over the search resolver, merge & rank engine and alert
//! engine. The persistent entity store and enrichment pipeline sit behind
//! these components; the API only orchestrates them.
//!
//! ## Input/Output Specification
//! - **Input**: HTTP requests with search queries, facet filters, alert CRUD
//! - **Output**: JSON responses with ranked results, facets, alert records
//! - **Endpoints**: Search, similar resolutions, alerts CRUD, health
//!
//! ## Key Features
//! - Structured error responses (`success: false`, generic message)
//! - Boost re-ranking applied on top of raw resolver output
//! - CORS support for web frontends

use crate::alerts::NewAlert;
use crate::errors::{IntelError, Result};
use crate::search::SearchFilters;
use crate::{AppState, LegalStatus, Scope};
use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer};
use serde::Deserialize;
use uuid::Uuid;

/// Search request payload
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub limit: usize,
}

/// Similar-resolutions query parameters
#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    #[serde(default = "default_similar_limit")]
    pub limit: usize,
}

fn default_similar_limit() -> usize {
    5
}

/// Owner-scoped request parameters for alert operations
#[derive(Debug, Deserialize)]
pub struct OwnerParams {
    pub owner_id: u64,
}

/// Toggle payload for an alert
#[derive(Debug, Deserialize)]
pub struct TogglePayload {
    pub owner_id: u64,
    pub is_active: bool,
}

/// Legal-status update payload for a resolution
#[derive(Debug, Deserialize)]
pub struct StatusPayload {
    pub status_legal: LegalStatus,
}

/// API server over the shared application state
pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Run the HTTP server until shutdown
    pub async fn run(self) -> Result<()> {
        let state = self.state.clone();
        let bind_addr = format!("{}:{}", state.config.server.host, state.config.server.port);
        let enable_cors = state.config.server.enable_cors;

        tracing::info!("Starting API server on {}", bind_addr);

        HttpServer::new(move || {
            let cors = if enable_cors {
                Cors::permissive()
            } else {
                Cors::default()
            };

            App::new()
                .app_data(web::Data::new(state.clone()))
                .wrap(cors)
                .route("/api/search", web::post().to(search_handler))
                .route(
                    "/api/resolutions/{id}/similar",
                    web::get().to(similar_handler),
                )
                .route(
                    "/api/resolutions/{id}/status",
                    web::patch().to(update_status_handler),
                )
                .route("/api/alerts", web::post().to(create_alert_handler))
                .route("/api/alerts", web::get().to(list_alerts_handler))
                .route("/api/alerts/{id}/toggle", web::post().to(toggle_alert_handler))
                .route("/api/alerts/{id}", web::delete().to(delete_alert_handler))
                .route("/health", web::get().to(health_handler))
        })
        .workers(num_cpus::get())
        .bind(&bind_addr)
        .map_err(|e| IntelError::Internal {
            message: format!("Failed to bind server to {}: {}", bind_addr, e),
        })?
        .run()
        .await
        .map_err(|e| IntelError::Internal {
            message: format!("Server error: {}", e),
        })
    }
}

async fn search_handler(
    state: web::Data<AppState>,
    request: web::Json<SearchRequest>,
) -> HttpResponse {
    let mut response = state
        .search
        .search(
            &request.query,
            &request.filters,
            request.scope,
            request.limit,
        )
        .await;

    if response.success {
        response.results = state.ranking.apply_boosts(response.results);
    }

    HttpResponse::Ok().json(response)
}

async fn similar_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<SimilarParams>,
) -> HttpResponse {
    let Ok(id) = Uuid::parse_str(&path.into_inner()) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": "Invalid resolution id.",
        }));
    };

    let results = state.search.find_similar(id, params.limit).await;
    let results = state.ranking.apply_boosts(results);

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": results.len(),
        "results": results,
    }))
}

/// Apply a legal-status transition and evaluate status-triggered alerts
async fn update_status_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<StatusPayload>,
) -> HttpResponse {
    let Ok(id) = Uuid::parse_str(&path.into_inner()) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": "Invalid resolution id.",
        }));
    };

    let mut resolution = match state.store.get_resolution(&id) {
        Ok(Some(resolution)) => resolution,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "success": false,
                "error": "Resolution not found.",
            }));
        }
        Err(e) => {
            tracing::error!(id = %id, error = %e, "Status update load failed");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": "Error updating status.",
            }));
        }
    };

    let old_status = resolution.status_legal;
    let new_status = payload.status_legal;

    if old_status != new_status {
        resolution.status_legal = new_status;
        if let Err(e) = state.store.save_resolution(&resolution) {
            tracing::error!(id = %id, error = %e, "Status update save failed");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": "Error updating status.",
            }));
        }

        state
            .alerts
            .on_status_change(&resolution, old_status, new_status)
            .await;
    }

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "status_legal": new_status,
    }))
}

async fn create_alert_handler(
    state: web::Data<AppState>,
    params: web::Query<OwnerParams>,
    request: web::Json<NewAlert>,
) -> HttpResponse {
    match state
        .alerts
        .create_alert(request.into_inner(), params.owner_id)
    {
        Ok(alert) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "alert": alert,
        })),
        Err(IntelError::AlertLimitReached { max }) => {
            HttpResponse::Forbidden().json(serde_json::json!({
                "success": false,
                "error": format!(
                    "You have reached the maximum number of alerts for your plan ({}).",
                    max
                ),
            }))
        }
        Err(e) => {
            tracing::error!(error = %e, "Alert creation failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": "Error creating alert.",
            }))
        }
    }
}

async fn list_alerts_handler(
    state: web::Data<AppState>,
    params: web::Query<OwnerParams>,
) -> HttpResponse {
    match state.alerts.list_alerts(params.owner_id) {
        Ok(alerts) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "alerts": alerts,
        })),
        Err(e) => {
            tracing::error!(error = %e, "Alert listing failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": "Error listing alerts.",
            }))
        }
    }
}

async fn toggle_alert_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<TogglePayload>,
) -> HttpResponse {
    let Ok(id) = Uuid::parse_str(&path.into_inner()) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": "Invalid alert id.",
        }));
    };

    match state
        .alerts
        .toggle_alert(&id, payload.is_active, payload.owner_id)
    {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({"success": true})),
        Ok(false) => HttpResponse::NotFound().json(serde_json::json!({
            "success": false,
            "error": "Alert not found.",
        })),
        Err(e) => {
            tracing::error!(error = %e, "Alert toggle failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": "Error updating alert.",
            }))
        }
    }
}

async fn delete_alert_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<OwnerParams>,
) -> HttpResponse {
    let Ok(id) = Uuid::parse_str(&path.into_inner()) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "error": "Invalid alert id.",
        }));
    };

    match state.alerts.delete_alert(&id, params.owner_id) {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({"success": true})),
        Ok(false) => HttpResponse::NotFound().json(serde_json::json!({
            "success": false,
            "error": "Alert not found.",
        })),
        Err(e) => {
            tracing::error!(error = %e, "Alert deletion failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": "Error deleting alert.",
            }))
        }
    }
}

async fn health_handler(state: web::Data<AppState>) -> HttpResponse {
    match state.store.health_check() {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "resolutions": state.store.resolution_count(),
            "citation_edges": state.store.edge_count(),
        })),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "degraded",
            }))
        }
    }
}
