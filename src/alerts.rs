//! # Alert Matching Engine Module
//!
//! ## Purpose
//! Evaluates new and status-changed resolutions against subscriber alert
//! profiles and dispatches notifications over the configured channels.
//! Matching runs in two phases: a cheap structural pre-filter keyed by the
//! alert type, then conjunctive evaluation of the alert's optional filter
//! sets.
//!
//! ## Input/Output Specification
//! - **Input**: Resolution events (insert, status transition), alert CRUD
//!   requests
//! - **Output**: Updated alert counters, one notification per configured
//!   channel per match
//! - **Filter Semantics**: Every filter set is either empty (accept-all) or
//!   a non-empty inclusion list; sets are conjunctive across dimensions
//!
//! ## Key Features
//! - Per-type trigger table over sources, types and status transitions
//! - Case-insensitive topic intersection
//! - Fire-and-forget per-channel dispatch with channel isolation
//! - Plan-bound creation ceiling with fail-open counting

use crate::clients::notify::{NotificationDispatcher, NotificationPayload};
use crate::config::AlertsConfig;
use crate::errors::{IntelError, Result};
use crate::storage::DocumentStore;
use crate::{LegalStatus, Resolution};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Alert types, each mapping to a structural trigger predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// A followed resolution was annulled
    ResolutionAnnulled,
    /// Settled doctrine was superseded by newer criteria
    CriteriaChange,
    /// A new judgment or order of doctrinal relevance was indexed
    NewRelevantDoctrine,
    /// Followed legislation was repealed or amended
    LegislationModified,
    /// A procedural order with deadline implications was indexed
    ProceduralDeadline,
    /// A decision of the cross-border court of justice was indexed
    CrossBorderCourt,
    /// A decision of the human-rights court was indexed
    HumanRightsCourt,
    /// A guideline of the data-protection board was indexed
    DataProtectionBoard,
    /// A directive with a transposition deadline was indexed
    TranspositionDeadline,
    /// An Advocate General opinion was published
    AdvocateGeneralOpinion,
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

/// Structural trigger sets for one alert type
struct TriggerSet {
    sources: &'static [&'static str],
    types: &'static [&'static str],
    statuses: &'static [LegalStatus],
}

/// Trigger table: which sources, resolution types or status transitions can
/// fire each alert type. Documents failing this pre-filter are rejected
/// before the more expensive filter evaluation.
fn triggers_for(alert_type: AlertType) -> TriggerSet {
    match alert_type {
        AlertType::ResolutionAnnulled => TriggerSet {
            sources: &[],
            types: &[],
            statuses: &[LegalStatus::Anulada],
        },
        AlertType::CriteriaChange => TriggerSet {
            sources: &[],
            types: &[],
            statuses: &[LegalStatus::Superada],
        },
        AlertType::NewRelevantDoctrine => TriggerSet {
            sources: &[],
            types: &["sentencia", "sentencia_tjue", "auto"],
            statuses: &[],
        },
        AlertType::LegislationModified => TriggerSet {
            sources: &[],
            types: &["ley", "real_decreto", "directiva", "reglamento"],
            statuses: &[LegalStatus::Derogada, LegalStatus::ParcialmenteDerogada],
        },
        AlertType::ProceduralDeadline => TriggerSet {
            sources: &[],
            types: &["auto", "providencia"],
            statuses: &[],
        },
        AlertType::CrossBorderCourt => TriggerSet {
            sources: &["tjue"],
            types: &[],
            statuses: &[],
        },
        AlertType::HumanRightsCourt => TriggerSet {
            sources: &["tedh"],
            types: &[],
            statuses: &[],
        },
        AlertType::DataProtectionBoard => TriggerSet {
            sources: &["edpb"],
            types: &[],
            statuses: &[],
        },
        AlertType::TranspositionDeadline => TriggerSet {
            sources: &[],
            types: &["directiva"],
            statuses: &[],
        },
        AlertType::AdvocateGeneralOpinion => TriggerSet {
            sources: &[],
            types: &["opinion_ag"],
            statuses: &[],
        },
    }
}

/// Default severity per alert type, applied when the subscriber sets none
fn default_severity(alert_type: AlertType) -> Severity {
    match alert_type {
        AlertType::ResolutionAnnulled => Severity::Critical,
        AlertType::CriteriaChange
        | AlertType::LegislationModified
        | AlertType::HumanRightsCourt
        | AlertType::CrossBorderCourt => Severity::High,
        AlertType::NewRelevantDoctrine
        | AlertType::ProceduralDeadline
        | AlertType::DataProtectionBoard
        | AlertType::TranspositionDeadline => Severity::Medium,
        AlertType::AdvocateGeneralOpinion => Severity::Low,
    }
}

/// A subscriber alert profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    /// Owner (subscriber) id
    pub owner_id: u64,
    /// Descriptive label chosen by the owner
    pub label: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    /// Source filter; empty means unrestricted
    pub filter_sources: Vec<String>,
    /// Topic filter; empty means unrestricted
    pub filter_topics: Vec<String>,
    /// Jurisdiction filter; empty means unrestricted
    pub filter_jurisdictions: Vec<String>,
    /// Notification channels (email, in_app, push)
    pub channels: Vec<String>,
    pub is_active: bool,
    pub trigger_count: u64,
    pub last_triggered: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Creation request for a new alert
#[derive(Debug, Clone, Deserialize)]
pub struct NewAlert {
    pub label: String,
    pub alert_type: AlertType,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub filter_sources: Vec<String>,
    #[serde(default)]
    pub filter_topics: Vec<String>,
    #[serde(default)]
    pub filter_jurisdictions: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

/// Alert matching and lifecycle engine
pub struct AlertEngine {
    store: Arc<DocumentStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    config: AlertsConfig,
}

impl AlertEngine {
    pub fn new(
        store: Arc<DocumentStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: AlertsConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            config,
        }
    }

    /// Evaluate a freshly indexed resolution against all active alerts
    pub async fn on_new_document(&self, resolution: &Resolution) {
        self.evaluate(resolution, None).await;
    }

    /// Evaluate a legal-status transition against all active alerts
    pub async fn on_status_change(
        &self,
        resolution: &Resolution,
        old_status: LegalStatus,
        new_status: LegalStatus,
    ) {
        if old_status == new_status {
            return;
        }
        self.evaluate(resolution, Some(new_status)).await;
    }

    async fn evaluate(&self, resolution: &Resolution, new_status: Option<LegalStatus>) {
        let active_alerts = match self.store.active_alerts() {
            Ok(alerts) => alerts,
            Err(e) => {
                tracing::error!(error = %e, "Could not load active alerts");
                return;
            }
        };

        for mut alert in active_alerts {
            // Phase 1: structural pre-filter by alert type.
            if !Self::matches_alert_type(
                alert.alert_type,
                &resolution.source_id,
                &resolution.resolution_type,
                new_status,
            ) {
                continue;
            }

            // Phase 2: conjunctive filter evaluation.
            if !Self::matches_filters(&alert, resolution) {
                continue;
            }

            self.trigger(&mut alert, resolution).await;
        }
    }

    /// Structural pre-filter: can this document fire this alert type at all?
    fn matches_alert_type(
        alert_type: AlertType,
        source_id: &str,
        resolution_type: &str,
        new_status: Option<LegalStatus>,
    ) -> bool {
        let triggers = triggers_for(alert_type);

        if !triggers.statuses.is_empty() {
            if let Some(status) = new_status {
                if triggers.statuses.contains(&status) {
                    return true;
                }
            }
            // Status-only alert types cannot fire without a matching
            // transition.
            if triggers.sources.is_empty() && triggers.types.is_empty() {
                return false;
            }
        }

        if triggers.sources.contains(&source_id) {
            return true;
        }

        triggers.types.contains(&resolution_type)
    }

    /// Conjunctive filter evaluation over sources, topics and jurisdictions.
    ///
    /// An empty set accepts everything; a non-empty set must intersect the
    /// document's corresponding attribute. Topic matching is
    /// case-insensitive, and a non-empty topic filter rejects documents
    /// without topics.
    fn matches_filters(alert: &Alert, resolution: &Resolution) -> bool {
        if !alert.filter_sources.is_empty()
            && !alert.filter_sources.contains(&resolution.source_id)
        {
            return false;
        }

        if !alert.filter_topics.is_empty() {
            if resolution.topics.is_empty() {
                return false;
            }
            let wanted: Vec<String> = alert
                .filter_topics
                .iter()
                .map(|t| t.to_lowercase())
                .collect();
            let has_common = resolution
                .topics
                .iter()
                .any(|t| wanted.contains(&t.to_lowercase()));
            if !has_common {
                return false;
            }
        }

        if !alert.filter_jurisdictions.is_empty()
            && !alert
                .filter_jurisdictions
                .contains(&resolution.jurisdiction)
        {
            return false;
        }

        true
    }

    /// Fire one alert: update counters, persist, dispatch per channel.
    ///
    /// Channel dispatch is fire-and-forget; one channel's failure never
    /// blocks siblings or the counter update.
    async fn trigger(&self, alert: &mut Alert, resolution: &Resolution) {
        alert.trigger_count += 1;
        alert.last_triggered = Some(Utc::now());

        if let Err(e) = self.store.put_alert(alert) {
            tracing::error!(alert = %alert.id, error = %e, "Could not persist alert counters");
        }

        let payload = NotificationPayload {
            subject: format!(
                "[{}] {} — {}",
                alert.severity.as_str().to_uppercase(),
                alert.label,
                resolution.external_ref
            ),
            body: format!(
                "Alerta: {}\n\nResolución: {}\nReferencia: {}\nÓrgano: {}\nFecha: {}\n\n{}",
                alert.label,
                resolution.title,
                resolution.external_ref,
                resolution.issuing_body,
                resolution
                    .date_issued
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                resolution.abstract_ai,
            ),
            severity: alert.severity.as_str().to_string(),
            external_ref: resolution.external_ref.clone(),
        };

        let recipient = alert.owner_id.to_string();
        for channel in &alert.channels {
            if let Err(e) = self.dispatcher.send(channel, &recipient, &payload).await {
                tracing::error!(
                    alert = %alert.id,
                    channel = %channel,
                    error = %e,
                    "Notification dispatch failed"
                );
            }
        }

        tracing::info!(
            alert = %alert.id,
            external_ref = %resolution.external_ref,
            channels = alert.channels.len(),
            "Alert triggered"
        );
    }

    // =========================================================================
    // Alert lifecycle (owner-scoped CRUD).
    // =========================================================================

    /// Create an alert for `owner_id`, enforcing the plan ceiling.
    ///
    /// A ceiling of 0 means unlimited. When the current count cannot be
    /// determined the check fails open and creation proceeds.
    pub fn create_alert(&self, request: NewAlert, owner_id: u64) -> Result<Alert> {
        let max_alerts = self.config.max_alerts_per_owner;
        if max_alerts > 0 {
            match self.store.count_alerts_for_owner(owner_id) {
                Ok(count) if count >= u64::from(max_alerts) => {
                    return Err(IntelError::AlertLimitReached { max: max_alerts });
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(owner = owner_id, error = %e, "Alert count failed, allowing creation");
                }
            }
        }

        let channels = if request.channels.is_empty() {
            vec!["in_app".to_string()]
        } else {
            request.channels
        };

        let alert = Alert {
            id: Uuid::new_v4(),
            owner_id,
            label: request.label,
            alert_type: request.alert_type,
            severity: request
                .severity
                .unwrap_or_else(|| default_severity(request.alert_type)),
            filter_sources: request.filter_sources,
            filter_topics: request.filter_topics,
            filter_jurisdictions: request.filter_jurisdictions,
            channels,
            is_active: true,
            trigger_count: 0,
            last_triggered: None,
            created_at: Utc::now(),
        };

        self.store.put_alert(&alert)?;

        tracing::info!(alert = %alert.id, owner = owner_id, alert_type = ?alert.alert_type, "Alert created");
        Ok(alert)
    }

    /// Alerts of one owner, newest first
    pub fn list_alerts(&self, owner_id: u64) -> Result<Vec<Alert>> {
        self.store.alerts_by_owner(owner_id)
    }

    /// Toggle an alert's active flag; returns false on missing or foreign
    /// alerts
    pub fn toggle_alert(&self, alert_id: &Uuid, is_active: bool, owner_id: u64) -> Result<bool> {
        let Some(mut alert) = self.store.get_alert(alert_id)? else {
            return Ok(false);
        };
        if alert.owner_id != owner_id {
            return Ok(false);
        }

        alert.is_active = is_active;
        self.store.put_alert(&alert)?;
        Ok(true)
    }

    /// Delete an owner's alert; returns false on missing or foreign alerts
    pub fn delete_alert(&self, alert_id: &Uuid, owner_id: u64) -> Result<bool> {
        let Some(alert) = self.store.get_alert(alert_id)? else {
            return Ok(false);
        };
        if alert.owner_id != owner_id {
            return Ok(false);
        }

        self.store.delete_alert(alert_id)?;
        tracing::info!(alert = %alert_id, owner = owner_id, "Alert deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::tests::{sample_resolution, temp_store};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    struct RecordingDispatcher {
        calls: Mutex<Vec<(String, String)>>,
        failing_channels: HashSet<String>,
    }

    impl RecordingDispatcher {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing_channels: HashSet::new(),
            }
        }

        fn failing_on(channel: &str) -> Self {
            let mut failing_channels = HashSet::new();
            failing_channels.insert(channel.to_string());
            Self {
                calls: Mutex::new(Vec::new()),
                failing_channels,
            }
        }
    }

    #[async_trait]
    impl NotificationDispatcher for RecordingDispatcher {
        async fn send(
            &self,
            channel: &str,
            recipient: &str,
            _payload: &NotificationPayload,
        ) -> Result<()> {
            self.calls
                .lock()
                .push((channel.to_string(), recipient.to_string()));
            if self.failing_channels.contains(channel) {
                return Err(IntelError::ExternalService {
                    service: "notifications".to_string(),
                    details: "channel down".to_string(),
                });
            }
            Ok(())
        }
    }

    struct Harness {
        engine: AlertEngine,
        store: Arc<DocumentStore>,
        dispatcher: Arc<RecordingDispatcher>,
        _dir: tempfile::TempDir,
    }

    fn harness(dispatcher: RecordingDispatcher, max_alerts: u32) -> Harness {
        let (store, dir) = temp_store();
        let store = Arc::new(store);
        let dispatcher = Arc::new(dispatcher);
        let mut config = Config::default().alerts;
        config.max_alerts_per_owner = max_alerts;

        Harness {
            engine: AlertEngine::new(store.clone(), dispatcher.clone(), config),
            store,
            dispatcher,
            _dir: dir,
        }
    }

    fn doctrine_alert() -> NewAlert {
        NewAlert {
            label: "Nueva doctrina fiscal".to_string(),
            alert_type: AlertType::NewRelevantDoctrine,
            severity: None,
            filter_sources: Vec::new(),
            filter_topics: Vec::new(),
            filter_jurisdictions: Vec::new(),
            channels: vec!["in_app".to_string()],
        }
    }

    #[tokio::test]
    async fn test_filters_are_conjunctive() {
        let h = harness(RecordingDispatcher::new(), 0);

        let mut request = doctrine_alert();
        request.filter_sources = vec!["boe".to_string()];
        request.filter_topics = vec!["tax".to_string()];
        let alert = h.engine.create_alert(request, 1).unwrap();

        // Source matches but no topic overlap: rejected.
        let mut no_topics = sample_resolution("BOE-A-2024-10", "boe");
        no_topics.resolution_type = "sentencia".to_string();
        no_topics.topics = vec!["laboral".to_string()];
        h.engine.on_new_document(&no_topics).await;
        assert_eq!(
            h.store.get_alert(&alert.id).unwrap().unwrap().trigger_count,
            0
        );

        // Both dimensions satisfied: accepted.
        let mut both = sample_resolution("BOE-A-2024-11", "boe");
        both.resolution_type = "sentencia".to_string();
        both.topics = vec!["TAX".to_string()];
        h.engine.on_new_document(&both).await;
        assert_eq!(
            h.store.get_alert(&alert.id).unwrap().unwrap().trigger_count,
            1
        );
    }

    #[tokio::test]
    async fn test_topic_filter_rejects_documents_without_topics() {
        let h = harness(RecordingDispatcher::new(), 0);

        let mut request = doctrine_alert();
        request.filter_topics = vec!["iva".to_string()];
        let alert = h.engine.create_alert(request, 1).unwrap();

        let mut no_topics = sample_resolution("STS 30/2024", "cendoj");
        no_topics.topics = Vec::new();
        h.engine.on_new_document(&no_topics).await;

        assert_eq!(
            h.store.get_alert(&alert.id).unwrap().unwrap().trigger_count,
            0
        );
    }

    #[tokio::test]
    async fn test_status_transition_triggers_matching_alerts() {
        let h = harness(RecordingDispatcher::new(), 0);

        let annulled = h
            .engine
            .create_alert(
                NewAlert {
                    label: "Resoluciones anuladas".to_string(),
                    alert_type: AlertType::ResolutionAnnulled,
                    severity: None,
                    filter_sources: Vec::new(),
                    filter_topics: Vec::new(),
                    filter_jurisdictions: Vec::new(),
                    channels: vec!["email".to_string()],
                },
                7,
            )
            .unwrap();

        let mut resolution = sample_resolution("STS 40/2024", "cendoj");

        // Inserting a document never fires a status-only alert type.
        h.engine.on_new_document(&resolution).await;
        assert_eq!(
            h.store.get_alert(&annulled.id).unwrap().unwrap().trigger_count,
            0
        );

        // The vigente -> anulada transition does.
        resolution.status_legal = LegalStatus::Anulada;
        h.engine
            .on_status_change(&resolution, LegalStatus::Vigente, LegalStatus::Anulada)
            .await;

        let updated = h.store.get_alert(&annulled.id).unwrap().unwrap();
        assert_eq!(updated.trigger_count, 1);
        assert!(updated.last_triggered.is_some());
        assert_eq!(
            h.dispatcher.calls.lock().as_slice(),
            &[("email".to_string(), "7".to_string())]
        );
    }

    #[tokio::test]
    async fn test_channel_failure_does_not_block_siblings() {
        let h = harness(RecordingDispatcher::failing_on("email"), 0);

        let alert = h
            .engine
            .create_alert(
                NewAlert {
                    channels: vec![
                        "email".to_string(),
                        "in_app".to_string(),
                        "push".to_string(),
                    ],
                    ..doctrine_alert()
                },
                3,
            )
            .unwrap();

        let mut resolution = sample_resolution("STS 50/2024", "cendoj");
        resolution.resolution_type = "sentencia".to_string();
        h.engine.on_new_document(&resolution).await;

        // All three channels were attempted and the counter still advanced.
        assert_eq!(h.dispatcher.calls.lock().len(), 3);
        assert_eq!(
            h.store.get_alert(&alert.id).unwrap().unwrap().trigger_count,
            1
        );
    }

    #[tokio::test]
    async fn test_inactive_alerts_never_fire() {
        let h = harness(RecordingDispatcher::new(), 0);
        let alert = h.engine.create_alert(doctrine_alert(), 1).unwrap();
        assert!(h.engine.toggle_alert(&alert.id, false, 1).unwrap());

        let mut resolution = sample_resolution("STS 60/2024", "cendoj");
        resolution.resolution_type = "sentencia".to_string();
        h.engine.on_new_document(&resolution).await;

        assert_eq!(
            h.store.get_alert(&alert.id).unwrap().unwrap().trigger_count,
            0
        );
    }

    #[test]
    fn test_creation_ceiling_and_unlimited_plans() {
        let h = harness(RecordingDispatcher::new(), 1);

        h.engine.create_alert(doctrine_alert(), 1).unwrap();
        let err = h.engine.create_alert(doctrine_alert(), 1).unwrap_err();
        assert!(matches!(err, IntelError::AlertLimitReached { max: 1 }));

        // A different owner still has room.
        h.engine.create_alert(doctrine_alert(), 2).unwrap();

        // Ceiling 0 means unlimited.
        let unlimited = harness(RecordingDispatcher::new(), 0);
        for _ in 0..5 {
            unlimited.engine.create_alert(doctrine_alert(), 9).unwrap();
        }
        assert_eq!(unlimited.engine.list_alerts(9).unwrap().len(), 5);
    }

    #[test]
    fn test_ownership_is_enforced_on_toggle_and_delete() {
        let h = harness(RecordingDispatcher::new(), 0);
        let alert = h.engine.create_alert(doctrine_alert(), 1).unwrap();

        assert!(!h.engine.toggle_alert(&alert.id, false, 99).unwrap());
        assert!(!h.engine.delete_alert(&alert.id, 99).unwrap());
        assert!(h.engine.delete_alert(&alert.id, 1).unwrap());
        assert!(h.engine.list_alerts(1).unwrap().is_empty());
    }

    #[test]
    fn test_matches_alert_type_table() {
        // Status-only types reject inserts outright.
        assert!(!AlertEngine::matches_alert_type(
            AlertType::ResolutionAnnulled,
            "cendoj",
            "sentencia",
            None
        ));
        assert!(AlertEngine::matches_alert_type(
            AlertType::ResolutionAnnulled,
            "cendoj",
            "sentencia",
            Some(LegalStatus::Anulada)
        ));

        // LegislationModified fires on matching transitions or on matching
        // resolution types at insert time.
        assert!(AlertEngine::matches_alert_type(
            AlertType::LegislationModified,
            "boe",
            "ley",
            None
        ));
        assert!(AlertEngine::matches_alert_type(
            AlertType::LegislationModified,
            "boe",
            "resolucion",
            Some(LegalStatus::Derogada)
        ));
        assert!(!AlertEngine::matches_alert_type(
            AlertType::LegislationModified,
            "boe",
            "resolucion",
            Some(LegalStatus::Anulada)
        ));

        // Source-triggered types key on the document's source.
        assert!(AlertEngine::matches_alert_type(
            AlertType::CrossBorderCourt,
            "tjue",
            "sentencia_tjue",
            None
        ));
        assert!(!AlertEngine::matches_alert_type(
            AlertType::CrossBorderCourt,
            "cendoj",
            "sentencia",
            None
        ));
    }

    #[test]
    fn test_default_severity_applied_on_creation() {
        let h = harness(RecordingDispatcher::new(), 0);
        let alert = h
            .engine
            .create_alert(
                NewAlert {
                    alert_type: AlertType::ResolutionAnnulled,
                    ..doctrine_alert()
                },
                1,
            )
            .unwrap();
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.channels, vec!["in_app".to_string()]);
    }
}
