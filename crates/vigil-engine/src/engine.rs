//! Engine orchestrator
//!
//! The facade callers hold: `analyze_prompt`, `analyze_response`,
//! `check_host`, plus the synchronous alert/audit query surface. One
//! engine instance is constructed at process start and passed by handle;
//! there is no ambient global state.
//!
//! Ordering guarantee: within one analysis call the full alert set is
//! computed before anything is published to the store, and the audit entry
//! is written in the same critical section. Across calls, store order is
//! completion order.

use crate::analyzer::ContentAnalyzer;
use crate::catalog::PatternCatalog;
use crate::intent::{crosses_threshold, verdict_to_alert, IntentAnalyzer, IntentClassifier};
use crate::store::AlertStore;
use crate::tracker::ConversationTracker;
use std::sync::{Arc, Mutex, RwLock};
use vigil_core::{
    AlertSource, AlertType, AuditEntry, ConversationThreatState, EngineConfig, EngineCounters,
    SecurityAlert, StatePersistence, ThreatAnalysis, ThreatLevel,
};
use vigil_host::{CommandRunner, HostAuditor, HostSecurityReport};

/// Queries longer than this are rejected at the boundary and never reach
/// the detection core.
const MAX_CONTENT_LEN: usize = 100_000;

/// Threat detection and escalation engine
pub struct ThreatEngine {
    config: RwLock<EngineConfig>,
    analyzer: ContentAnalyzer,
    intent: IntentAnalyzer,
    tracker: ConversationTracker,
    store: Mutex<AlertStore>,
    auditor: HostAuditor,
    persistence: Arc<dyn StatePersistence>,
    counters: Mutex<EngineCounters>,
}

impl ThreatEngine {
    /// Construct the engine and hydrate prior state best-effort. A failed
    /// load degrades to empty state, it never fails construction.
    pub async fn new(
        config: EngineConfig,
        classifier: Option<Arc<dyn IntentClassifier>>,
        runner: Arc<dyn CommandRunner>,
        persistence: Arc<dyn StatePersistence>,
    ) -> Self {
        let mut store = AlertStore::new(config.max_audit_entries);

        let alerts = persistence.load_alerts().await.unwrap_or_else(|e| {
            tracing::warn!("failed to load alerts: {e}");
            Vec::new()
        });
        let audit = persistence.load_audit_log().await.unwrap_or_else(|e| {
            tracing::warn!("failed to load audit log: {e}");
            Vec::new()
        });
        store.hydrate(alerts, audit);

        let counters = persistence.load_counters().await.unwrap_or_else(|e| {
            tracing::warn!("failed to load counters: {e}");
            EngineCounters::default()
        });

        Self {
            config: RwLock::new(config),
            analyzer: ContentAnalyzer::new(Arc::new(PatternCatalog::compile())),
            intent: IntentAnalyzer::new(classifier),
            tracker: ConversationTracker::new(),
            store: Mutex::new(store),
            auditor: HostAuditor::new(runner),
            persistence,
            counters: Mutex::new(counters),
        }
    }

    /// Analyze an inbound user message. Always returns a value; collaborator
    /// failures degrade to pattern-only results.
    pub async fn analyze_prompt(
        &self,
        conversation_id: &str,
        content: &str,
        context: &[String],
    ) -> ThreatAnalysis {
        let config = self.config.read().unwrap().clone();
        if !config.enabled {
            return ThreatAnalysis::clean(content);
        }
        if let Some(rejected) = self.reject_at_boundary(conversation_id, content) {
            return rejected;
        }

        // Deterministic pattern sweep first; never skipped.
        let mut analysis = self.analyzer.analyze_prompt(content);

        // Probabilistic fusion on top. A conversation with attack history
        // is judged more strictly.
        if config.use_ai_analysis && self.intent.is_available() {
            let multiplier = self.tracker.scrutiny_multiplier(conversation_id);
            let under_scrutiny = self.tracker.under_scrutiny(conversation_id);

            let mut classifier_context = Vec::new();
            if let Some(notice) = self.tracker.security_context(conversation_id) {
                classifier_context.push(notice);
            }
            classifier_context.extend_from_slice(context);

            if let Some(verdict) = self
                .intent
                .analyze(content, &classifier_context, multiplier)
                .await
            {
                if crosses_threshold(&verdict, under_scrutiny) {
                    let alert = verdict_to_alert(&verdict, under_scrutiny);
                    analysis.confidence = analysis.confidence.max(verdict.confidence).min(1.0);
                    analysis.alerts.push(alert);
                    analysis.threat_level = ThreatLevel::aggregate(&analysis.alerts);
                    analysis.is_clean = false;
                }
            }
        }

        // Escalate the conversation before publication so the next call in
        // this conversation already sees the history.
        let was_blocked = config.auto_block_critical && analysis.requires_blocking();
        for alert in &analysis.alerts {
            if alert.severity > ThreatLevel::Normal {
                self.tracker
                    .record_attack_attempt(conversation_id, alert, was_blocked);
            }
        }

        self.publish(
            &analysis,
            &config,
            AuditEntry::new(
                "promptAnalyzed",
                format!("Prompt analysis produced {} alert(s)", analysis.alerts.len()),
                analysis.threat_level,
            )
            .conversation(conversation_id)
            .meta("confidence", format!("{:.2}", analysis.confidence))
            .meta("blocked", was_blocked.to_string()),
        );
        self.bump_counters(&analysis, was_blocked);
        self.save_state().await;

        analysis
    }

    /// Analyze an outbound model response. Pattern-only: the intent
    /// classifier judges user behavior, not model output.
    pub async fn analyze_response(&self, conversation_id: &str, content: &str) -> ThreatAnalysis {
        let config = self.config.read().unwrap().clone();
        if !config.enabled {
            return ThreatAnalysis::clean(content);
        }
        if let Some(rejected) = self.reject_at_boundary(conversation_id, content) {
            return rejected;
        }

        let analysis = self.analyzer.analyze_response(content);

        self.publish(
            &analysis,
            &config,
            AuditEntry::new(
                "responseAnalyzed",
                format!(
                    "Response analysis produced {} alert(s)",
                    analysis.alerts.len()
                ),
                analysis.threat_level,
            )
            .conversation(conversation_id)
            .meta("confidence", format!("{:.2}", analysis.confidence)),
        );
        self.bump_counters(&analysis, false);
        self.save_state().await;

        analysis
    }

    /// Run the host security audit. Suspicious findings surface as alerts;
    /// the report itself is immutable and superseded by the next cycle.
    pub async fn check_host(&self) -> HostSecurityReport {
        let config = self.config.read().unwrap().clone();
        let report = self.auditor.audit().await;

        let mut alerts = Vec::new();
        for name in &report.suspicious_processes {
            alerts.push(host_alert(
                AlertType::SuspiciousProcess,
                ThreatLevel::High,
                format!("Suspicious process running: {name}"),
                AlertSource::HostSystem,
            ));
        }
        for port in &report.suspicious_open_ports {
            alerts.push(host_alert(
                AlertType::SuspiciousPort,
                ThreatLevel::High,
                format!("Known backdoor port listening: {port}"),
                AlertSource::HostSystem,
            ));
        }
        for item in &report.suspicious_login_items {
            alerts.push(host_alert(
                AlertType::SuspiciousLoginItem,
                ThreatLevel::High,
                format!("Suspicious login item: {item}"),
                AlertSource::HostSystem,
            ));
        }
        for conn in &report.suspicious_connections {
            alerts.push(host_alert(
                AlertType::SuspiciousConnection,
                ThreatLevel::High,
                format!("Suspicious connection to {conn}"),
                AlertSource::NetworkActivity,
            ));
        }
        for kext in &report.suspicious_kernel_extensions {
            alerts.push(host_alert(
                AlertType::SuspiciousKernelExtension,
                ThreatLevel::Critical,
                format!("Unrecognized kernel extension: {kext}"),
                AlertSource::HostSystem,
            ));
        }

        {
            let mut store = self.store.lock().unwrap();
            store.insert_alerts(alerts);
            if !(config.log_threats_only
                && report.overall_threat_level == ThreatLevel::Normal)
            {
                store.record_audit(
                    AuditEntry::new(
                        "hostAuditCompleted",
                        format!(
                            "Host audit completed: {}",
                            report.overall_threat_level.name()
                        ),
                        report.overall_threat_level,
                    )
                    .meta(
                        "recommendations",
                        report.recommendations.len().to_string(),
                    ),
                );
            }
        }
        self.save_state().await;

        report
    }

    // ── Query surface ───────────────────────────────────────────────────

    /// Max severity among unacknowledged alerts.
    pub fn current_threat_level(&self) -> ThreatLevel {
        self.store.lock().unwrap().current_threat_level()
    }

    /// Unacknowledged alerts, newest first.
    pub fn active_alerts(&self) -> Vec<SecurityAlert> {
        self.store.lock().unwrap().active_alerts()
    }

    /// Full alert log, newest first.
    pub fn all_alerts(&self) -> Vec<SecurityAlert> {
        self.store.lock().unwrap().alerts().to_vec()
    }

    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.store.lock().unwrap().audit_log().to_vec()
    }

    pub fn conversation_state(&self, conversation_id: &str) -> Option<ConversationThreatState> {
        self.tracker.state(conversation_id)
    }

    pub fn stats(&self) -> EngineCounters {
        *self.counters.lock().unwrap()
    }

    pub fn config(&self) -> EngineConfig {
        self.config.read().unwrap().clone()
    }

    // ── Mutations ───────────────────────────────────────────────────────

    pub fn acknowledge_alert(&self, alert_id: &str) {
        self.store.lock().unwrap().acknowledge(alert_id);
    }

    pub fn mark_mitigated(&self, alert_id: &str) {
        self.store.lock().unwrap().mark_mitigated(alert_id);
    }

    pub fn clear_alert(&self, alert_id: &str) {
        self.store.lock().unwrap().clear_alert(alert_id);
    }

    pub fn clear_alerts(&self) {
        self.store.lock().unwrap().clear_alerts();
    }

    /// Drop all escalation state for a finished conversation.
    pub fn clear_conversation(&self, conversation_id: &str) {
        self.tracker.clear_state(conversation_id);
    }

    /// Swap the configuration. The audit cap applies immediately.
    pub fn update_config(&self, config: EngineConfig) {
        self.store
            .lock()
            .unwrap()
            .set_max_audit_entries(config.max_audit_entries);
        *self.config.write().unwrap() = config;
    }

    /// Export the audit log as a JSON array. The export itself is audited.
    pub async fn export_audit_log(&self) -> String {
        let exported = self.store.lock().unwrap().export_audit_log();
        self.save_state().await;
        exported
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Input errors are handled at the boundary: empty input is trivially
    /// clean, oversized input is rejected without reaching the matcher.
    fn reject_at_boundary(&self, conversation_id: &str, content: &str) -> Option<ThreatAnalysis> {
        if content.trim().is_empty() {
            return Some(ThreatAnalysis::clean(content));
        }
        if content.len() > MAX_CONTENT_LEN {
            let mut analysis = ThreatAnalysis::clean("");
            analysis
                .recommendations
                .push("Input exceeds the maximum supported length; analysis skipped.".to_string());
            self.store.lock().unwrap().record_audit(
                AuditEntry::new(
                    "inputRejected",
                    format!("Oversized input rejected ({} bytes)", content.len()),
                    ThreatLevel::Normal,
                )
                .conversation(conversation_id),
            );
            return Some(analysis);
        }
        None
    }

    /// Publish one call's results atomically: the full alert batch and its
    /// audit entry go in under a single lock.
    fn publish(&self, analysis: &ThreatAnalysis, config: &EngineConfig, entry: AuditEntry) {
        let mut store = self.store.lock().unwrap();
        store.insert_alerts(analysis.alerts.clone());
        if !(config.log_threats_only && analysis.is_clean) {
            store.record_audit(entry);
        }
    }

    fn bump_counters(&self, analysis: &ThreatAnalysis, was_blocked: bool) {
        let mut counters = self.counters.lock().unwrap();
        counters.analyses_run += 1;
        counters.threats_detected += analysis.alerts.len() as u64;
        if was_blocked {
            counters.attempts_blocked += 1;
        }
    }

    /// Best-effort persistence; failures are logged, never propagated.
    async fn save_state(&self) {
        let (alerts, audit) = {
            let store = self.store.lock().unwrap();
            (store.alerts().to_vec(), store.audit_log().to_vec())
        };
        let counters = *self.counters.lock().unwrap();

        if let Err(e) = self.persistence.save_alerts(&alerts).await {
            tracing::warn!("failed to save alerts: {e}");
        }
        if let Err(e) = self.persistence.save_audit_log(&audit).await {
            tracing::warn!("failed to save audit log: {e}");
        }
        if let Err(e) = self.persistence.save_counters(&counters).await {
            tracing::warn!("failed to save counters: {e}");
        }
    }
}

fn host_alert(
    alert_type: AlertType,
    severity: ThreatLevel,
    message: String,
    source: AlertSource,
) -> SecurityAlert {
    let affected = message.clone();
    SecurityAlert::new(alert_type, severity, message, source).affected(affected)
}
