//! Alert & audit store
//!
//! Bounded, newest-first logs of alerts and audit entries. Acknowledgement
//! and clearing are idempotent; the audit cap is enforced on every insert
//! by dropping the oldest entries. Exporting the audit log is itself an
//! audited event.

use vigil_core::{AuditEntry, SecurityAlert, ThreatLevel};

/// In-memory alert and audit log
pub struct AlertStore {
    alerts: Vec<SecurityAlert>,
    audit: Vec<AuditEntry>,
    max_audit_entries: usize,
}

impl AlertStore {
    pub fn new(max_audit_entries: usize) -> Self {
        Self {
            alerts: Vec::new(),
            audit: Vec::new(),
            max_audit_entries,
        }
    }

    /// Restore persisted state, re-applying the audit cap in case the
    /// configured maximum shrank between runs.
    pub fn hydrate(&mut self, alerts: Vec<SecurityAlert>, audit: Vec<AuditEntry>) {
        self.alerts = alerts;
        self.audit = audit;
        self.audit.truncate(self.max_audit_entries);
    }

    pub fn set_max_audit_entries(&mut self, max: usize) {
        self.max_audit_entries = max;
        self.audit.truncate(max);
    }

    /// Insert one analysis call's full alert set at the front, preserving
    /// the in-call order. Partial sets are never inserted.
    pub fn insert_alerts(&mut self, batch: Vec<SecurityAlert>) {
        self.alerts.splice(0..0, batch);
    }

    pub fn alerts(&self) -> &[SecurityAlert] {
        &self.alerts
    }

    /// Unacknowledged alerts, newest first.
    pub fn active_alerts(&self) -> Vec<SecurityAlert> {
        self.alerts
            .iter()
            .filter(|a| !a.is_acknowledged)
            .cloned()
            .collect()
    }

    /// Max severity among unacknowledged alerts.
    pub fn current_threat_level(&self) -> ThreatLevel {
        self.alerts
            .iter()
            .filter(|a| !a.is_acknowledged)
            .map(|a| a.severity)
            .max()
            .unwrap_or(ThreatLevel::Normal)
    }

    /// Idempotent: acknowledging an unknown or acknowledged id is a no-op.
    pub fn acknowledge(&mut self, alert_id: &str) {
        if let Some(alert) = self.alerts.iter_mut().find(|a| a.id == alert_id) {
            alert.acknowledge();
        }
    }

    /// Idempotent, same as acknowledge.
    pub fn mark_mitigated(&mut self, alert_id: &str) {
        if let Some(alert) = self.alerts.iter_mut().find(|a| a.id == alert_id) {
            alert.mark_mitigated();
        }
    }

    /// Idempotent: clearing an unknown id is a no-op, not an error.
    pub fn clear_alert(&mut self, alert_id: &str) {
        self.alerts.retain(|a| a.id != alert_id);
    }

    pub fn clear_alerts(&mut self) {
        self.alerts.clear();
    }

    /// Append an audit entry, newest first, enforcing the hard cap.
    pub fn record_audit(&mut self, entry: AuditEntry) {
        self.audit.insert(0, entry);
        self.audit.truncate(self.max_audit_entries);
    }

    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit
    }

    /// Serialize the full audit log as a JSON array, newest first, with
    /// ISO-8601 timestamps. The export itself is recorded afterwards, so a
    /// second export sees one extra `exportRequested` entry.
    pub fn export_audit_log(&mut self) -> String {
        let serialized = serde_json::to_string_pretty(&self.audit)
            .unwrap_or_else(|_| "[]".to_string());
        self.record_audit(
            AuditEntry::new(
                "exportRequested",
                format!("Audit log exported ({} entries)", self.audit.len()),
                ThreatLevel::Normal,
            )
            .meta("entries", self.audit.len().to_string()),
        );
        serialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{AlertSource, AlertType};

    fn alert(severity: ThreatLevel) -> SecurityAlert {
        SecurityAlert::new(
            AlertType::PromptInjection,
            severity,
            "test",
            AlertSource::UserPrompt,
        )
    }

    fn entry(n: usize) -> AuditEntry {
        AuditEntry::new("threatDetected", format!("entry {n}"), ThreatLevel::Normal)
    }

    #[test]
    fn test_alerts_are_newest_first() {
        let mut store = AlertStore::new(100);
        let first = alert(ThreatLevel::Elevated);
        let second = alert(ThreatLevel::High);
        let first_id = first.id.clone();
        store.insert_alerts(vec![first]);
        store.insert_alerts(vec![second]);
        assert_eq!(store.alerts()[1].id, first_id);
    }

    #[test]
    fn test_batch_insert_preserves_call_order() {
        let mut store = AlertStore::new(100);
        let a = alert(ThreatLevel::Elevated);
        let b = alert(ThreatLevel::High);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        store.insert_alerts(vec![a, b]);
        assert_eq!(store.alerts()[0].id, a_id);
        assert_eq!(store.alerts()[1].id, b_id);
    }

    #[test]
    fn test_acknowledge_is_idempotent() {
        let mut store = AlertStore::new(100);
        let a = alert(ThreatLevel::High);
        let id = a.id.clone();
        store.insert_alerts(vec![a]);

        store.acknowledge(&id);
        store.acknowledge(&id);
        store.acknowledge("no-such-id");
        assert!(store.alerts()[0].is_acknowledged);
        assert!(store.active_alerts().is_empty());
        assert_eq!(store.current_threat_level(), ThreatLevel::Normal);
    }

    #[test]
    fn test_clear_unknown_id_is_noop() {
        let mut store = AlertStore::new(100);
        store.insert_alerts(vec![alert(ThreatLevel::High)]);
        store.clear_alert("no-such-id");
        assert_eq!(store.alerts().len(), 1);
    }

    #[test]
    fn test_audit_cap_enforced_on_every_insert() {
        let mut store = AlertStore::new(5);
        for i in 0..20 {
            store.record_audit(entry(i));
            assert!(store.audit_log().len() <= 5);
        }
        // Retained entries are the most recent five, newest first.
        assert_eq!(store.audit_log()[0].description, "entry 19");
        assert_eq!(store.audit_log()[4].description, "entry 15");
    }

    #[test]
    fn test_export_is_audited() {
        let mut store = AlertStore::new(100);
        store.record_audit(entry(1));

        let first = store.export_audit_log();
        let second = store.export_audit_log();

        let exports: Vec<_> = store
            .audit_log()
            .iter()
            .filter(|e| e.event_type == "exportRequested")
            .collect();
        assert_eq!(exports.len(), 2);
        assert_ne!(exports[0].id, exports[1].id);

        // The underlying non-export content is identical across exports.
        let non_export = |raw: &str| -> Vec<String> {
            let entries: Vec<AuditEntry> = serde_json::from_str(raw).unwrap();
            entries
                .into_iter()
                .filter(|e| e.event_type != "exportRequested")
                .map(|e| e.id)
                .collect()
        };
        assert_eq!(non_export(&first), non_export(&second));
    }

    #[test]
    fn test_export_timestamps_are_iso8601() {
        let mut store = AlertStore::new(100);
        store.record_audit(entry(1));
        let raw = store.export_audit_log();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let ts = parsed[0]["timestamp"].as_str().unwrap();
        assert!(ts.contains('T'));
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_hydrate_reapplies_cap() {
        let mut store = AlertStore::new(3);
        store.hydrate(Vec::new(), (0..10).map(entry).collect());
        assert_eq!(store.audit_log().len(), 3);
    }
}
