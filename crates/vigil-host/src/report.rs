//! Host security report
//!
//! Immutable snapshot of one audit cycle. Aggregation takes the max threat
//! level over the individual findings; each finding also contributes a
//! recommendation string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_core::ThreatLevel;

/// Snapshot of host security posture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSecurityReport {
    pub timestamp: DateTime<Utc>,
    pub firewall_enabled: bool,
    pub disk_encrypted: bool,
    pub gatekeeper_enabled: bool,
    pub system_integrity_protection: bool,
    pub xprotect_version: Option<String>,
    /// None on hardware without secure boot support
    pub secure_boot_enabled: Option<bool>,
    pub remote_login_enabled: bool,
    pub software_updates_pending: u32,
    pub suspicious_processes: Vec<String>,
    pub suspicious_open_ports: Vec<String>,
    pub suspicious_login_items: Vec<String>,
    pub suspicious_connections: Vec<String>,
    pub suspicious_kernel_extensions: Vec<String>,
    pub overall_threat_level: ThreatLevel,
    pub recommendations: Vec<String>,
}

impl HostSecurityReport {
    /// Compute the aggregate threat level and recommendations from the raw
    /// findings, then freeze the report.
    pub fn finalize(mut self) -> Self {
        let mut level = ThreatLevel::Normal;
        let mut recs = Vec::new();

        if !self.firewall_enabled {
            level = level.max(ThreatLevel::Elevated);
            recs.push("Enable the application firewall.".to_string());
        }
        if !self.disk_encrypted {
            level = level.max(ThreatLevel::High);
            recs.push("Enable FileVault full-disk encryption.".to_string());
        }
        if !self.gatekeeper_enabled {
            level = level.max(ThreatLevel::Elevated);
            recs.push("Re-enable Gatekeeper application assessments.".to_string());
        }
        if !self.system_integrity_protection {
            level = level.max(ThreatLevel::Critical);
            recs.push(
                "System Integrity Protection is disabled. Re-enable SIP from recovery mode."
                    .to_string(),
            );
        }
        if self.secure_boot_enabled == Some(false) {
            level = level.max(ThreatLevel::Elevated);
            recs.push("Secure boot is running at reduced security.".to_string());
        }
        if self.remote_login_enabled {
            level = level.max(ThreatLevel::Elevated);
            recs.push("Remote login (SSH) is enabled; disable it if unused.".to_string());
        }
        if self.software_updates_pending > 0 {
            level = level.max(ThreatLevel::Elevated);
            recs.push(format!(
                "{} software update(s) pending; install them.",
                self.software_updates_pending
            ));
        }
        if !self.suspicious_processes.is_empty() {
            level = level.max(ThreatLevel::High);
            recs.push(format!(
                "Suspicious processes running: {}",
                self.suspicious_processes.join(", ")
            ));
        }
        if !self.suspicious_open_ports.is_empty() {
            level = level.max(ThreatLevel::High);
            recs.push(format!(
                "Known backdoor ports listening: {}",
                self.suspicious_open_ports.join(", ")
            ));
        }
        if !self.suspicious_login_items.is_empty() {
            level = level.max(ThreatLevel::High);
            recs.push(format!(
                "Suspicious login items: {}",
                self.suspicious_login_items.join(", ")
            ));
        }
        if !self.suspicious_connections.is_empty() {
            level = level.max(ThreatLevel::High);
            recs.push(format!(
                "Suspicious network connections: {}",
                self.suspicious_connections.join(", ")
            ));
        }
        if !self.suspicious_kernel_extensions.is_empty() {
            level = level.max(ThreatLevel::Critical);
            recs.push(format!(
                "Unrecognized kernel extensions loaded: {}",
                self.suspicious_kernel_extensions.join(", ")
            ));
        }

        self.overall_threat_level = level;
        self.recommendations = recs;
        self
    }

    /// Most conservative possible snapshot, used when every collaborator
    /// call failed. Everything reads as off/unknown/empty.
    pub fn degraded() -> Self {
        Self {
            timestamp: Utc::now(),
            firewall_enabled: false,
            disk_encrypted: false,
            gatekeeper_enabled: false,
            system_integrity_protection: false,
            xprotect_version: None,
            secure_boot_enabled: None,
            remote_login_enabled: false,
            software_updates_pending: 0,
            suspicious_processes: Vec::new(),
            suspicious_open_ports: Vec::new(),
            suspicious_login_items: Vec::new(),
            suspicious_connections: Vec::new(),
            suspicious_kernel_extensions: Vec::new(),
            overall_threat_level: ThreatLevel::Normal,
            recommendations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> HostSecurityReport {
        HostSecurityReport {
            firewall_enabled: true,
            disk_encrypted: true,
            gatekeeper_enabled: true,
            system_integrity_protection: true,
            xprotect_version: Some("5287".to_string()),
            secure_boot_enabled: Some(true),
            ..HostSecurityReport::degraded()
        }
    }

    #[test]
    fn test_healthy_host_is_normal() {
        let report = healthy().finalize();
        assert_eq!(report.overall_threat_level, ThreatLevel::Normal);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_sip_disabled_is_critical() {
        let mut report = healthy();
        report.system_integrity_protection = false;
        let report = report.finalize();
        assert_eq!(report.overall_threat_level, ThreatLevel::Critical);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("System Integrity Protection")));
    }

    #[test]
    fn test_kernel_extension_is_critical() {
        let mut report = healthy();
        report.suspicious_kernel_extensions = vec!["com.evil.rootkit".to_string()];
        let report = report.finalize();
        assert_eq!(report.overall_threat_level, ThreatLevel::Critical);
    }

    #[test]
    fn test_unencrypted_disk_is_high() {
        let mut report = healthy();
        report.disk_encrypted = false;
        let report = report.finalize();
        assert_eq!(report.overall_threat_level, ThreatLevel::High);
    }

    #[test]
    fn test_pending_updates_is_elevated() {
        let mut report = healthy();
        report.software_updates_pending = 3;
        let report = report.finalize();
        assert_eq!(report.overall_threat_level, ThreatLevel::Elevated);
        assert!(report.recommendations.iter().any(|r| r.contains("3")));
    }
}
