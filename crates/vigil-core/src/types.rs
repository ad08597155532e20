//! Threat taxonomy and alert data model
//!
//! Everything here is plain data shared by the analyzer, the intent
//! classifier, the conversation tracker, and the host auditor. Alerts are
//! immutable after construction except for the acknowledgement and
//! mitigation flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Threat severity levels, totally ordered
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum ThreatLevel {
    /// No threat detected
    #[default]
    Normal,
    /// Worth watching
    Elevated,
    /// High risk
    High,
    /// Critical - immediate action required
    Critical,
}

impl ThreatLevel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Elevated => "ELEVATED",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Max-reduction over a set of alerts. Empty input aggregates to `Normal`.
    pub fn aggregate(alerts: &[SecurityAlert]) -> Self {
        alerts
            .iter()
            .map(|a| a.severity)
            .max()
            .unwrap_or(ThreatLevel::Normal)
    }
}

/// Attack categories grouping the alert taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackCategory {
    PromptManipulation,
    Jailbreaking,
    IdentityManipulation,
    DataTheft,
    MaliciousOutput,
    SocialEngineering,
    EvasionTechniques,
    MultiTurnAttacks,
    Infrastructure,
}

impl AttackCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PromptManipulation => "Prompt Manipulation",
            Self::Jailbreaking => "Jailbreaking",
            Self::IdentityManipulation => "Identity Manipulation",
            Self::DataTheft => "Data Theft",
            Self::MaliciousOutput => "Malicious Output",
            Self::SocialEngineering => "Social Engineering",
            Self::EvasionTechniques => "Evasion Techniques",
            Self::MultiTurnAttacks => "Multi-turn Attacks",
            Self::Infrastructure => "Infrastructure",
        }
    }
}

/// Closed alert taxonomy. Every variant belongs to exactly one category,
/// enforced by the exhaustive match in [`AlertType::category`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    // Prompt manipulation
    PromptInjection,
    InstructionOverride,
    ContextManipulation,
    // Jailbreaking
    JailbreakAttempt,
    DanMode,
    DeveloperMode,
    HypotheticalBypass,
    // Identity manipulation
    PersonaHijack,
    RoleplayCoercion,
    AuthorityImpersonation,
    // Data theft
    DataExfiltration,
    SystemPromptLeak,
    CompletionAttack,
    TrainingDataProbe,
    CredentialPhishing,
    // Malicious output
    MaliciousCode,
    CredentialLeak,
    CompromisedResponse,
    SuspiciousUrl,
    // Social engineering
    UrgencyPressure,
    TrustExploitation,
    Manipulation,
    // Evasion techniques
    ObfuscatedPayload,
    EncodedContent,
    TokenSmuggling,
    // Multi-turn attacks
    EscalatingRequests,
    ContextPoisoning,
    PayloadSplitting,
    // Infrastructure
    SuspiciousProcess,
    SuspiciousPort,
    SuspiciousLoginItem,
    SuspiciousConnection,
    SuspiciousKernelExtension,
    AnomalousActivity,
}

impl AlertType {
    /// Total mapping from alert type to its category.
    pub fn category(&self) -> AttackCategory {
        match self {
            Self::PromptInjection | Self::InstructionOverride | Self::ContextManipulation => {
                AttackCategory::PromptManipulation
            }
            Self::JailbreakAttempt
            | Self::DanMode
            | Self::DeveloperMode
            | Self::HypotheticalBypass => AttackCategory::Jailbreaking,
            Self::PersonaHijack | Self::RoleplayCoercion | Self::AuthorityImpersonation => {
                AttackCategory::IdentityManipulation
            }
            Self::DataExfiltration
            | Self::SystemPromptLeak
            | Self::CompletionAttack
            | Self::TrainingDataProbe
            | Self::CredentialPhishing => AttackCategory::DataTheft,
            Self::MaliciousCode
            | Self::CredentialLeak
            | Self::CompromisedResponse
            | Self::SuspiciousUrl => AttackCategory::MaliciousOutput,
            Self::UrgencyPressure | Self::TrustExploitation | Self::Manipulation => {
                AttackCategory::SocialEngineering
            }
            Self::ObfuscatedPayload | Self::EncodedContent | Self::TokenSmuggling => {
                AttackCategory::EvasionTechniques
            }
            Self::EscalatingRequests | Self::ContextPoisoning | Self::PayloadSplitting => {
                AttackCategory::MultiTurnAttacks
            }
            Self::SuspiciousProcess
            | Self::SuspiciousPort
            | Self::SuspiciousLoginItem
            | Self::SuspiciousConnection
            | Self::SuspiciousKernelExtension
            | Self::AnomalousActivity => AttackCategory::Infrastructure,
        }
    }
}

/// Where an alert originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSource {
    UserPrompt,
    ModelResponse,
    HostSystem,
    NetworkActivity,
    ToolExecution,
}

/// A single detected threat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityAlert {
    /// Alert ID
    pub id: String,
    /// Taxonomy classification
    pub alert_type: AlertType,
    /// Severity
    pub severity: ThreatLevel,
    /// Human-readable description
    pub message: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Origin of the analyzed content
    pub source: AlertSource,
    /// Names of catalog patterns that fired
    pub matched_patterns: Vec<String>,
    /// Excerpt of the offending content, or "[REDACTED]"
    pub affected_content: String,
    /// Set once an operator acknowledges the alert
    pub is_acknowledged: bool,
    /// Set once a mitigation has been applied
    pub mitigation_applied: bool,
}

impl SecurityAlert {
    pub fn new(
        alert_type: AlertType,
        severity: ThreatLevel,
        message: impl Into<String>,
        source: AlertSource,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            alert_type,
            severity,
            message: message.into(),
            timestamp: Utc::now(),
            source,
            matched_patterns: Vec::new(),
            affected_content: String::new(),
            is_acknowledged: false,
            mitigation_applied: false,
        }
    }

    pub fn matched_pattern(mut self, name: impl Into<String>) -> Self {
        self.matched_patterns.push(name.into());
        self
    }

    pub fn affected(mut self, content: impl Into<String>) -> Self {
        self.affected_content = content.into();
        self
    }

    pub fn acknowledge(&mut self) {
        self.is_acknowledged = true;
    }

    pub fn mark_mitigated(&mut self) {
        self.mitigation_applied = true;
    }
}

/// Result of one prompt or response analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatAnalysis {
    /// True when no alerts fired
    pub is_clean: bool,
    /// Max severity across alerts
    pub threat_level: ThreatLevel,
    /// Alerts produced by this call
    pub alerts: Vec<SecurityAlert>,
    /// Confidence in the verdict, always within [0, 1]
    pub confidence: f64,
    /// Content with matched spans filtered out
    pub sanitized_content: String,
    /// Operator-facing recommendations
    pub recommendations: Vec<String>,
}

impl ThreatAnalysis {
    /// A clean result that never reached the detection core.
    pub fn clean(content: &str) -> Self {
        Self {
            is_clean: true,
            threat_level: ThreatLevel::Normal,
            alerts: Vec::new(),
            confidence: 0.0,
            sanitized_content: content.to_string(),
            recommendations: Vec::new(),
        }
    }

    /// Hard block: critical threat with strong confidence.
    pub fn requires_blocking(&self) -> bool {
        self.threat_level == ThreatLevel::Critical && self.confidence > 0.8
    }

    /// Ask the user before proceeding.
    pub fn requires_user_confirmation(&self) -> bool {
        (self.threat_level == ThreatLevel::High && self.confidence > 0.7)
            || (self.threat_level == ThreatLevel::Critical && self.confidence <= 0.8)
    }
}

/// Per-conversation attack history.
///
/// Invariant: `threat_escalation_level == attack_attempts.len()` after every
/// update, maintained by [`ConversationThreatState::record`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationThreatState {
    pub attack_attempts: Vec<SecurityAlert>,
    pub blocked_attempts: u32,
    pub threat_escalation_level: u32,
    pub last_attack_time: Option<DateTime<Utc>>,
    pub suspicious_patterns: HashSet<String>,
}

impl ConversationThreatState {
    /// Record one attack attempt. Escalation never decreases.
    pub fn record(&mut self, alert: &SecurityAlert, was_blocked: bool) {
        self.attack_attempts.push(alert.clone());
        self.threat_escalation_level = self.attack_attempts.len() as u32;
        if was_blocked {
            self.blocked_attempts += 1;
        }
        self.last_attack_time = Some(alert.timestamp);
        for name in &alert.matched_patterns {
            self.suspicious_patterns.insert(name.clone());
        }
    }

    /// Escalation factor consumed by the AI intent analyzer. Monotonically
    /// non-decreasing as history grows; exactly 1.0 with no history.
    pub fn scrutiny_multiplier(&self) -> f64 {
        1.0 + 0.3 * self.blocked_attempts as f64 + 0.1 * self.attack_attempts.len() as f64
    }

    /// A conversation enters scrutiny after its first blocked attempt.
    pub fn under_scrutiny(&self) -> bool {
        self.blocked_attempts > 0
    }
}

/// Append-only audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub severity: ThreatLevel,
    pub metadata: BTreeMap<String, String>,
}

impl AuditEntry {
    pub fn new(
        event_type: impl Into<String>,
        description: impl Into<String>,
        severity: ThreatLevel,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.into(),
            description: description.into(),
            conversation_id: None,
            message_id: None,
            severity,
            metadata: BTreeMap::new(),
        }
    }

    pub fn conversation(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn message(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threat_level_ordering() {
        assert!(ThreatLevel::Normal < ThreatLevel::Elevated);
        assert!(ThreatLevel::Elevated < ThreatLevel::High);
        assert!(ThreatLevel::High < ThreatLevel::Critical);
    }

    #[test]
    fn test_aggregate_empty_is_normal() {
        assert_eq!(ThreatLevel::aggregate(&[]), ThreatLevel::Normal);
    }

    #[test]
    fn test_aggregate_is_max() {
        let alerts = vec![
            SecurityAlert::new(
                AlertType::PromptInjection,
                ThreatLevel::Elevated,
                "a",
                AlertSource::UserPrompt,
            ),
            SecurityAlert::new(
                AlertType::DanMode,
                ThreatLevel::Critical,
                "b",
                AlertSource::UserPrompt,
            ),
            SecurityAlert::new(
                AlertType::SuspiciousUrl,
                ThreatLevel::High,
                "c",
                AlertSource::ModelResponse,
            ),
        ];
        assert_eq!(ThreatLevel::aggregate(&alerts), ThreatLevel::Critical);
    }

    #[test]
    fn test_scrutiny_multiplier_baseline() {
        let state = ConversationThreatState::default();
        assert_eq!(state.scrutiny_multiplier(), 1.0);
        assert!(!state.under_scrutiny());
    }

    #[test]
    fn test_scrutiny_multiplier_monotone() {
        let mut state = ConversationThreatState::default();
        let alert = SecurityAlert::new(
            AlertType::JailbreakAttempt,
            ThreatLevel::High,
            "jailbreak",
            AlertSource::UserPrompt,
        );
        let mut last = state.scrutiny_multiplier();
        for i in 0..10 {
            state.record(&alert, i % 2 == 0);
            let next = state.scrutiny_multiplier();
            assert!(next >= last);
            last = next;
        }
        assert_eq!(state.threat_escalation_level, 10);
    }

    #[test]
    fn test_two_blocked_attempts_multiplier() {
        let mut state = ConversationThreatState::default();
        let alert = SecurityAlert::new(
            AlertType::PromptInjection,
            ThreatLevel::High,
            "injection",
            AlertSource::UserPrompt,
        );
        state.record(&alert, true);
        state.record(&alert, true);
        // 1.0 + 0.3*2 + 0.1*2
        assert!((state.scrutiny_multiplier() - 1.8).abs() < f64::EPSILON);
        assert!(state.under_scrutiny());
    }

    #[test]
    fn test_blocking_thresholds() {
        let mut analysis = ThreatAnalysis::clean("hello");
        analysis.is_clean = false;
        analysis.threat_level = ThreatLevel::Critical;
        analysis.confidence = 0.9;
        assert!(analysis.requires_blocking());
        assert!(!analysis.requires_user_confirmation());

        analysis.confidence = 0.8;
        assert!(!analysis.requires_blocking());
        assert!(analysis.requires_user_confirmation());

        analysis.threat_level = ThreatLevel::High;
        analysis.confidence = 0.75;
        assert!(analysis.requires_user_confirmation());
    }

    #[test]
    fn test_category_total_mapping() {
        // Spot-check the taxonomy; the exhaustive match keeps it total.
        assert_eq!(
            AlertType::DanMode.category(),
            AttackCategory::Jailbreaking
        );
        assert_eq!(
            AlertType::CompletionAttack.category(),
            AttackCategory::DataTheft
        );
        assert_eq!(
            AlertType::SuspiciousKernelExtension.category(),
            AttackCategory::Infrastructure
        );
        assert_eq!(
            AlertType::CompromisedResponse.category(),
            AttackCategory::MaliciousOutput
        );
    }
}
