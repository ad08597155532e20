//! Engine configuration
//!
//! A plain value passed to the engine at construction and swappable at
//! runtime. No implicit persistence coupling: loading and saving settings
//! is the caller's concern.

use serde::{Deserialize, Serialize};

/// Recognized engine options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Master switch; disabled means every analysis returns clean
    pub enabled: bool,
    /// Auto-block critical threats with strong confidence
    pub auto_block_critical: bool,
    /// Ask the user before proceeding on high-severity findings
    pub prompt_on_high: bool,
    /// Only write audit entries when a threat was found
    pub log_threats_only: bool,
    /// Periodic host auditing driven by the caller
    pub background_monitoring_enabled: bool,
    /// Hard cap on the audit log length
    pub max_audit_entries: usize,
    /// Fuse pattern results with the AI intent classifier
    pub use_ai_analysis: bool,
    /// Model id passed to the classifier collaborator
    pub ai_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_block_critical: true,
            prompt_on_high: true,
            log_threats_only: false,
            background_monitoring_enabled: false,
            max_audit_entries: 10_000,
            use_ai_analysis: true,
            ai_model: "claude-3-5-haiku-20241022".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.enabled);
        assert!(config.auto_block_critical);
        assert_eq!(config.max_audit_entries, 10_000);
        assert!(config.use_ai_analysis);
    }
}
