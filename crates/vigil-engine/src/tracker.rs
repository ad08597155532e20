//! Conversation threat tracker
//!
//! Single owner of the per-conversation state map. Conversations move from
//! clean, to watched (first attack attempt), to under scrutiny (first
//! blocked attempt); nothing de-escalates except an explicit clear when the
//! conversation ends. The coarse lock is held only for short synchronous
//! sections, never across an await.

use std::collections::HashMap;
use std::sync::Mutex;
use vigil_core::{ConversationThreatState, SecurityAlert};

/// Owns and serializes access to all conversation threat state
#[derive(Default)]
pub struct ConversationTracker {
    states: Mutex<HashMap<String, ConversationThreatState>>,
}

impl ConversationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attack attempt. Creates the state lazily on first use.
    pub fn record_attack_attempt(
        &self,
        conversation_id: &str,
        alert: &SecurityAlert,
        was_blocked: bool,
    ) {
        let mut states = self.states.lock().unwrap();
        let state = states.entry(conversation_id.to_string()).or_default();
        state.record(alert, was_blocked);
        tracing::debug!(
            "conversation {conversation_id} escalation level {} ({} blocked)",
            state.threat_escalation_level,
            state.blocked_attempts
        );
    }

    /// Escalation factor for the conversation; 1.0 when unknown.
    pub fn scrutiny_multiplier(&self, conversation_id: &str) -> f64 {
        self.states
            .lock()
            .unwrap()
            .get(conversation_id)
            .map(|s| s.scrutiny_multiplier())
            .unwrap_or(1.0)
    }

    /// True once the conversation has a blocked attempt on record.
    pub fn under_scrutiny(&self, conversation_id: &str) -> bool {
        self.states
            .lock()
            .unwrap()
            .get(conversation_id)
            .map(|s| s.under_scrutiny())
            .unwrap_or(false)
    }

    /// Security-context prefix injected ahead of the conversation context
    /// passed to the AI classifier, so it judges cumulative behavior rather
    /// than a single message in isolation. None for clean conversations.
    pub fn security_context(&self, conversation_id: &str) -> Option<String> {
        let states = self.states.lock().unwrap();
        let state = states.get(conversation_id)?;
        if state.attack_attempts.is_empty() {
            return None;
        }
        let mut patterns: Vec<&str> = state
            .suspicious_patterns
            .iter()
            .map(String::as_str)
            .collect();
        patterns.sort_unstable();
        Some(format!(
            "[Security notice: this conversation has {} recorded attack attempt(s), {} blocked. Matched patterns: {}. Judge subsequent messages accordingly.]",
            state.attack_attempts.len(),
            state.blocked_attempts,
            if patterns.is_empty() {
                "none".to_string()
            } else {
                patterns.join(", ")
            }
        ))
    }

    /// Snapshot for inspection; the live state stays owned by the tracker.
    pub fn state(&self, conversation_id: &str) -> Option<ConversationThreatState> {
        self.states
            .lock()
            .unwrap()
            .get(conversation_id)
            .cloned()
    }

    /// The only way out of escalation: the conversation ended.
    pub fn clear_state(&self, conversation_id: &str) {
        self.states
            .lock()
            .unwrap()
            .remove(conversation_id);
    }

    pub fn tracked_conversations(&self) -> usize {
        self.states.lock().unwrap().len()
    }
}
