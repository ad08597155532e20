//! # Vigil Engine
//!
//! Threat detection and escalation for conversational AI.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                       THREAT ENGINE                            │
//! │                                                                │
//! │   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐       │
//! │   │   PATTERN    │   │   CONTENT    │   │  AI INTENT   │       │
//! │   │   CATALOG    │──▶│   ANALYZER   │◀──│   ANALYZER   │       │
//! │   └──────────────┘   └──────────────┘   └──────────────┘       │
//! │                             │                  ▲               │
//! │                             ▼                  │               │
//! │                     ┌──────────────┐   ┌──────────────┐        │
//! │                     │  ALERT/AUDIT │   │ CONVERSATION │        │
//! │                     │    STORE     │   │   TRACKER    │        │
//! │                     └──────────────┘   └──────────────┘        │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pattern analysis always runs; the AI intent classifier fuses an extra
//! probabilistic signal on top and is judged more strictly once a
//! conversation has a documented attack history. Host posture auditing
//! lives in `vigil-host` and is surfaced through the [`ThreatEngine`]
//! facade.

pub mod analyzer;
pub mod catalog;
pub mod engine;
pub mod intent;
pub mod matcher;
pub mod store;
pub mod tracker;

pub use analyzer::ContentAnalyzer;
pub use catalog::{CompiledPattern, PatternCatalog, PatternGroup};
pub use engine::ThreatEngine;
pub use intent::{AiIntentAnalysis, ClaudeClassifier, IntentAnalyzer, IntentClassifier, SuggestedAction};
pub use matcher::{match_group, PatternMatch};
pub use store::AlertStore;
pub use tracker::ConversationTracker;

pub use vigil_core::{
    AlertSource, AlertType, AttackCategory, AuditEntry, ConversationThreatState, EngineConfig,
    EngineCounters, Error, Result, SecurityAlert, ThreatAnalysis, ThreatLevel,
};
pub use vigil_host::{CommandRunner, HostAuditor, HostSecurityReport, SystemRunner};
