//! # Vigil Core
//!
//! Foundation crate for the Vigil threat detection engine.
//!
//! Holds the shared data model (threat levels, attack taxonomy, alerts,
//! analysis results, audit entries), the engine configuration surface, and
//! the persistence collaborator trait. Behavior lives in `vigil-engine` and
//! `vigil-host`; this crate is deliberately data-heavy and logic-light.

pub mod config;
pub mod persist;
pub mod types;

pub use config::EngineConfig;
pub use persist::{EngineCounters, FileStore, NullStore, StatePersistence};
pub use types::{
    AlertSource, AlertType, AttackCategory, AuditEntry, ConversationThreatState, SecurityAlert,
    ThreatAnalysis, ThreatLevel,
};

/// Result type for vigil operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur inside the engine and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
