//! Matching engine
//!
//! Runs one catalog group against a piece of text. A pattern contributes at
//! most one match per call (its first occurrence), which bounds alert
//! volume no matter how often the text repeats an attack phrase.

use crate::catalog::CompiledPattern;
use vigil_core::{AlertType, ThreatLevel};

/// Context included around a match excerpt, in bytes (clamped to char
/// boundaries)
const EXCERPT_CONTEXT: usize = 20;

/// One pattern hit
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub name: &'static str,
    pub alert_type: AlertType,
    pub severity: ThreatLevel,
    /// Excerpt around the first occurrence
    pub excerpt: String,
    /// Byte span of the match within the original text
    pub start: usize,
    pub end: usize,
}

/// Match every pattern in the group against `text`, first occurrence only,
/// preserving pattern declaration order.
pub fn match_group(patterns: &[CompiledPattern], text: &str) -> Vec<PatternMatch> {
    patterns
        .iter()
        .filter_map(|pattern| {
            pattern.regex.find(text).map(|m| PatternMatch {
                name: pattern.name,
                alert_type: pattern.alert_type,
                severity: pattern.severity,
                excerpt: excerpt(text, m.start(), m.end()),
                start: m.start(),
                end: m.end(),
            })
        })
        .collect()
}

/// Excerpt with surrounding context, clamped to character boundaries.
fn excerpt(text: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(EXCERPT_CONTEXT);
    while from > 0 && !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + EXCERPT_CONTEXT).min(text.len());
    while to < text.len() && !text.is_char_boundary(to) {
        to += 1;
    }
    let mut out = String::new();
    if from > 0 {
        out.push_str("...");
    }
    out.push_str(&text[from..to]);
    if to < text.len() {
        out.push_str("...");
    }
    out
}
