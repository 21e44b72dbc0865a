//! # Alert Engine
//!
//! Turns per-chunk risk scores into alerts by applying the configured
//! threshold table. Each chunk is judged independently: there is no
//! smoothing or hysteresis across chunks, so the same score always produces
//! the same outcome regardless of what came before it.
//!
//! ## Policy table (defaults):
//! - risk score > 0.8 → `high`
//! - 0.6 < risk score ≤ 0.8 → `medium`
//! - risk score ≤ 0.6 → no alert

use crate::analysis::AnalysisResult;
use crate::config::AlertConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert severity, derived deterministically from the risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A phishing alert raised for one analyzed chunk.
///
/// Immutable once produced. Identified by (call id, triggering chunk
/// number); the snippet is a bounded excerpt of the chunk transcript so the
/// alert is readable on its own without fetching the full result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub call_id: String,
    pub chunk_number: u64,
    pub severity: Severity,
    /// Risk score at trigger time
    pub risk_score: f32,
    /// Bounded transcript excerpt
    pub snippet: String,
    pub raised_at: DateTime<Utc>,
}

/// Threshold-based alert policy.
pub struct AlertEngine {
    config: AlertConfig,
}

impl AlertEngine {
    pub fn new(config: AlertConfig) -> Self {
        Self { config }
    }

    /// Judge one analysis result against the threshold table.
    ///
    /// Pure function of the result and the configured thresholds — no
    /// session history is consulted. Returns `None` for scores at or below
    /// the medium threshold.
    pub fn evaluate(&self, result: &AnalysisResult) -> Option<Alert> {
        let severity = if result.risk_score > self.config.high_threshold {
            Severity::High
        } else if result.risk_score > self.config.medium_threshold {
            Severity::Medium
        } else {
            return None;
        };

        tracing::warn!(
            call_id = %result.call_id,
            chunk_number = result.chunk_number,
            risk_score = result.risk_score,
            severity = %severity,
            "Phishing alert raised"
        );

        Some(Alert {
            call_id: result.call_id.clone(),
            chunk_number: result.chunk_number,
            severity,
            risk_score: result.risk_score,
            snippet: self.snippet(&result.transcript),
            raised_at: Utc::now(),
        })
    }

    /// Bound the transcript excerpt to the configured length, cutting on a
    /// character boundary.
    fn snippet(&self, transcript: &str) -> String {
        let max = self.config.snippet_max_chars;
        if transcript.chars().count() <= max {
            transcript.to_string()
        } else {
            let mut excerpt: String = transcript.chars().take(max).collect();
            excerpt.push_str("...");
            excerpt
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn engine() -> AlertEngine {
        AlertEngine::new(AppConfig::default().alerts)
    }

    fn result(risk: f32, transcript: &str) -> AnalysisResult {
        AnalysisResult {
            call_id: "c1".to_string(),
            chunk_number: 7,
            transcript: transcript.to_string(),
            risk_score: risk,
            artifact_url: "memory://c1_7.wav".to_string(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_threshold_table() {
        // At or below medium: nothing
        assert!(engine().evaluate(&result(0.2, "hi")).is_none());
        assert!(engine().evaluate(&result(0.6, "hi")).is_none());

        // Between the thresholds: medium
        let alert = engine().evaluate(&result(0.7, "hi")).unwrap();
        assert_eq!(alert.severity, Severity::Medium);

        // Exactly at the high threshold stays medium
        let alert = engine().evaluate(&result(0.8, "hi")).unwrap();
        assert_eq!(alert.severity, Severity::Medium);

        // Above high: high
        let alert = engine().evaluate(&result(0.85, "hi")).unwrap();
        assert_eq!(alert.severity, Severity::High);
    }

    #[test]
    fn test_alert_carries_trigger_context() {
        let alert = engine().evaluate(&result(0.9, "wire the money now")).unwrap();
        assert_eq!(alert.call_id, "c1");
        assert_eq!(alert.chunk_number, 7);
        assert_eq!(alert.risk_score, 0.9);
        assert_eq!(alert.snippet, "wire the money now");
    }

    #[test]
    fn test_snippet_is_bounded() {
        let long = "a".repeat(500);
        let alert = engine().evaluate(&result(0.95, &long)).unwrap();
        assert_eq!(alert.snippet.chars().count(), 160 + 3);
        assert!(alert.snippet.ends_with("..."));
    }

    /// Same score, same outcome — history never changes the verdict.
    #[test]
    fn test_no_hysteresis() {
        let engine = engine();
        assert!(engine.evaluate(&result(0.9, "x")).is_some());
        assert!(engine.evaluate(&result(0.5, "x")).is_none());
        assert!(engine.evaluate(&result(0.9, "x")).is_some());
    }
}
