//! # Analysis Gateway
//!
//! Wraps the external transcription-and-classification collaborator behind a
//! single bounded call. The collaborator may be a local model or a remote
//! service; either way it is slow, may fail, and may hang — the gateway's
//! job is to turn all of that into distinct, typed errors.
//!
//! ## Fail-closed:
//! A timeout, a collaborator error, and an out-of-range score each produce
//! an error. The gateway never substitutes a default or clamped score: a
//! chunk whose analysis cannot be trusted is not analyzed at all, and
//! everything downstream can rely on `risk_score` being a real probability.

use crate::error::{MonitorError, MonitorResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// The external transcription+classification collaborator.
///
/// Implementations transcribe the audio and score the transcript's phishing
/// likelihood in one call. Errors are opaque to this crate; the gateway
/// converts them into [`MonitorError::AnalysisFailure`].
#[async_trait]
pub trait SpeechAnalyzer: Send + Sync {
    async fn transcribe_and_classify(&self, audio: &[u8]) -> anyhow::Result<Classification>;
}

/// Transcript plus phishing likelihood for one chunk.
#[derive(Debug, Clone)]
pub struct Classification {
    pub transcript: String,
    /// Phishing likelihood in [0.0, 1.0]
    pub risk_score: f32,
}

/// Bounded front door to the analyzer. Stateless apart from its
/// configuration.
pub struct AnalysisGateway {
    analyzer: Arc<dyn SpeechAnalyzer>,
    timeout: Duration,
}

impl AnalysisGateway {
    pub fn new(analyzer: Arc<dyn SpeechAnalyzer>, timeout: Duration) -> Self {
        Self { analyzer, timeout }
    }

    /// Run one chunk through the analyzer within the configured timeout.
    ///
    /// ## Error conditions:
    /// - timeout elapsed → `AnalysisTimeout`
    /// - analyzer returned an error → `AnalysisFailure`
    /// - score is NaN or outside [0, 1] → `AnalysisFailure`
    pub async fn analyze(&self, audio: &[u8]) -> MonitorResult<Classification> {
        let outcome = tokio::time::timeout(
            self.timeout,
            self.analyzer.transcribe_and_classify(audio),
        )
        .await;

        let classification = match outcome {
            Err(_) => {
                tracing::error!(timeout_secs = self.timeout.as_secs(), "Analyzer timed out");
                return Err(MonitorError::AnalysisTimeout(self.timeout.as_secs()));
            }
            Ok(Err(err)) => {
                tracing::error!(error = %err, "Analyzer failed");
                return Err(MonitorError::AnalysisFailure(err.to_string()));
            }
            Ok(Ok(classification)) => classification,
        };

        let score = classification.risk_score;
        if score.is_nan() || !(0.0..=1.0).contains(&score) {
            return Err(MonitorError::AnalysisFailure(format!(
                "Analyzer returned out-of-range risk score {}",
                score
            )));
        }

        tracing::debug!(
            risk_score = score,
            transcript_chars = classification.transcript.len(),
            "Chunk analyzed"
        );
        Ok(classification)
    }
}
