//! # Per-Call Session State
//!
//! State accumulated for one monitored phone call: the analysis results in
//! arrival order, the alerts they triggered, and the lifecycle status.
//!
//! ## Session Lifecycle:
//! 1. **Active**: created by the start-call command, accepting results
//! 2. **Completed**: finalized (explicitly or reaped); terminal
//!
//! The transition is one-way. A completed session keeps its state readable
//! (late observers may still query it) but rejects every further mutation.

use crate::alerts::Alert;
use crate::analysis::AnalysisResult;
use crate::error::{MonitorError, MonitorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Call in progress, accepting chunk results
    Active,
    /// Call finalized; state is read-only
    Completed,
}

impl CallStatus {
    /// Convert status to string for status responses and events.
    pub fn as_str(&self) -> &str {
        match self {
            CallStatus::Active => "active",
            CallStatus::Completed => "completed",
        }
    }
}

/// Accumulated state for one monitored call.
///
/// ## Ownership:
/// Owned exclusively by the [`SessionRegistry`](crate::session::SessionRegistry);
/// all mutation goes through registry-mediated operations, so no other
/// component ever holds a mutable reference across calls.
///
/// ## Ordering:
/// `results` is kept in *arrival* order, not chunk-number order — chunks may
/// arrive out of order or duplicated (at-least-once upload semantics), and
/// both are kept. Consumers that need chronological-by-chunk ordering sort
/// by chunk number themselves.
#[derive(Debug)]
pub struct CallSession {
    /// Unique identifier for this call, immutable once assigned
    call_id: String,

    /// When monitoring of this call started
    created_at: DateTime<Utc>,

    /// Current lifecycle status
    status: CallStatus,

    /// Analysis results in arrival order
    results: Vec<AnalysisResult>,

    /// Alerts in emission order
    alerts: Vec<Alert>,

    /// Set exactly once, on finalization
    ended_at: Option<DateTime<Utc>>,

    /// Creation time or the latest result arrival, whichever is later.
    /// Drives the idle-call reap policy.
    last_activity: DateTime<Utc>,
}

impl CallSession {
    pub fn new(call_id: String) -> Self {
        let now = Utc::now();
        Self {
            call_id,
            created_at: now,
            status: CallStatus::Active,
            results: Vec::new(),
            alerts: Vec::new(),
            ended_at: None,
            last_activity: now,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == CallStatus::Active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn results(&self) -> &[AnalysisResult] {
        &self.results
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// Append an analysis result.
    ///
    /// Duplicate chunk numbers are accepted and both kept: chunk uploads are
    /// at-least-once, and a retried chunk must not be lost just because its
    /// first attempt also made it through.
    pub fn record(&mut self, result: AnalysisResult) -> MonitorResult<()> {
        if !self.is_active() {
            return Err(MonitorError::SessionCompleted(self.call_id.clone()));
        }
        self.last_activity = result.received_at.max(self.last_activity);
        self.results.push(result);
        Ok(())
    }

    /// Append an alert.
    ///
    /// The caller records the alert *before* broadcasting it, so an observer
    /// receiving the broadcast can immediately query session state and find
    /// the alert present.
    pub fn record_alert(&mut self, alert: Alert) -> MonitorResult<()> {
        if !self.is_active() {
            return Err(MonitorError::SessionCompleted(self.call_id.clone()));
        }
        self.alerts.push(alert);
        Ok(())
    }

    /// Transition to completed and compute the closing summary.
    ///
    /// ## State Transition:
    /// Active → Completed, exactly once. Finalizing a completed session is
    /// a caller bug and fails with `AlreadyFinalized` rather than silently
    /// succeeding.
    pub fn finalize(&mut self) -> MonitorResult<CallSummary> {
        if !self.is_active() {
            return Err(MonitorError::AlreadyFinalized(self.call_id.clone()));
        }
        let ended = Utc::now();
        self.status = CallStatus::Completed;
        self.ended_at = Some(ended);

        let duration = ended.signed_duration_since(self.created_at);
        Ok(CallSummary {
            total_chunks: self.results.len(),
            average_risk_score: self.average_risk_score(),
            alert_count: self.alerts.len(),
            duration_seconds: duration.num_milliseconds() as f64 / 1000.0,
        })
    }

    /// Mean risk score over all recorded results, 0.0 for an empty session.
    pub fn average_risk_score(&self) -> f32 {
        if self.results.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.results.iter().map(|r| r.risk_score).sum();
        sum / self.results.len() as f32
    }

    /// Read-only copy of the observable session state.
    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            call_id: self.call_id.clone(),
            status: self.status,
            created_at: self.created_at,
            ended_at: self.ended_at,
            chunk_count: self.results.len(),
            average_risk_score: self.average_risk_score(),
            results: self.results.clone(),
            alerts: self.alerts.clone(),
        }
    }
}

/// Closing summary of a finalized call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub total_chunks: usize,
    /// 0.0 for a call that never received a chunk
    pub average_risk_score: f32,
    pub alert_count: usize,
    pub duration_seconds: f64,
}

/// Point-in-time copy of a session, used by status queries and the
/// subscribe-time snapshot event.
#[derive(Debug, Clone, Serialize)]
pub struct CallSnapshot {
    pub call_id: String,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub chunk_count: usize,
    pub average_risk_score: f32,
    pub results: Vec<AnalysisResult>,
    pub alerts: Vec<Alert>,
}
