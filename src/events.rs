//! # Call Event Types
//!
//! The tagged event union fanned out to subscribers of a call. These are the
//! wire shapes: the ingress layer serializes them straight onto whatever
//! transport carries the live stream.
//!
//! ## Event flow per call:
//! 1. `call_started` when monitoring begins
//! 2. `analysis_update` after each ingested chunk, `phishing_alert` when one
//!    crosses a threshold
//! 3. `call_ended` with the closing summary
//! 4. `heartbeat` whenever the call goes quiet, so idle transports stay open
//!
//! A subscriber joining mid-call first receives one `connection_established`
//! snapshot so it is not blind to history; everything after that is
//! live-only.

use crate::alerts::Alert;
use crate::analysis::AnalysisResult;
use crate::session::{CallSnapshot, CallStatus, CallSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event union for the per-call subscription stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CallEvent {
    /// Monitoring of a call began
    #[serde(rename = "call_started")]
    CallStarted {
        call_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Snapshot of recorded state, sent once to a subscriber that joins a
    /// call which already has history
    #[serde(rename = "connection_established")]
    ConnectionEstablished {
        call_id: String,
        status: CallStatus,
        chunk_count: usize,
        average_risk_score: f32,
        /// Full alert history up to the moment of subscribing
        alerts: Vec<Alert>,
    },

    /// One chunk finished analysis
    #[serde(rename = "analysis_update")]
    AnalysisUpdate {
        call_id: String,
        chunk_number: u64,
        transcript: String,
        risk_score: f32,
        timestamp: DateTime<Utc>,
    },

    /// A chunk crossed an alert threshold
    #[serde(rename = "phishing_alert")]
    PhishingAlert {
        call_id: String,
        chunk_number: u64,
        severity: crate::alerts::Severity,
        risk_score: f32,
        snippet: String,
        timestamp: DateTime<Utc>,
    },

    /// The call was finalized
    #[serde(rename = "call_ended")]
    CallEnded {
        call_id: String,
        summary: CallSummary,
    },

    /// Liveness signal for otherwise idle subscriptions
    #[serde(rename = "heartbeat")]
    Heartbeat { timestamp: DateTime<Utc> },
}

impl CallEvent {
    pub fn call_started(call_id: &str) -> Self {
        CallEvent::CallStarted {
            call_id: call_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn connection_established(snapshot: &CallSnapshot) -> Self {
        CallEvent::ConnectionEstablished {
            call_id: snapshot.call_id.clone(),
            status: snapshot.status,
            chunk_count: snapshot.chunk_count,
            average_risk_score: snapshot.average_risk_score,
            alerts: snapshot.alerts.clone(),
        }
    }

    pub fn analysis_update(result: &AnalysisResult) -> Self {
        CallEvent::AnalysisUpdate {
            call_id: result.call_id.clone(),
            chunk_number: result.chunk_number,
            transcript: result.transcript.clone(),
            risk_score: result.risk_score,
            timestamp: result.received_at,
        }
    }

    pub fn phishing_alert(alert: &Alert) -> Self {
        CallEvent::PhishingAlert {
            call_id: alert.call_id.clone(),
            chunk_number: alert.chunk_number,
            severity: alert.severity,
            risk_score: alert.risk_score,
            snippet: alert.snippet.clone(),
            timestamp: alert.raised_at,
        }
    }

    pub fn call_ended(call_id: &str, summary: CallSummary) -> Self {
        CallEvent::CallEnded {
            call_id: call_id.to_string(),
            summary,
        }
    }

    pub fn heartbeat() -> Self {
        CallEvent::Heartbeat { timestamp: Utc::now() }
    }
}
