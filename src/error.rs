//! # Error Handling
//!
//! This module defines the typed failures the call-monitoring pipeline can
//! surface to its caller (the ingress layer embedding this crate).
//!
//! ## Error Categories:
//! - **Session lookup**: `SessionNotFound`, `DuplicateCallId`
//! - **Lifecycle**: `SessionCompleted`, `AlreadyFinalized`
//! - **Ingestion**: `InvalidChunk`, `StorageFailure`
//! - **Analysis**: `AnalysisTimeout`, `AnalysisFailure`
//!
//! Subscriber delivery failures are intentionally absent: the broadcast hub
//! handles those locally by dropping the offending subscription, and they
//! never surface past it.
//!
//! ## Propagation policy:
//! Every variant propagates to the caller as-is. A chunk that fails storage
//! or analysis is never recorded into its session, and no failure is ever
//! converted into a placeholder result or alert. Callers may retry a failed
//! chunk with the same chunk number (duplicates are accepted on record).

use std::fmt;

/// Typed failures for the call-monitoring pipeline.
///
/// Each variant carries enough context for the ingress layer to build a
/// useful error status: the offending call id, the collaborator message,
/// or the exceeded timeout.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// The call id does not name any registered session
    SessionNotFound(String),

    /// A caller-supplied call id already names a registered session
    DuplicateCallId(String),

    /// The session exists but has already been finalized; chunks arriving
    /// after finalization are rejected, not queued
    SessionCompleted(String),

    /// Finalize was called on a session that is already completed
    AlreadyFinalized(String),

    /// The submitted audio chunk failed basic validation (empty, or not
    /// parseable as 16-bit PCM)
    InvalidChunk(String),

    /// The storage collaborator could not persist the chunk artifact
    StorageFailure(String),

    /// The analysis collaborator did not answer within the configured
    /// timeout (seconds)
    AnalysisTimeout(u64),

    /// The analysis collaborator failed or returned an unusable result
    AnalysisFailure(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::SessionNotFound(id) => write!(f, "No session registered for call '{}'", id),
            MonitorError::DuplicateCallId(id) => write!(f, "Call id '{}' is already registered", id),
            MonitorError::SessionCompleted(id) => write!(f, "Call '{}' has already been finalized", id),
            MonitorError::AlreadyFinalized(id) => write!(f, "Call '{}' was finalized twice", id),
            MonitorError::InvalidChunk(msg) => write!(f, "Invalid audio chunk: {}", msg),
            MonitorError::StorageFailure(msg) => write!(f, "Artifact storage failed: {}", msg),
            MonitorError::AnalysisTimeout(secs) => write!(f, "Analysis did not complete within {}s", secs),
            MonitorError::AnalysisFailure(msg) => write!(f, "Analysis failed: {}", msg),
        }
    }
}

impl std::error::Error for MonitorError {}

impl MonitorError {
    /// Machine-readable error kind for status responses and structured logs.
    ///
    /// These strings are stable: the ingress layer maps them onto its own
    /// error statuses, and dashboards filter on them.
    pub fn code(&self) -> &'static str {
        match self {
            MonitorError::SessionNotFound(_) => "session_not_found",
            MonitorError::DuplicateCallId(_) => "duplicate_call_id",
            MonitorError::SessionCompleted(_) => "session_completed",
            MonitorError::AlreadyFinalized(_) => "already_finalized",
            MonitorError::InvalidChunk(_) => "invalid_chunk",
            MonitorError::StorageFailure(_) => "storage_failure",
            MonitorError::AnalysisTimeout(_) => "analysis_timeout",
            MonitorError::AnalysisFailure(_) => "analysis_failure",
        }
    }
}

/// Type alias for Results that use the pipeline error type.
pub type MonitorResult<T> = Result<T, MonitorError>;
