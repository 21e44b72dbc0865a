//! # Session Registry
//!
//! Process-wide mapping from call identifier to [`CallSession`]. The
//! registry owns session creation, mutation, and finalization; every other
//! component reaches session state through it.
//!
//! ## Locking:
//! Two levels, both fine-grained:
//! - the map itself sits behind one `RwLock`, held only long enough to look
//!   up or insert a slot — never across session mutation
//! - each session sits behind its own mutex inside an `Arc` slot, so
//!   concurrent chunks for the *same* call serialize their appends while
//!   unrelated calls never contend
//!
//! Each slot also carries the per-call pipeline gate: an async mutex the
//! coordinator holds across the record → evaluate → publish sequence of one
//! chunk. The session mutex alone cannot serve that purpose because it must
//! not be held across await points.

use crate::error::{MonitorError, MonitorResult};
use crate::session::call::{CallSession, CallSnapshot, CallSummary};
use crate::analysis::AnalysisResult;
use crate::alerts::Alert;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

/// One registered call: the session state plus its pipeline gate.
pub struct CallSlot {
    session: Mutex<CallSession>,
    pipeline: tokio::sync::Mutex<()>,
}

impl CallSlot {
    fn new(session: CallSession) -> Self {
        Self {
            session: Mutex::new(session),
            pipeline: tokio::sync::Mutex::new(()),
        }
    }

    /// Acquire this call's pipeline gate. The holder is the only task
    /// allowed to mutate-and-publish for this call until the guard drops.
    pub(crate) async fn lock_pipeline(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.pipeline.lock().await
    }
}

/// Process-wide session store.
///
/// Constructed once at process start and threaded through by handle; there
/// are no ambient globals.
pub struct SessionRegistry {
    calls: RwLock<HashMap<String, Arc<CallSlot>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            calls: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session.
    ///
    /// ## Parameters:
    /// - **requested**: caller-supplied call id, or `None` to generate one
    ///
    /// Generated ids combine a UTC timestamp with a random suffix, the same
    /// shape the softphone recorder uses. A caller-supplied id that already
    /// names a registered session — active *or* completed — is rejected:
    /// call ids are unique for the process lifetime, so a finished call's id
    /// is never reused.
    pub fn create(&self, requested: Option<String>) -> MonitorResult<String> {
        let mut calls = self.calls.write().unwrap();

        let call_id = match requested {
            Some(id) => {
                if calls.contains_key(&id) {
                    return Err(MonitorError::DuplicateCallId(id));
                }
                id
            }
            None => {
                let mut id = Self::generate_call_id();
                while calls.contains_key(&id) {
                    id = Self::generate_call_id();
                }
                id
            }
        };

        let session = CallSession::new(call_id.clone());
        calls.insert(call_id.clone(), Arc::new(CallSlot::new(session)));

        tracing::info!(call_id = %call_id, "Session registered");
        Ok(call_id)
    }

    fn generate_call_id() -> String {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let suffix = Uuid::new_v4().simple().to_string();
        format!("call_{}_{}", stamp, &suffix[..8])
    }

    /// Look up a call's slot.
    pub(crate) fn slot(&self, call_id: &str) -> MonitorResult<Arc<CallSlot>> {
        let calls = self.calls.read().unwrap();
        calls
            .get(call_id)
            .cloned()
            .ok_or_else(|| MonitorError::SessionNotFound(call_id.to_string()))
    }

    /// Check that a call exists and is still accepting chunks.
    pub fn ensure_active(&self, call_id: &str) -> MonitorResult<()> {
        let slot = self.slot(call_id)?;
        let session = slot.session.lock().unwrap();
        if session.is_active() {
            Ok(())
        } else {
            Err(MonitorError::SessionCompleted(call_id.to_string()))
        }
    }

    /// Read-only copy of a session's observable state.
    pub fn snapshot(&self, call_id: &str) -> MonitorResult<CallSnapshot> {
        let slot = self.slot(call_id)?;
        let session = slot.session.lock().unwrap();
        Ok(session.snapshot())
    }

    /// Append an analysis result to its session, in arrival order.
    pub fn record(&self, call_id: &str, result: AnalysisResult) -> MonitorResult<()> {
        let slot = self.slot(call_id)?;
        let mut session = slot.session.lock().unwrap();
        session.record(result)
    }

    /// Append an alert to its session.
    pub fn record_alert(&self, call_id: &str, alert: Alert) -> MonitorResult<()> {
        let slot = self.slot(call_id)?;
        let mut session = slot.session.lock().unwrap();
        session.record_alert(alert)
    }

    /// Finalize a session and compute its closing summary.
    pub fn finalize(&self, call_id: &str) -> MonitorResult<CallSummary> {
        let slot = self.slot(call_id)?;
        let mut session = slot.session.lock().unwrap();
        let summary = session.finalize()?;
        tracing::info!(
            call_id = %call_id,
            total_chunks = summary.total_chunks,
            alert_count = summary.alert_count,
            "Session finalized"
        );
        Ok(summary)
    }

    /// Snapshots of every session still in active status.
    pub fn list_active(&self) -> Vec<(String, CallSnapshot)> {
        let calls = self.calls.read().unwrap();
        calls
            .iter()
            .filter_map(|(id, slot)| {
                let session = slot.session.lock().unwrap();
                session.is_active().then(|| (id.clone(), session.snapshot()))
            })
            .collect()
    }

    /// Active calls whose last activity is older than `max_idle`.
    ///
    /// The registry only identifies them; the coordinator finalizes each
    /// through the normal path so observers still receive the closing
    /// summary event. A call that receives a chunk between this scan and
    /// its finalization is finalized anyway — it was idle when scanned.
    pub fn idle_calls(&self, max_idle: Duration) -> Vec<String> {
        let cutoff = Utc::now() - max_idle;
        let calls = self.calls.read().unwrap();
        calls
            .iter()
            .filter_map(|(id, slot)| {
                let session = slot.session.lock().unwrap();
                (session.is_active() && session.last_activity() < cutoff)
                    .then(|| id.clone())
            })
            .collect()
    }

    /// Number of registered sessions, active or completed.
    pub fn len(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.read().unwrap().is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
