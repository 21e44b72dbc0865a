//! # Call Coordinator
//!
//! Orchestrates the whole per-call flow: session registration, chunk
//! ingestion, alert evaluation, and event fan-out. This is the component
//! the ingress layer actually invokes; the parts underneath it depend only
//! on shared data types, never on each other, which keeps every one of
//! them independently testable.
//!
//! ## Ordering invariant:
//! For one chunk, record → evaluate → publish runs under the call's
//! pipeline gate. An alert is therefore recorded into its session before it
//! is broadcast — a live observer and a late status query can never
//! disagree about whether an alert exists — and a second chunk for the same
//! call cannot interleave its mutations with the first. Chunks of
//! *different* calls proceed fully in parallel, and the expensive analysis
//! step itself runs outside the gate so uploads for one call can still be
//! pipelined.

use crate::alerts::AlertEngine;
use crate::analysis::{AnalysisGateway, AnalysisResult, ChunkIngestor, SpeechAnalyzer};
use crate::broadcast::{BroadcastHub, Subscription};
use crate::config::AppConfig;
use crate::error::MonitorResult;
use crate::events::CallEvent;
use crate::session::{CallSnapshot, CallSummary, SessionRegistry};
use crate::storage::ArtifactStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Top-level handle to the call-monitoring pipeline.
///
/// Constructed once at process start (inside a tokio runtime — the hub's
/// heartbeat task is spawned here) and threaded through the ingress layer
/// by reference. Owns the two process-wide stores; there are no globals.
pub struct CallCoordinator {
    registry: Arc<SessionRegistry>,
    hub: Arc<BroadcastHub>,
    ingestor: ChunkIngestor,
    alerts: AlertEngine,
    heartbeat_task: JoinHandle<()>,
}

impl CallCoordinator {
    /// Wire the pipeline against the two external collaborators.
    pub fn new(
        config: AppConfig,
        analyzer: Arc<dyn SpeechAnalyzer>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let hub = Arc::new(BroadcastHub::new(config.broadcast.clone()));

        let gateway = AnalysisGateway::new(
            analyzer,
            Duration::from_secs(config.analysis.gateway_timeout_secs),
        );
        let ingestor = ChunkIngestor::new(
            gateway,
            store,
            Duration::from_secs(config.storage.put_timeout_secs),
        );
        let alerts = AlertEngine::new(config.alerts.clone());

        let heartbeat_hub = hub.clone();
        let heartbeat_task = tokio::spawn(async move { heartbeat_hub.run_heartbeats().await });

        Self {
            registry,
            hub,
            ingestor,
            alerts,
            heartbeat_task,
        }
    }

    /// Begin monitoring a call. Publishes `call_started` to anyone already
    /// subscribed to the id.
    pub async fn start_call(&self, requested_id: Option<String>) -> MonitorResult<String> {
        let call_id = self.registry.create(requested_id)?;
        self.hub
            .publish(&call_id, CallEvent::call_started(&call_id))
            .await;
        Ok(call_id)
    }

    /// Ingest one audio chunk and run it through the full pipeline.
    ///
    /// ## Flow:
    /// precondition check → ingest (validate, persist, analyze; concurrent
    /// across chunks) → pipeline gate → record → evaluate → record alert →
    /// publish update → publish alert.
    ///
    /// A chunk whose analysis fails is not recorded and nothing is
    /// published for it; the caller may retry under the same chunk number.
    /// A chunk racing a finalize loses: `record` fails with
    /// `SessionCompleted` and the result is discarded.
    pub async fn ingest_chunk(
        &self,
        call_id: &str,
        chunk_number: u64,
        audio: &[u8],
    ) -> MonitorResult<AnalysisResult> {
        self.registry.ensure_active(call_id)?;

        let result = self.ingestor.ingest(call_id, chunk_number, audio).await?;

        let slot = self.registry.slot(call_id)?;
        let _gate = slot.lock_pipeline().await;

        self.registry.record(call_id, result.clone())?;

        let alert = self.alerts.evaluate(&result);
        if let Some(alert) = &alert {
            // Recorded before broadcast: subscribers must never see an
            // alert the session does not yet contain.
            self.registry.record_alert(call_id, alert.clone())?;
        }

        self.hub
            .publish(call_id, CallEvent::analysis_update(&result))
            .await;
        if let Some(alert) = &alert {
            self.hub
                .publish(call_id, CallEvent::phishing_alert(alert))
                .await;
        }

        Ok(result)
    }

    /// Finalize a call: transition it to completed, publish the closing
    /// summary, and return it.
    ///
    /// Takes the pipeline gate, so a chunk mid-pipeline finishes (or fails)
    /// before the transition and nothing is published after the summary.
    /// Subscriptions survive finalization; observers keep their channel
    /// until they disconnect.
    pub async fn finalize_call(&self, call_id: &str) -> MonitorResult<CallSummary> {
        let slot = self.registry.slot(call_id)?;
        let _gate = slot.lock_pipeline().await;

        let summary = self.registry.finalize(call_id)?;
        self.hub
            .publish(call_id, CallEvent::call_ended(call_id, summary.clone()))
            .await;
        Ok(summary)
    }

    /// Open a live event stream for a call.
    ///
    /// If the call already has recorded state the subscription starts with
    /// one `connection_established` snapshot; taken under the pipeline gate
    /// so no event can fall between the snapshot and the registration.
    /// Subscribing to a call that has not started yet is allowed.
    pub async fn subscribe(&self, call_id: &str) -> Subscription {
        match self.registry.slot(call_id) {
            Ok(slot) => {
                let _gate = slot.lock_pipeline().await;
                let snapshot = self
                    .registry
                    .snapshot(call_id)
                    .ok()
                    .map(|snapshot| CallEvent::connection_established(&snapshot));
                self.hub.subscribe(call_id, snapshot)
            }
            Err(_) => self.hub.subscribe(call_id, None),
        }
    }

    /// Drop a subscription explicitly.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.hub.unsubscribe(subscription);
    }

    /// Snapshots of all calls currently in active status.
    pub fn active_calls(&self) -> Vec<(String, CallSnapshot)> {
        self.registry.list_active()
    }

    /// Snapshot of one call, active or completed.
    pub fn call_status(&self, call_id: &str) -> MonitorResult<CallSnapshot> {
        self.registry.snapshot(call_id)
    }

    /// Finalize every active call idle for longer than `max_idle`, through
    /// the normal finalize path — observers still receive `call_ended`.
    ///
    /// The ingress layer schedules this; the pipeline itself never expires
    /// sessions on its own.
    pub async fn reap_idle_calls(&self, max_idle: chrono::Duration) -> Vec<(String, CallSummary)> {
        let mut reaped = Vec::new();
        for call_id in self.registry.idle_calls(max_idle) {
            match self.finalize_call(&call_id).await {
                Ok(summary) => {
                    tracing::info!(call_id = %call_id, "Reaped idle call");
                    reaped.push((call_id, summary));
                }
                // Lost a race with an explicit finalize; nothing to do
                Err(err) => {
                    tracing::debug!(call_id = %call_id, error = %err, "Skipped reaping")
                }
            }
        }
        reaped
    }

    /// Live subscription count for a call (observability hook for the
    /// ingress layer's status endpoints).
    pub fn subscriber_count(&self, call_id: &str) -> usize {
        self.hub.subscriber_count(call_id)
    }
}

impl Drop for CallCoordinator {
    fn drop(&mut self) {
        self.heartbeat_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::Severity;
    use crate::analysis::Classification;
    use crate::error::MonitorError;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Analyzer that replays a fixed score sequence, one per chunk.
    struct ScriptedAnalyzer {
        scores: Mutex<VecDeque<f32>>,
    }

    impl ScriptedAnalyzer {
        fn new(scores: &[f32]) -> Arc<Self> {
            Arc::new(Self {
                scores: Mutex::new(scores.iter().copied().collect()),
            })
        }
    }

    #[async_trait]
    impl SpeechAnalyzer for ScriptedAnalyzer {
        async fn transcribe_and_classify(&self, _audio: &[u8]) -> anyhow::Result<Classification> {
            let score = self
                .scores
                .lock()
                .unwrap()
                .pop_front()
                .expect("analyzer script exhausted");
            Ok(Classification {
                transcript: "you must verify your bank account now".to_string(),
                risk_score: score,
            })
        }
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl SpeechAnalyzer for FailingAnalyzer {
        async fn transcribe_and_classify(&self, _audio: &[u8]) -> anyhow::Result<Classification> {
            Err(anyhow::anyhow!("classifier offline"))
        }
    }

    fn coordinator_with(analyzer: Arc<dyn SpeechAnalyzer>) -> CallCoordinator {
        CallCoordinator::new(AppConfig::default(), analyzer, Arc::new(MemoryStore::new()))
    }

    fn pcm_chunk() -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..64 {
            let sample = ((i as f32 * 0.5).sin() * 10000.0) as i16;
            data.extend_from_slice(&sample.to_le_bytes());
        }
        data
    }

    /// The worked end-to-end example: a quiet chunk, a hot chunk, the
    /// summary, and the post-finalize rejection.
    #[tokio::test]
    async fn test_full_call_lifecycle() {
        let coordinator = coordinator_with(ScriptedAnalyzer::new(&[0.2, 0.85]));
        let chunk = pcm_chunk();

        let call_id = coordinator.start_call(Some("c1".to_string())).await.unwrap();
        assert_eq!(call_id, "c1");

        // Low-risk chunk: recorded, no alert
        coordinator.ingest_chunk("c1", 0, &chunk).await.unwrap();
        let status = coordinator.call_status("c1").unwrap();
        assert_eq!(status.chunk_count, 1);
        assert!(status.alerts.is_empty());

        // High-risk chunk: recorded with one high alert
        coordinator.ingest_chunk("c1", 1, &chunk).await.unwrap();
        let status = coordinator.call_status("c1").unwrap();
        assert_eq!(status.alerts.len(), 1);
        assert_eq!(status.alerts[0].severity, Severity::High);
        assert_eq!(status.alerts[0].chunk_number, 1);

        // Closing summary
        let summary = coordinator.finalize_call("c1").await.unwrap();
        assert_eq!(summary.total_chunks, 2);
        assert!((summary.average_risk_score - 0.525).abs() < 1e-6);
        assert_eq!(summary.alert_count, 1);

        // Chunks after finalize are rejected, not queued
        let err = coordinator.ingest_chunk("c1", 2, &chunk).await.unwrap_err();
        assert_eq!(err, MonitorError::SessionCompleted("c1".to_string()));

        // And finalize is not idempotent
        let err = coordinator.finalize_call("c1").await.unwrap_err();
        assert_eq!(err, MonitorError::AlreadyFinalized("c1".to_string()));
    }

    /// An early subscriber sees the call start and every subsequent update.
    #[tokio::test]
    async fn test_subscriber_receives_live_flow() {
        let coordinator = coordinator_with(ScriptedAnalyzer::new(&[0.3, 0.9]));
        let chunk = pcm_chunk();

        let mut subscription = coordinator.subscribe("c1").await;
        coordinator.start_call(Some("c1".to_string())).await.unwrap();
        coordinator.ingest_chunk("c1", 0, &chunk).await.unwrap();
        coordinator.ingest_chunk("c1", 1, &chunk).await.unwrap();
        coordinator.finalize_call("c1").await.unwrap();

        assert!(matches!(subscription.recv().await, Some(CallEvent::CallStarted { .. })));
        match subscription.recv().await {
            Some(CallEvent::AnalysisUpdate { chunk_number, risk_score, .. }) => {
                assert_eq!(chunk_number, 0);
                assert_eq!(risk_score, 0.3);
            }
            other => panic!("Expected analysis update, got {:?}", other),
        }
        assert!(matches!(
            subscription.recv().await,
            Some(CallEvent::AnalysisUpdate { chunk_number: 1, .. })
        ));

        // The hot chunk's alert arrives after its update, and by the time
        // it is visible the session already contains it
        match subscription.recv().await {
            Some(CallEvent::PhishingAlert { severity, .. }) => {
                assert_eq!(severity, Severity::High);
                let status = coordinator.call_status("c1").unwrap();
                assert_eq!(status.alerts.len(), 1);
            }
            other => panic!("Expected phishing alert, got {:?}", other),
        }

        match subscription.recv().await {
            Some(CallEvent::CallEnded { summary, .. }) => {
                assert_eq!(summary.total_chunks, 2);
                assert_eq!(summary.alert_count, 1);
            }
            other => panic!("Expected call ended, got {:?}", other),
        }
    }

    /// A late subscriber starts with a snapshot matching the status query.
    #[tokio::test]
    async fn test_late_subscriber_gets_snapshot() {
        let coordinator = coordinator_with(ScriptedAnalyzer::new(&[0.7]));
        let chunk = pcm_chunk();

        coordinator.start_call(Some("c1".to_string())).await.unwrap();
        coordinator.ingest_chunk("c1", 0, &chunk).await.unwrap();

        let mut subscription = coordinator.subscribe("c1").await;
        match subscription.recv().await {
            Some(CallEvent::ConnectionEstablished { chunk_count, alerts, .. }) => {
                let status = coordinator.call_status("c1").unwrap();
                assert_eq!(chunk_count, status.chunk_count);
                assert_eq!(alerts, status.alerts);
                assert_eq!(alerts[0].severity, Severity::Medium);
            }
            other => panic!("Expected snapshot, got {:?}", other),
        }
    }

    /// Duplicate chunk numbers are both kept — at-least-once, not
    /// deduplicated.
    #[tokio::test]
    async fn test_duplicate_chunk_numbers_accepted() {
        let coordinator = coordinator_with(ScriptedAnalyzer::new(&[0.1, 0.2]));
        let chunk = pcm_chunk();

        coordinator.start_call(Some("c1".to_string())).await.unwrap();
        coordinator.ingest_chunk("c1", 3, &chunk).await.unwrap();
        coordinator.ingest_chunk("c1", 3, &chunk).await.unwrap();

        let status = coordinator.call_status("c1").unwrap();
        assert_eq!(status.chunk_count, 2);
        assert!(status.results.iter().all(|result| result.chunk_number == 3));
    }

    /// A failed analysis leaves no trace in the session.
    #[tokio::test]
    async fn test_failed_chunk_not_recorded() {
        let coordinator = coordinator_with(Arc::new(FailingAnalyzer));
        let chunk = pcm_chunk();

        coordinator.start_call(Some("c1".to_string())).await.unwrap();
        let err = coordinator.ingest_chunk("c1", 0, &chunk).await.unwrap_err();
        assert_eq!(err.code(), "analysis_failure");

        let status = coordinator.call_status("c1").unwrap();
        assert_eq!(status.chunk_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_call_errors() {
        let coordinator = coordinator_with(ScriptedAnalyzer::new(&[]));

        let err = coordinator.ingest_chunk("ghost", 0, &pcm_chunk()).await.unwrap_err();
        assert_eq!(err, MonitorError::SessionNotFound("ghost".to_string()));

        let err = coordinator.finalize_call("ghost").await.unwrap_err();
        assert_eq!(err, MonitorError::SessionNotFound("ghost".to_string()));

        assert!(coordinator.call_status("ghost").is_err());
    }

    #[tokio::test]
    async fn test_active_calls_listing() {
        let coordinator = coordinator_with(ScriptedAnalyzer::new(&[]));
        coordinator.start_call(Some("a".to_string())).await.unwrap();
        coordinator.start_call(Some("b".to_string())).await.unwrap();
        coordinator.finalize_call("a").await.unwrap();

        let active = coordinator.active_calls();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0, "b");
    }

    /// Reaping finalizes idle calls through the normal path: observers get
    /// the closing summary, and fresh calls are left alone.
    #[tokio::test]
    async fn test_reap_idle_calls() {
        let coordinator = coordinator_with(ScriptedAnalyzer::new(&[]));
        coordinator.start_call(Some("stale".to_string())).await.unwrap();
        let mut subscription = coordinator.subscribe("stale").await;

        // Nothing has been idle for an hour
        assert!(coordinator.reap_idle_calls(chrono::Duration::hours(1)).await.is_empty());

        // Zero tolerance reaps every active call
        let reaped = coordinator.reap_idle_calls(chrono::Duration::zero()).await;
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].0, "stale");
        assert!(coordinator.active_calls().is_empty());

        // First event is the snapshot from subscribing, then the summary
        assert!(matches!(
            subscription.recv().await,
            Some(CallEvent::ConnectionEstablished { .. })
        ));
        assert!(matches!(subscription.recv().await, Some(CallEvent::CallEnded { .. })));
    }
}
