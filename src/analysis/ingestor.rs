//! # Chunk Ingestor
//!
//! Takes one raw audio chunk from a monitored call through validation,
//! artifact persistence, and analysis, producing an [`AnalysisResult`].
//!
//! ## Pipeline per chunk:
//! 1. **Validate**: non-empty, parseable as 16-bit PCM (the softphone
//!    recorder uploads 16 kHz mono 16-bit WAV chunks)
//! 2. **Persist**: write the raw chunk through the storage collaborator —
//!    failure here fails the chunk, it is never analyzed unstored
//! 3. **Analyze**: transcribe and classify through the gateway
//! 4. **Record metadata**: best-effort row write; a failure is logged and
//!    accepted
//!
//! The ingestor does not mutate session state. On any failure the chunk is
//! simply not recorded; the caller may retry with the same chunk number.

use crate::analysis::gateway::AnalysisGateway;
use crate::error::{MonitorError, MonitorResult};
use crate::storage::{ArtifactStore, ChunkRecord};
use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// The outcome of analyzing one audio chunk.
///
/// Identified by (call id, chunk number); immutable once produced. Chunk
/// numbers within a call need not be contiguous — chunks may be dropped or
/// duplicated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub call_id: String,
    pub chunk_number: u64,
    pub transcript: String,
    /// Phishing likelihood in [0.0, 1.0]
    pub risk_score: f32,
    /// Opaque artifact location from the storage collaborator
    pub artifact_url: String,
    /// Wall-clock arrival time of the chunk
    pub received_at: DateTime<Utc>,
}

/// Runs the per-chunk ingestion pipeline.
pub struct ChunkIngestor {
    gateway: AnalysisGateway,
    store: Arc<dyn ArtifactStore>,
    /// Upper bound on one storage-collaborator call
    store_timeout: Duration,
}

impl ChunkIngestor {
    pub fn new(
        gateway: AnalysisGateway,
        store: Arc<dyn ArtifactStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            store,
            store_timeout,
        }
    }

    /// Ingest one chunk: validate, persist, analyze.
    ///
    /// ## Side effects:
    /// One durable artifact write, one outbound analysis call, one
    /// best-effort metadata write.
    pub async fn ingest(
        &self,
        call_id: &str,
        chunk_number: u64,
        audio: &[u8],
    ) -> MonitorResult<AnalysisResult> {
        validate_chunk(audio)?;

        // Same artifact naming the recorder uses, so chunks are traceable
        // back to their call across the storage bucket.
        let artifact_name = format!("{}_{}_{}.wav", call_id, chunk_number, Uuid::new_v4());

        let write = tokio::time::timeout(
            self.store_timeout,
            self.store.put_artifact(&artifact_name, audio),
        );
        let artifact_url = match write.await {
            Err(_) => {
                tracing::error!(call_id = %call_id, chunk_number, "Artifact write timed out");
                return Err(MonitorError::StorageFailure(format!(
                    "artifact write timed out after {}s",
                    self.store_timeout.as_secs()
                )));
            }
            Ok(Err(err)) => {
                tracing::error!(call_id = %call_id, chunk_number, error = %err, "Artifact write failed");
                return Err(MonitorError::StorageFailure(err.to_string()));
            }
            Ok(Ok(url)) => url,
        };

        let classification = self.gateway.analyze(audio).await?;

        let result = AnalysisResult {
            call_id: call_id.to_string(),
            chunk_number,
            transcript: classification.transcript,
            risk_score: classification.risk_score,
            artifact_url: artifact_url.clone(),
            received_at: Utc::now(),
        };

        // Metadata is outside the transactional boundary of session state:
        // a failed row write is logged and the result still stands.
        let record = ChunkRecord {
            call_id: result.call_id.clone(),
            chunk_number,
            artifact_name,
            artifact_url,
            transcript: result.transcript.clone(),
            risk_score: result.risk_score,
        };
        match tokio::time::timeout(self.store_timeout, self.store.record_metadata(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(call_id = %call_id, chunk_number, error = %err, "Metadata write failed")
            }
            Err(_) => {
                tracing::warn!(call_id = %call_id, chunk_number, "Metadata write timed out")
            }
        }

        tracing::debug!(
            call_id = %call_id,
            chunk_number,
            risk_score = result.risk_score,
            "Chunk ingested"
        );
        Ok(result)
    }
}

/// Basic sanity checks on an uploaded chunk.
///
/// A chunk must be non-empty and hold whole 16-bit samples. Content checks
/// stop there: a near-silent chunk is only logged, because judging what the
/// audio *says* is the classifier's job, not ours.
fn validate_chunk(audio: &[u8]) -> MonitorResult<()> {
    if audio.is_empty() {
        return Err(MonitorError::InvalidChunk("audio chunk is empty".to_string()));
    }
    if audio.len() % 2 != 0 {
        return Err(MonitorError::InvalidChunk(
            "audio length must be even for 16-bit samples".to_string(),
        ));
    }

    // Scan up to the first 1000 samples for dynamic range; enough to spot a
    // dead microphone without reading a whole 10s chunk.
    let mut cursor = Cursor::new(audio);
    let mut sample_count = 0u32;
    let mut min_sample = i16::MAX;
    let mut max_sample = i16::MIN;

    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        sample_count += 1;
        min_sample = min_sample.min(sample);
        max_sample = max_sample.max(sample);
        if sample_count >= 1000 {
            break;
        }
    }

    let dynamic_range = (max_sample as i32) - (min_sample as i32);
    if sample_count >= 1000 && dynamic_range < 100 {
        tracing::warn!(dynamic_range, "Chunk has very low dynamic range, may be silence");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::gateway::{Classification, SpeechAnalyzer};
    use crate::config::AppConfig;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FixedAnalyzer {
        risk_score: f32,
    }

    #[async_trait]
    impl SpeechAnalyzer for FixedAnalyzer {
        async fn transcribe_and_classify(&self, _audio: &[u8]) -> anyhow::Result<Classification> {
            Ok(Classification {
                transcript: "please verify your account".to_string(),
                risk_score: self.risk_score,
            })
        }
    }

    /// Store whose metadata table is down but whose bucket works.
    struct FlakyMetadataStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl ArtifactStore for FlakyMetadataStore {
        async fn put_artifact(&self, name: &str, bytes: &[u8]) -> anyhow::Result<String> {
            self.inner.put_artifact(name, bytes).await
        }

        async fn record_metadata(&self, _record: &ChunkRecord) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("table unavailable"))
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ArtifactStore for BrokenStore {
        async fn put_artifact(&self, _name: &str, _bytes: &[u8]) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("bucket unreachable"))
        }

        async fn record_metadata(&self, _record: &ChunkRecord) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn ingestor_with(store: Arc<dyn ArtifactStore>, risk: f32) -> ChunkIngestor {
        let config = AppConfig::default();
        let gateway = AnalysisGateway::new(
            Arc::new(FixedAnalyzer { risk_score: risk }),
            Duration::from_secs(config.analysis.gateway_timeout_secs),
        );
        ChunkIngestor::new(
            gateway,
            store,
            Duration::from_secs(config.storage.put_timeout_secs),
        )
    }

    fn pcm_chunk() -> Vec<u8> {
        // Small sine-ish pattern so the dynamic-range scan sees real audio
        let mut data = Vec::new();
        for i in 0..64 {
            let sample = ((i as f32 * 0.5).sin() * 10000.0) as i16;
            data.extend_from_slice(&sample.to_le_bytes());
        }
        data
    }

    #[tokio::test]
    async fn test_ingest_produces_result_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let ingestor = ingestor_with(store.clone(), 0.3);

        let result = ingestor.ingest("c1", 0, &pcm_chunk()).await.unwrap();
        assert_eq!(result.call_id, "c1");
        assert_eq!(result.chunk_number, 0);
        assert_eq!(result.risk_score, 0.3);
        assert!(result.artifact_url.starts_with("memory://c1_0_"));

        assert_eq!(store.artifact_count(), 1);
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].call_id, "c1");
        assert_eq!(records[0].transcript, "please verify your account");
    }

    #[tokio::test]
    async fn test_invalid_chunks_rejected() {
        let ingestor = ingestor_with(Arc::new(MemoryStore::new()), 0.3);

        let err = ingestor.ingest("c1", 0, &[]).await.unwrap_err();
        assert_eq!(err.code(), "invalid_chunk");

        let err = ingestor.ingest("c1", 0, &[0u8; 15]).await.unwrap_err();
        assert_eq!(err.code(), "invalid_chunk");
    }

    #[tokio::test]
    async fn test_storage_failure_fails_closed() {
        let ingestor = ingestor_with(Arc::new(BrokenStore), 0.3);
        let err = ingestor.ingest("c1", 0, &pcm_chunk()).await.unwrap_err();
        assert_eq!(err.code(), "storage_failure");
        assert!(err.to_string().contains("bucket unreachable"));
    }

    /// An artifact write that hangs is bounded by the storage timeout.
    #[tokio::test]
    async fn test_storage_hang_fails_closed() {
        struct HangingStore;

        #[async_trait]
        impl ArtifactStore for HangingStore {
            async fn put_artifact(&self, _name: &str, _bytes: &[u8]) -> anyhow::Result<String> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!()
            }

            async fn record_metadata(&self, _record: &ChunkRecord) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let config = AppConfig::default();
        let gateway = AnalysisGateway::new(
            Arc::new(FixedAnalyzer { risk_score: 0.3 }),
            Duration::from_secs(config.analysis.gateway_timeout_secs),
        );
        let ingestor = ChunkIngestor::new(gateway, Arc::new(HangingStore), Duration::from_millis(20));

        let err = ingestor.ingest("c1", 0, &pcm_chunk()).await.unwrap_err();
        assert_eq!(err.code(), "storage_failure");
        assert!(err.to_string().contains("timed out"));
    }

    /// A failed metadata row must not fail the chunk.
    #[tokio::test]
    async fn test_metadata_failure_is_tolerated() {
        let store = Arc::new(FlakyMetadataStore { inner: MemoryStore::new() });
        let ingestor = ingestor_with(store, 0.3);
        let result = ingestor.ingest("c1", 4, &pcm_chunk()).await.unwrap();
        assert_eq!(result.chunk_number, 4);
    }
}
