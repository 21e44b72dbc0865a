//! # Artifact Storage Collaborator
//!
//! The durable side of chunk ingestion lives outside this crate (an object
//! store for the raw audio plus a metadata table). This module defines the
//! seam: the [`ArtifactStore`] trait the ingestor writes through, the
//! [`ChunkRecord`] row shape, and an in-memory implementation for tests and
//! embedded use.
//!
//! Both writes are best-effort durable writes outside the transactional
//! boundary of session state: a metadata-write failure is logged and
//! accepted, never rolled back into the in-memory session.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Metadata row persisted for every analyzed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub call_id: String,
    pub chunk_number: u64,
    pub artifact_name: String,
    pub artifact_url: String,
    pub transcript: String,
    pub risk_score: f32,
}

/// Durable storage for chunk artifacts and their metadata rows.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist one raw audio chunk; returns the artifact's location as an
    /// opaque URL.
    async fn put_artifact(&self, name: &str, bytes: &[u8]) -> anyhow::Result<String>;

    /// Persist the metadata row for an analyzed chunk.
    async fn record_metadata(&self, record: &ChunkRecord) -> anyhow::Result<()>;
}

/// In-memory store: a map of artifacts and a list of metadata rows.
///
/// Useful for tests and for running the pipeline without any remote
/// storage configured.
pub struct MemoryStore {
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
    records: Mutex<Vec<ChunkRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            artifacts: Mutex::new(HashMap::new()),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.lock().unwrap().len()
    }

    pub fn records(&self) -> Vec<ChunkRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn put_artifact(&self, name: &str, bytes: &[u8]) -> anyhow::Result<String> {
        let mut artifacts = self.artifacts.lock().unwrap();
        artifacts.insert(name.to_string(), bytes.to_vec());
        Ok(format!("memory://{}", name))
    }

    async fn record_metadata(&self, record: &ChunkRecord) -> anyhow::Result<()> {
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(())
    }
}
