//! # Chunk Analysis Pipeline
//!
//! Everything between a raw audio chunk and its recorded analysis result:
//!
//! - **Analysis Gateway**: wraps the external transcription+classification
//!   collaborator behind one bounded call with distinct timeout/failure
//!   errors
//! - **Chunk Ingestor**: validates a chunk, persists its artifact, runs it
//!   through the gateway, and produces an [`AnalysisResult`]
//!
//! Neither component touches session state; recording the result into its
//! session is the registry's job, which keeps ingestion testable with mock
//! collaborators alone.

pub mod gateway;   // Bounded wrapper around the external analyzer
pub mod ingestor;  // Chunk validation, persistence, and analysis

pub use gateway::{AnalysisGateway, Classification, SpeechAnalyzer};
pub use ingestor::{AnalysisResult, ChunkIngestor};
