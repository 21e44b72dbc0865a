//! # Callguard - Real-Time Call Monitoring Core
//!
//! In-memory coordinator for live phone-call phishing monitoring. A call
//! arrives as a stream of short, numbered audio chunks; each chunk is
//! persisted, transcribed and risk-scored through an external analyzer,
//! folded into its call session, matched against the alert thresholds, and
//! fanned out to every observer watching that call.
//!
//! ## Application Architecture:
//! - **config**: layered configuration (TOML file + environment variables)
//! - **error**: the typed failure taxonomy of the pipeline
//! - **events**: the tagged event union delivered to subscribers
//! - **analysis**: chunk validation, artifact persistence, and the bounded
//!   gateway to the external transcription+classification collaborator
//! - **session**: per-call state and the process-wide session registry
//! - **alerts**: threshold policy turning risk scores into alerts
//! - **broadcast**: the subscriber registry and event fan-out
//! - **storage**: the durable-storage collaborator seam
//! - **coordinator**: the orchestrating facade the ingress layer drives
//!
//! The ingress surface itself (HTTP, WebSocket, CLI), audio capture, the ML
//! models, and remote storage all live outside this crate; it talks to them
//! through the `SpeechAnalyzer` and `ArtifactStore` traits and the
//! `CallCoordinator` API.
//!
//! ## Construction:
//! Build an [`AppConfig`], validate it, and hand it to
//! [`CallCoordinator::new`] together with the two collaborators. The
//! coordinator owns all shared state; nothing in this crate is a global.

pub mod alerts;       // Threshold-based alert policy (alerts.rs)
pub mod analysis;     // Chunk ingestion and the analyzer gateway (analysis/ directory)
pub mod broadcast;    // Subscriber registry and event fan-out (broadcast/ directory)
pub mod config;       // Configuration management (config.rs)
pub mod coordinator;  // Orchestrating facade (coordinator.rs)
pub mod error;        // Error handling types (error.rs)
pub mod events;       // Subscriber event union (events.rs)
pub mod session;      // Call sessions and their registry (session/ directory)
pub mod storage;      // Durable storage collaborator seam (storage.rs)

pub use alerts::{Alert, AlertEngine, Severity};
pub use analysis::{AnalysisGateway, AnalysisResult, ChunkIngestor, Classification, SpeechAnalyzer};
pub use broadcast::{BroadcastHub, Subscription};
pub use config::{AlertConfig, AnalysisConfig, AppConfig, BroadcastConfig, StorageConfig};
pub use coordinator::CallCoordinator;
pub use error::{MonitorError, MonitorResult};
pub use events::CallEvent;
pub use session::{CallSnapshot, CallStatus, CallSummary, SessionRegistry};
pub use storage::{ArtifactStore, ChunkRecord, MemoryStore};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing (logging) system for a process embedding this
/// crate.
///
/// ## Environment Variables:
/// - `RUST_LOG`: controls what gets logged (e.g., "debug", "callguard=debug")
/// - If not set, defaults to "callguard=debug"
///
/// Uses `try_init` so an embedding process that already installed its own
/// subscriber gets an error back instead of a panic.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "callguard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {}", err))
}
