//! # Configuration Management
//!
//! This module handles loading and managing pipeline configuration from
//! multiple sources:
//! - TOML configuration files (callguard.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_ALERTS_HIGH_THRESHOLD, etc.)
//! 2. Configuration file (callguard.toml)
//! 3. Default values (defined in the Default impl)
//!
//! All tunable policy lives here: the alert thresholds, the analysis
//! timeout, and the broadcast heartbeat/delivery budgets. The defaults are
//! the documented policy values; deployments override them per environment.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Top-level pipeline configuration.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (analysis, alerts, broadcast)
/// keeps each component's knobs next to each other and lets components
/// borrow only the group they care about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub storage: StorageConfig,
    pub alerts: AlertConfig,
    pub broadcast: BroadcastConfig,
}

/// Analysis gateway settings.
///
/// ## Fields:
/// - `gateway_timeout_secs`: upper bound on one transcription+classification
///   call; a chunk whose analysis exceeds this is failed, never recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub gateway_timeout_secs: u64,
}

/// Storage collaborator settings.
///
/// ## Fields:
/// - `put_timeout_secs`: upper bound on one artifact write; a chunk whose
///   artifact cannot be persisted in time is failed, never analyzed unstored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub put_timeout_secs: u64,
}

/// Alerting policy.
///
/// ## Fields:
/// - `medium_threshold`: risk scores strictly above this raise a medium alert
/// - `high_threshold`: risk scores strictly above this raise a high alert
/// - `snippet_max_chars`: transcript excerpt length carried on an alert
///
/// Scores at or below `medium_threshold` raise nothing. The thresholds are
/// compared per chunk with no smoothing across chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub medium_threshold: f32,
    pub high_threshold: f32,
    pub snippet_max_chars: usize,
}

/// Broadcast hub tuning.
///
/// ## Fields:
/// - `heartbeat_interval_ms`: idle subscriptions receive a heartbeat at this
///   cadence so transport idle timeouts do not fire
/// - `send_timeout_ms`: per-subscriber delivery budget; a subscriber that
///   cannot accept an event within it is dropped
/// - `channel_capacity`: bounded queue depth per subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    pub heartbeat_interval_ms: u64,
    pub send_timeout_ms: u64,
    pub channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig {
                gateway_timeout_secs: 30,  // Transcription of a 5-10s chunk is well under this
            },
            storage: StorageConfig {
                put_timeout_secs: 10,
            },
            alerts: AlertConfig {
                medium_threshold: 0.6,
                high_threshold: 0.8,
                snippet_max_chars: 160,
            },
            broadcast: BroadcastConfig {
                heartbeat_interval_ms: 1000,
                send_timeout_ms: 250,
                channel_capacity: 32,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from callguard.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    ///
    /// ## Environment Variable Examples:
    /// - `APP_ALERTS_HIGH_THRESHOLD=0.9`: raise the high-alert bar
    /// - `APP_BROADCAST_HEARTBEAT_INTERVAL_MS=5000`: slower heartbeats
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("callguard").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Thresholds are inside [0, 1] and ordered medium < high
    /// - The analysis timeout and broadcast budgets are non-zero
    ///
    /// Catching configuration errors at startup beats discovering a zero
    /// channel capacity at the first publish.
    pub fn validate(&self) -> Result<()> {
        if self.analysis.gateway_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Analysis gateway timeout cannot be 0"));
        }

        if self.storage.put_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Artifact write timeout cannot be 0"));
        }

        let alerts = &self.alerts;
        if !(0.0..=1.0).contains(&alerts.medium_threshold)
            || !(0.0..=1.0).contains(&alerts.high_threshold)
        {
            return Err(anyhow::anyhow!("Alert thresholds must be within [0.0, 1.0]"));
        }
        if alerts.medium_threshold >= alerts.high_threshold {
            return Err(anyhow::anyhow!(
                "Medium threshold ({}) must be below high threshold ({})",
                alerts.medium_threshold,
                alerts.high_threshold
            ));
        }
        if alerts.snippet_max_chars == 0 {
            return Err(anyhow::anyhow!("Alert snippet length must be greater than 0"));
        }

        if self.broadcast.heartbeat_interval_ms == 0 {
            return Err(anyhow::anyhow!("Heartbeat interval must be greater than 0"));
        }
        if self.broadcast.send_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Subscriber send timeout must be greater than 0"));
        }
        if self.broadcast.channel_capacity == 0 {
            return Err(anyhow::anyhow!("Subscription channel capacity must be greater than 0"));
        }

        Ok(())
    }
}
