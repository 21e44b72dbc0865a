//! # Call Session Management
//!
//! This module owns the in-memory state for every phone call under
//! monitoring. Each session accumulates the per-chunk analysis results and
//! the alerts they triggered, and the registry is the single source of truth
//! for that state.
//!
//! ## Key Components:
//! - **Call Session**: accumulated state for one call (results, alerts,
//!   lifecycle status)
//! - **Session Registry**: process-wide map of call id to session, with
//!   per-call locking so unrelated calls never contend
//!
//! Session state is ephemeral: it lives for the process lifetime only, and
//! is rebuilt from durable storage (outside this crate) if that is ever
//! needed after a restart.

pub mod call;      // Per-call accumulated state and lifecycle
pub mod registry;  // Process-wide session map

pub use call::{CallSession, CallSnapshot, CallStatus, CallSummary};
pub use registry::SessionRegistry;
