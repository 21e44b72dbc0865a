//! # Event Broadcast
//!
//! Fan-out of call events to every observer currently watching a call.
//!
//! ## Key Components:
//! - **Broadcast Hub**: process-wide map of call id to subscriber set, with
//!   timed per-subscriber delivery and self-healing removal of broken ones
//! - **Subscription**: one bounded delivery channel handed to an observer,
//!   consumable directly or as a `Stream`
//!
//! Delivery is push-only and at-most-once per subscriber: apart from the
//! one snapshot event a late joiner receives, there is no buffering or
//! backlog beyond each subscription's bounded channel.

pub mod hub;           // Subscriber registry and fan-out
pub mod subscription;  // The observer's end of a delivery channel

pub use hub::BroadcastHub;
pub use subscription::Subscription;
