//! # Subscription
//!
//! The observer's end of a per-call delivery channel. The hub keeps the
//! sending half; dropping this receiver is how an observer disconnects —
//! the hub notices the closed channel at the next delivery and cleans up.

use crate::events::CallEvent;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// A live, directional event channel bound to exactly one call.
pub struct Subscription {
    id: u64,
    call_id: String,
    rx: mpsc::Receiver<CallEvent>,
}

impl Subscription {
    pub(crate) fn new(id: u64, call_id: String, rx: mpsc::Receiver<CallEvent>) -> Self {
        Self { id, call_id, rx }
    }

    /// Hub-assigned subscriber id, unique for the process lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The call this subscription watches.
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Wait for the next event. Returns `None` once the hub has dropped
    /// this subscriber (slow-consumer eviction or hub shutdown).
    pub async fn recv(&mut self) -> Option<CallEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll for an already-delivered event.
    pub fn try_recv(&mut self) -> Option<CallEvent> {
        self.rx.try_recv().ok()
    }

    /// Consume the subscription as a `Stream`, the shape transport
    /// adapters want for forwarding events onto a connection.
    pub fn into_stream(self) -> ReceiverStream<CallEvent> {
        ReceiverStream::new(self.rx)
    }
}
