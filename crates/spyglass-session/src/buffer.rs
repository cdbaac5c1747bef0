//! Outbound event buffer.
//!
//! Events queued before (or alongside) a live session land here. The buffer
//! is the durable half of dual retention: forwarding an event to a session
//! does not drain it, so a session created later still replays the full
//! history. `purge` is the only forget path; after it the buffer is gone
//! and further appends are no-ops.

use std::collections::VecDeque;

use spyglass_core::InspectionEvent;

/// FIFO of outbound events, releasable in one shot.
pub(crate) struct OutboundBuffer {
    events: Option<VecDeque<InspectionEvent>>,
}

impl OutboundBuffer {
    /// New active, empty buffer.
    pub(crate) fn new() -> Self {
        Self { events: Some(VecDeque::new()) }
    }

    /// Append a copy of `event`. Returns `false` once purged.
    pub(crate) fn append(&mut self, event: InspectionEvent) -> bool {
        match self.events.as_mut() {
            Some(events) => {
                events.push_back(event);
                true
            }
            None => false,
        }
    }

    /// In-order copy of everything retained.
    pub(crate) fn snapshot(&self) -> Vec<InspectionEvent> {
        self.events
            .as_ref()
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop all retained events and deactivate.
    pub(crate) fn purge(&mut self) {
        self.events = None;
    }

    /// Active until purged.
    pub(crate) fn is_active(&self) -> bool {
        self.events.is_some()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.events.as_ref().map_or(0, VecDeque::len)
    }
}
