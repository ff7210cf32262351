//! Compilation multiplexing
//!
//! One compiler connection carries every concurrent compilation; the
//! registry maps compilation ids to the event channel of the driver that
//! owns them. Ids are allocated monotonically within a child lifetime,
//! never 0 (that addresses the compiler itself), wrapping to the smallest
//! free id on overflow.
//!
//! The registry's mutex is held only for map operations, never across an
//! await and never around user code.

use crate::compilation::CompilationEvent;
use sass_protocol::messages::{OutboundMessage, outbound_message};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, trace};

/// Where an inbound frame ended up.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RouteOutcome {
    Delivered,
    /// No compilation owns this id. Stale log events are dropped; anything
    /// else at an unknown id is a protocol violation the caller escalates.
    UnknownId,
}

struct RegistryInner {
    active: HashMap<u32, mpsc::UnboundedSender<CompilationEvent>>,
    next_id: u32,
}

/// The live-compilation table.
pub(crate) struct Registry {
    inner: Mutex<RegistryInner>,
    idle: Notify,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                active: HashMap::new(),
                next_id: 1,
            }),
            idle: Notify::new(),
        }
    }

    /// Allocate an id for a new compilation and register its event
    /// channel.
    pub(crate) fn register(
        &self,
        events: mpsc::UnboundedSender<CompilationEvent>,
    ) -> u32 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            let id = inner.next_id;
            // Wrapping skips 0: the smallest free id wins after overflow
            inner.next_id = match inner.next_id.checked_add(1) {
                Some(next) => next,
                None => 1,
            };
            if id != 0 && !inner.active.contains_key(&id) {
                inner.active.insert(id, events);
                trace!(id, active = inner.active.len(), "registered compilation");
                return id;
            }
        }
    }

    /// Drop a finished compilation. Its id becomes reusable.
    pub(crate) fn deregister(&self, id: u32) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.active.remove(&id);
        let empty = inner.active.is_empty();
        drop(inner);
        if empty {
            self.idle.notify_waiters();
        }
    }

    /// Forward a frame to the compilation that owns it.
    pub(crate) fn route(&self, id: u32, message: OutboundMessage) -> RouteOutcome {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.active.get(&id) {
            Some(events) => {
                // A send error means the driver already finished; treat
                // like an unknown id
                if events.send(CompilationEvent::Inbound(message)).is_ok() {
                    RouteOutcome::Delivered
                } else {
                    RouteOutcome::UnknownId
                }
            }
            None => RouteOutcome::UnknownId,
        }
    }

    /// True when a message at an unknown id may be silently dropped.
    pub(crate) fn droppable_when_stale(message: &OutboundMessage) -> bool {
        matches!(
            message.message,
            Some(outbound_message::Message::LogEvent(_))
        )
    }

    /// Cancel every in-flight compilation with a lifecycle reason.
    pub(crate) fn cancel_all(&self, reason: &str) {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        debug!(count = inner.active.len(), reason, "cancelling compilations");
        for events in inner.active.values() {
            let _ = events.send(CompilationEvent::Cancelled(reason.to_string()));
        }
    }

    /// Fail every in-flight compilation because the child broke.
    pub(crate) fn break_all(&self, reason: &str) {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        debug!(count = inner.active.len(), reason, "breaking compilations");
        for events in inner.active.values() {
            let _ = events.send(CompilationEvent::ChildBroken(reason.to_string()));
        }
    }

    pub(crate) fn active_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .active
            .len()
    }

    /// Wait until no compilation is in flight.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let wait = self.idle.notified();
            if self.active_count() == 0 {
                return;
            }
            wait.await;
        }
    }
}
