//! Bridge from the stack's notification callback into an [`EventRegistry`].

use tracing::{debug, trace, warn};

use crate::error::CaptureError;
use crate::event::{CapturedEvent, RawNotification};
use crate::network::NotificationSink;
use crate::registry::EventRegistry;

/// The single entry point the stack invokes for every notification.
///
/// Snapshots the raw notification into a [`CapturedEvent`] and dispatches
/// it. The raw memory is only ever read.
#[derive(Clone, Debug)]
pub struct CallbackAdapter {
    registry: EventRegistry,
}

impl CallbackAdapter {
    pub fn new(registry: EventRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Captures and dispatches `raw`, returning how many waiters it
    /// resolved.
    ///
    /// # Safety
    ///
    /// Same contract as [`CapturedEvent::capture`].
    pub unsafe fn deliver(&self, raw: &RawNotification) -> Result<usize, CaptureError> {
        // SAFETY: forwarded from the caller.
        let event = unsafe { CapturedEvent::capture(raw) }?;
        let code = event.code;
        trace!(?event, "captured notification");
        let matched = self.registry.dispatch(event);
        debug!(event = %code, matched, "notification");
        Ok(matched)
    }
}

impl NotificationSink for CallbackAdapter {
    unsafe fn on_notification(&self, raw: &RawNotification) {
        // SAFETY: the stack upholds the sink contract for `raw`.
        if let Err(err) = unsafe { self.deliver(raw) } {
            warn!(%err, "dropping notification");
        }
    }
}
