//! Table of live calls, shared by every bridge in the process.
//!
//! A slot is reserved before the media WebSocket is upgraded and released
//! when the [`CallPermit`] is dropped, which the bridge does on reaching
//! `Closed`. The count and the table never disagree for longer than a drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashSet;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("maximum concurrent calls reached ({0})")]
    AtCapacity(usize),
}

#[derive(Debug)]
pub struct BridgeRegistry {
    calls: DashSet<Uuid>,
    active: AtomicUsize,
    max_calls: Option<usize>,
}

impl BridgeRegistry {
    /// `max_calls` of `None` admits any number of calls.
    pub fn new(max_calls: Option<usize>) -> Self {
        Self {
            calls: DashSet::new(),
            active: AtomicUsize::new(0),
            max_calls,
        }
    }

    /// Reserve a slot for a new call.
    pub fn try_reserve(self: &Arc<Self>) -> Result<CallPermit, CapacityError> {
        let reserved = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match self.max_calls {
                Some(max) if current >= max => None,
                _ => Some(current + 1),
            });

        match reserved {
            Ok(_) => {
                let id = Uuid::new_v4();
                self.calls.insert(id);
                Ok(CallPermit {
                    id,
                    registry: Arc::clone(self),
                })
            }
            Err(current) => Err(CapacityError::AtCapacity(current)),
        }
    }

    /// Calls holding a permit.
    pub fn active_calls(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn max_calls(&self) -> Option<usize> {
        self.max_calls
    }

    fn release(&self, id: &Uuid) {
        if self.calls.remove(id).is_some() {
            self.active.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Default for BridgeRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

/// A reserved call slot. Dropping it removes the call from the registry.
#[derive(Debug)]
pub struct CallPermit {
    id: Uuid,
    registry: Arc<BridgeRegistry>,
}

impl CallPermit {
    /// The call id, also used as the session id.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        self.registry.release(&self.id);
    }
}
