// ── In-flight gate ──
//
// Single-holder lock around outbound API calls. Holding the permit is the
// only way to talk to the gateway, so at most one request is outstanding.

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::CoreError;

#[derive(Debug)]
pub struct InFlightGate {
    permits: Semaphore,
}

impl InFlightGate {
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(1),
        }
    }

    /// Take the gate if free. Timer ticks use this and skip when held.
    pub fn try_enter(&self) -> Option<SemaphorePermit<'_>> {
        self.permits.try_acquire().ok()
    }

    /// Wait for the gate. Used by user-initiated calls that must not be dropped.
    ///
    /// Fails with [`CoreError::ShutDown`] once the gate is closed.
    pub async fn enter(&self) -> Result<SemaphorePermit<'_>, CoreError> {
        self.permits.acquire().await.map_err(|_| CoreError::ShutDown)
    }

    /// Refuse all future entries and wake waiters with `ShutDown`.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn is_held(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

impl Default for InFlightGate {
    fn default() -> Self {
        Self::new()
    }
}
