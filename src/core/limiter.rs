//! Resizable concurrency limiter
//!
//! A counting semaphore whose capacity can change while permits are out.
//! The underlying [`tokio::sync::Semaphore`] is never replaced: growing adds
//! permits, shrinking forgets currently available permits and carries any
//! remainder as a deficit settled as holders release. Permits granted under
//! the old capacity stay valid and release exactly once through their RAII
//! guard.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Resizable bound on simultaneous in-flight requests.
#[derive(Debug)]
pub struct ConcurrencyLimiter {
    inner: Arc<LimiterInner>,
}

#[derive(Debug)]
struct LimiterInner {
    semaphore: Arc<Semaphore>,
    state: Mutex<LimiterState>,
}

#[derive(Debug)]
struct LimiterState {
    /// Desired capacity, as last configured
    target: usize,
    /// Permit slots in existence: available plus held. Converges to
    /// `target` as any shrink deficit is settled.
    granted: usize,
}

/// RAII slot guard; dropping it returns the slot, or retires it while a
/// shrink deficit is outstanding.
#[derive(Debug)]
pub struct LimiterPermit {
    permit: Option<OwnedSemaphorePermit>,
    inner: Arc<LimiterInner>,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(LimiterInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                state: Mutex::new(LimiterState {
                    target: capacity,
                    granted: capacity,
                }),
            }),
        }
    }

    /// Capacity as last configured by [`resize`](Self::resize).
    pub fn capacity(&self) -> usize {
        self.inner.state.lock().target
    }

    /// Permits available right now. In-flight acquisitions and an unsettled
    /// shrink deficit both reduce this number.
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Change the capacity in place.
    ///
    /// Growing takes effect immediately. Shrinking removes only permits that
    /// are currently available; if more permits than the new capacity are in
    /// flight, the remainder is retired as holders release. Safe to call
    /// every loop iteration.
    pub fn resize(&self, new_capacity: usize) {
        let mut state = self.inner.state.lock();
        state.target = new_capacity.max(1);
        if state.granted < state.target {
            self.inner
                .semaphore
                .add_permits(state.target - state.granted);
            state.granted = state.target;
        } else if state.granted > state.target {
            // forget_permits only removes currently available permits; the
            // remainder is retired by LimiterPermit::drop as holders
            // release.
            state.granted -= self
                .inner
                .semaphore
                .forget_permits(state.granted - state.target);
        }
    }

    /// Wait for a slot. Blocks the caller while the limiter is at capacity,
    /// which is the engine's backpressure mechanism.
    pub async fn acquire(&self) -> LimiterPermit {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");
        LimiterPermit {
            permit: Some(permit),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        let mut state = self.inner.state.lock();
        if state.granted > state.target {
            state.granted -= 1;
            drop(state);
            // Retire the slot instead of returning it.
            permit.forget();
        }
        // Otherwise the permit drops normally and the slot becomes
        // available again.
    }
}
