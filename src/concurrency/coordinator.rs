//! Per-repository push coordination
//!
//! At most one push lease exists per repository identity (`host/path`).
//! Further acquirers queue in FIFO order on the identity's own async mutex; a
//! single coarse lock guards the identity table. A lease releases on drop, so
//! finishing, failing, cancelling or aborting the task that owns it all free
//! the identity. A waiter whose future is dropped leaves the queue the same
//! way. Entries are reaped once nobody holds or waits for them.

use crate::error::{ResolverError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
struct Slot {
    lock: Arc<tokio::sync::Mutex<()>>,
    holders: usize,
    waiters: usize,
}

impl Slot {
    fn is_held(&self) -> bool {
        self.holders > 0 || self.lock.try_lock().is_err()
    }
}

#[derive(Debug, Default)]
struct State {
    slots: HashMap<String, Slot>,
    granted: u64,
    released: u64,
    cancelled: u64,
}

enum Exit {
    Cancelled,
    Released,
}

impl State {
    fn leave(&mut self, identity: &str, exit: Exit) {
        let Some(slot) = self.slots.get_mut(identity) else {
            return;
        };
        match exit {
            Exit::Cancelled => {
                slot.waiters = slot.waiters.saturating_sub(1);
                self.cancelled += 1;
            }
            Exit::Released => {
                slot.holders = slot.holders.saturating_sub(1);
                self.released += 1;
            }
        }
        if slot.holders == 0 && slot.waiters == 0 {
            self.slots.remove(identity);
        }
    }
}

/// Snapshot of one identity's lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub held: bool,
    pub waiters: usize,
}

/// Lease counters since the coordinator was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatistics {
    pub leases_granted: u64,
    pub leases_released: u64,
    pub waits_cancelled: u64,
    pub active_leases: usize,
    pub waiting: usize,
    pub tracked_identities: usize,
}

/// Process-wide push serializer, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct OperationCoordinator {
    state: Arc<Mutex<State>>,
}

impl OperationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Bookkeeping stays consistent even if a holder panicked mid-update
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for the push slot of `identity`.
    ///
    /// Never fails: the caller is queued behind earlier acquirers and resumes
    /// once every one of them has released. Dropping the returned future
    /// withdraws the caller from the queue.
    pub async fn acquire(&self, identity: &str) -> PushLease {
        let (lock, mut ticket) = {
            let mut state = self.state();
            let slot = state.slots.entry(identity.to_string()).or_default();
            slot.waiters += 1;
            let lock = slot.lock.clone();
            (
                lock,
                WaitTicket {
                    state: self.state.clone(),
                    identity: identity.to_string(),
                    armed: true,
                },
            )
        };

        let started = Instant::now();
        let guard = lock.lock_owned().await;

        {
            let mut state = self.state();
            if let Some(slot) = state.slots.get_mut(identity) {
                slot.waiters = slot.waiters.saturating_sub(1);
                slot.holders += 1;
            }
            state.granted += 1;
            ticket.armed = false;
        }

        let lease = PushLease::new(self.state.clone(), identity, guard);
        debug!(
            identity,
            lease_id = %lease.id,
            waited_ms = started.elapsed().as_millis() as u64,
            "push lease granted"
        );
        lease
    }

    /// Take the push slot only if nobody holds or awaits it.
    ///
    /// A queued acquirer counts even before it has reached the mutex, so this
    /// never overtakes the FIFO queue.
    ///
    /// # Errors
    ///
    /// [`ResolverError::PushInProgress`] when another push owns or awaits the
    /// identity.
    pub fn try_acquire(&self, identity: &str) -> Result<PushLease> {
        let mut state = self.state();
        let slot = state.slots.entry(identity.to_string()).or_default();
        let attempt = if slot.waiters == 0 {
            slot.lock.clone().try_lock_owned().ok()
        } else {
            None
        };
        match attempt {
            Some(guard) => {
                slot.holders += 1;
                state.granted += 1;
                drop(state);
                Ok(PushLease::new(self.state.clone(), identity, guard))
            }
            None => Err(ResolverError::PushInProgress {
                identity: identity.to_string(),
            }),
        }
    }

    /// Race [`acquire`](Self::acquire) against `cancel`.
    ///
    /// # Errors
    ///
    /// [`ResolverError::LeaseCancelled`] when `cancel` completes first; the
    /// caller has then left the queue.
    pub async fn acquire_or_cancel<C>(&self, identity: &str, cancel: C) -> Result<PushLease>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            lease = self.acquire(identity) => Ok(lease),
            _ = cancel => {
                debug!(identity, "push lease wait cancelled");
                Err(ResolverError::LeaseCancelled { identity: identity.to_string() })
            }
        }
    }

    /// Run `operation` while holding the push slot of `identity`
    pub async fn run_exclusive<F, T>(&self, identity: &str, operation: F) -> T
    where
        F: Future<Output = T>,
    {
        let _lease = self.acquire(identity).await;
        operation.await
    }

    /// Run `operation` under the push slot on its own task.
    ///
    /// Aborting the returned handle drops the lease (or the queued wait) with
    /// the task.
    pub fn spawn_exclusive<F, T>(&self, identity: impl Into<String>, operation: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let coordinator = self.clone();
        let identity = identity.into();
        tokio::spawn(async move { coordinator.run_exclusive(&identity, operation).await })
    }

    /// Whether a push of `identity` currently holds the slot
    pub fn is_in_progress(&self, identity: &str) -> bool {
        self.state().slots.get(identity).is_some_and(Slot::is_held)
    }

    pub fn status(&self, identity: &str) -> Option<SlotStatus> {
        self.state().slots.get(identity).map(|slot| SlotStatus {
            held: slot.is_held(),
            waiters: slot.waiters,
        })
    }

    pub fn statistics(&self) -> CoordinatorStatistics {
        let state = self.state();
        CoordinatorStatistics {
            leases_granted: state.granted,
            leases_released: state.released,
            waits_cancelled: state.cancelled,
            active_leases: state.slots.values().map(|s| s.holders).sum(),
            waiting: state.slots.values().map(|s| s.waiters).sum(),
            tracked_identities: state.slots.len(),
        }
    }
}

/// Queue position of a pending acquire; leaving it armed means cancelled
struct WaitTicket {
    state: Arc<Mutex<State>>,
    identity: String,
    armed: bool,
}

impl Drop for WaitTicket {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.leave(&self.identity, Exit::Cancelled);
        }
    }
}

/// Exclusive push slot for one repository identity, released on drop
pub struct PushLease {
    pub id: String,
    identity: String,
    acquired_at: Instant,
    state: Arc<Mutex<State>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PushLease {
    fn new(state: Arc<Mutex<State>>, identity: &str, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            identity: identity.to_string(),
            acquired_at: Instant::now(),
            state,
            guard: Some(guard),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Release explicitly; equivalent to dropping the lease
    pub fn release(self) {}
}

impl std::fmt::Debug for PushLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushLease")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("held_for", &self.held_for())
            .finish()
    }
}

impl Drop for PushLease {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        // Hand the mutex to the next waiter before the entry can be reaped, so
        // a newcomer never gets a fresh mutex while this lease is still live.
        drop(self.guard.take());
        state.leave(&self.identity, Exit::Released);
        debug!(
            identity = %self.identity,
            lease_id = %self.id,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "push lease released"
        );
    }
}
