//! Single-flight coordination of token refresh and re-authentication
//!
//! At most one refresh or login call is outstanding at any time. The first
//! caller to find the coordinator idle becomes the leader and receives a
//! [`RefreshGuard`]; everyone arriving while the guard is alive gets a
//! [`Waiter`] that resolves with the leader's outcome.
//!
//! The guard owns the in-flight state. Releasing it (explicitly or by drop)
//! returns the coordinator to idle and settles every waiter, so no exit path
//! can leave later callers queued forever.

use std::sync::{Mutex, MutexGuard};

use registry_auth::Error as AuthError;
use tokio::sync::oneshot;
use tracing::debug;

/// Outcome delivered to queued callers: the new token or the reason there is none.
pub type Outcome = std::result::Result<String, AuthError>;

#[derive(Debug, Default)]
enum FlightState {
    #[default]
    Idle,
    InFlight {
        waiters: Vec<oneshot::Sender<Outcome>>,
    },
}

/// Coordinator guaranteeing a single in-flight refresh.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<FlightState>,
}

/// Result of [`RefreshCoordinator::acquire_or_join`].
#[derive(Debug)]
pub enum Slot<'a> {
    /// Caller must perform the refresh and release the guard.
    Leader(RefreshGuard<'a>),
    /// A refresh is already running; wait for it.
    Follower(Waiter),
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Become the leader if idle, otherwise queue behind the running flight.
    pub fn acquire_or_join(&self) -> Slot<'_> {
        let mut state = self.lock();
        match &mut *state {
            FlightState::Idle => {
                *state = FlightState::InFlight {
                    waiters: Vec::new(),
                };
                debug!("refresh flight started");
                Slot::Leader(RefreshGuard {
                    coordinator: self,
                    released: false,
                })
            }
            FlightState::InFlight { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                debug!(queued = waiters.len(), "joined in-flight refresh");
                Slot::Follower(Waiter { rx })
            }
        }
    }

    /// Whether a refresh is currently running.
    pub fn is_in_flight(&self) -> bool {
        matches!(*self.lock(), FlightState::InFlight { .. })
    }

    /// Number of callers waiting on the current flight.
    pub fn queued(&self) -> usize {
        match &*self.lock() {
            FlightState::Idle => 0,
            FlightState::InFlight { waiters } => waiters.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FlightState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the current waiters, optionally returning to idle.
    fn drain(&self, finish: bool) -> Vec<oneshot::Sender<Outcome>> {
        let mut state = self.lock();
        let waiters = match &mut *state {
            FlightState::Idle => Vec::new(),
            FlightState::InFlight { waiters } => std::mem::take(waiters),
        };
        if finish {
            *state = FlightState::Idle;
        }
        waiters
    }
}

/// Proof of leadership over the in-flight refresh.
#[derive(Debug)]
pub struct RefreshGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    released: bool,
}

impl RefreshGuard<'_> {
    /// Settle everyone queued so far with `error` while keeping the flight open.
    ///
    /// Callers joining afterwards still wait for the final release. Returns
    /// the number of waiters settled.
    pub fn fail_pending(&self, error: &AuthError) -> usize {
        let waiters = self.coordinator.drain(false);
        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }
        count
    }

    /// End the flight and deliver `outcome` to every waiter.
    pub fn release(mut self, outcome: Outcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: Outcome) {
        self.released = true;
        let waiters = self.coordinator.drain(true);
        debug!(
            waiters = waiters.len(),
            success = outcome.is_ok(),
            "refresh flight released"
        );
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.finish(Err(AuthError::AuthRequired));
        }
    }
}

/// Handle held by a caller queued behind an in-flight refresh.
#[derive(Debug)]
pub struct Waiter {
    rx: oneshot::Receiver<Outcome>,
}

impl Waiter {
    /// Wait for the leader's outcome.
    pub async fn wait(self) -> Outcome {
        self.rx.await.unwrap_or(Err(AuthError::AuthRequired))
    }
}
