//! Single-flight token refresh coordination
//!
//! The coordinator is a two-state machine (`IDLE`, `REFRESHING`) plus a FIFO
//! queue of waiters. The first caller that observes an expired token becomes
//! the leader and performs the refresh; everyone arriving while it is in
//! flight receives a oneshot receiver and is released with the leader's
//! outcome.
//!
//! The state lives behind a `parking_lot::Mutex` that is only ever held for
//! the check-and-set, never across an `.await`.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Why a refresh attempt failed
///
/// Cloned to every waiter released by the failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("refresh endpoint returned status {status}")]
    Rejected { status: u16 },

    #[error("refresh response did not contain an access token")]
    MissingToken,

    #[error("refresh request failed: {0}")]
    Transport(String),

    #[error("refresh timed out after {0:?}")]
    Timeout(Duration),

    #[error("refresh was abandoned before completing")]
    Abandoned,
}

pub type RefreshOutcome = Result<String, RefreshError>;

type Waiter = oneshot::Sender<RefreshOutcome>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: VecDeque<Waiter>,
}

/// What a caller should do after asking to refresh
#[derive(Debug)]
pub enum RefreshTicket<'a> {
    /// The token the request was sent with is already outdated; retry with
    /// this one instead of refreshing.
    Current(String),
    /// Perform the refresh and settle the lease.
    Leader(RefreshLease<'a>),
    /// A refresh is in flight; await its outcome.
    Follower(oneshot::Receiver<RefreshOutcome>),
}

/// Owns the single refresh state of one client
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &state.refreshing)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join or start a refresh
    ///
    /// `newer_token` is evaluated under the state lock only when no refresh
    /// is in flight. It returns the current token when it differs from the
    /// one the failed request carried, in which case no refresh is started.
    pub fn begin<F>(&self, newer_token: F) -> RefreshTicket<'_>
    where
        F: FnOnce() -> Option<String>,
    {
        let mut state = self.state.lock();

        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            debug!(queued = state.waiters.len(), "Refresh in flight, request queued");
            return RefreshTicket::Follower(rx);
        }

        if let Some(token) = newer_token() {
            return RefreshTicket::Current(token);
        }

        state.refreshing = true;
        RefreshTicket::Leader(RefreshLease { coordinator: self, settled: false })
    }

    /// Whether a refresh is currently in flight
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().refreshing
    }

    /// Number of requests waiting on the in-flight refresh
    pub fn pending_waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    fn settle(&self, outcome: &RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.state.lock();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        let released = waiters.len();
        for waiter in waiters {
            // A dropped receiver means that caller went away; nothing to do.
            let _ = waiter.send(outcome.clone());
        }
        released
    }
}

/// Exclusive right to perform the in-flight refresh
///
/// Dropping an unsettled lease releases every waiter with
/// [`RefreshError::Abandoned`] and returns the coordinator to idle.
#[must_use = "an unsettled lease abandons the refresh when dropped"]
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl std::fmt::Debug for RefreshLease<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshLease").field("settled", &self.settled).finish()
    }
}

impl RefreshLease<'_> {
    /// Return to idle and release waiters in arrival order
    ///
    /// Returns the number of waiters released.
    pub fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(&outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let released = self.coordinator.settle(&Err(RefreshError::Abandoned));
            debug!(released, "Refresh abandoned");
        }
    }
}

/// Await a follower ticket
pub async fn wait_for(receiver: oneshot::Receiver<RefreshOutcome>) -> RefreshOutcome {
    receiver.await.unwrap_or(Err(RefreshError::Abandoned))
}
