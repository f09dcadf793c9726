//! Cancellable polling for long-running backend tasks.
//!
//! SYSTEM CONTEXT
//! ==============
//! Protocol drafting, patient identification, and regulatory reports return a
//! task ticket; the caller then checks the task status on a fixed interval
//! until the backend reports `COMPLETED` or `FAILED`.
//!
//! DESIGN
//! ======
//! [`TaskPoller::spawn`] runs the loop on a tokio task and publishes every
//! transition through a `watch` channel. The returned [`PollHandle`] owns the
//! task: cancelling or dropping it stops the timer, so no poll outlives the
//! view that started it.
//!
//! ERROR HANDLING
//! ==============
//! A failed status check ends the poll in [`PollState::Errored`]. There is no
//! automatic retry; the caller decides whether to start a new poll. A loop
//! that dies without settling (a panicking fetch) is also reported as
//! `Errored`, so [`PollHandle::wait`] always returns.

#[cfg(test)]
#[path = "poll_test.rs"]
mod poll_test;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::net::error::ApiError;
use crate::net::types::{TaskPhase, TaskStatus};

/// User-facing text for a status check that failed outright.
pub const POLL_ERROR_MESSAGE: &str = "Error checking task status.";

const POLL_STOPPED_MESSAGE: &str = "task status poller stopped unexpectedly";

#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    /// No status received yet.
    Waiting,
    Running(TaskStatus),
    Completed(TaskStatus),
    Failed(TaskStatus),
    Errored(String),
    Cancelled,
}

impl PollState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting | Self::Running(_))
    }

    #[must_use]
    pub fn status(&self) -> Option<&TaskStatus> {
        match self {
            Self::Running(status) | Self::Completed(status) | Self::Failed(status) => Some(status),
            _ => None,
        }
    }

    /// One-line description suitable for a status banner.
    #[must_use]
    pub fn describe(&self, label: &str) -> String {
        match self {
            Self::Waiting => format!("{label} status: PENDING. Details: Processing..."),
            Self::Running(status) | Self::Completed(status) | Self::Failed(status) => status.status_line(label),
            Self::Errored(_) => POLL_ERROR_MESSAGE.to_owned(),
            Self::Cancelled => format!("{label} polling cancelled."),
        }
    }

    fn from_status(status: TaskStatus) -> Self {
        match status.phase() {
            TaskPhase::Running => Self::Running(status),
            TaskPhase::Completed => Self::Completed(status),
            TaskPhase::Failed => Self::Failed(status),
        }
    }
}

pub struct TaskPoller;

impl TaskPoller {
    /// Start polling `fetch` every `interval`. The first check fires after one
    /// full interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(interval: Duration, mut fetch: F) -> PollHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<TaskStatus, ApiError>> + Send + 'static,
    {
        let state = Arc::new(watch::Sender::new(PollState::Waiting));
        let tx = Arc::clone(&state);
        let period = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let _stop = StopGuard(Arc::clone(&tx));
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let next = match fetch().await {
                    Ok(status) => {
                        debug!(status = %status.status, "task status checked");
                        PollState::from_status(status)
                    }
                    Err(e) => {
                        warn!(error = %e, "task status check failed; polling stopped");
                        PollState::Errored(e.to_string())
                    }
                };
                let done = next.is_terminal();
                publish(&tx, next);
                if done {
                    break;
                }
            }
        });

        PollHandle { state, task }
    }
}

/// Replace a non-terminal state; a settled poll never changes again.
fn publish(tx: &watch::Sender<PollState>, next: PollState) -> bool {
    tx.send_if_modified(|state| {
        if state.is_terminal() {
            false
        } else {
            *state = next;
            true
        }
    })
}

/// Settles the poll if the loop dies without publishing a terminal state,
/// e.g. when the fetch future panics.
struct StopGuard(Arc<watch::Sender<PollState>>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        if publish(&self.0, PollState::Errored(POLL_STOPPED_MESSAGE.to_owned())) {
            warn!("task status poller stopped unexpectedly");
        }
    }
}

/// Owner of one running poll. Dropping it cancels the poll.
pub struct PollHandle {
    state: Arc<watch::Sender<PollState>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    #[must_use]
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    /// Stop the timer. A poll that already reached a terminal state keeps it.
    pub fn cancel(&self) {
        publish(&self.state, PollState::Cancelled);
        self.task.abort();
    }

    /// Wait for the terminal state.
    pub async fn wait(&self) -> PollState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(PollState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollHandle").field("state", &*self.state.borrow()).finish_non_exhaustive()
    }
}
