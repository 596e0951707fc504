// Status polling with transition detection, one request in flight at a time

use crate::api::StatusSource;
use crate::error::{ClientError, Result};
use crate::model::TaskStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub interval: Duration,
    // A request that takes longer is abandoned and counted as a failed poll
    pub request_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            request_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
        }
    }
}

impl MonitorConfig {
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval = Duration::from_millis(interval_ms.max(1));
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout = Duration::from_millis(timeout_ms.max(1));
        self
    }
}

/// A change between two consecutive successful observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl Transition {
    pub fn new(from: TaskStatus, to: TaskStatus) -> Self {
        Self { from, to }
    }

    /// Only `in_processing -> active` means the crawl results are final and
    /// the full task payload has to be fetched again. Every other transition
    /// just changes the displayed status.
    pub fn requires_reload(&self) -> bool {
        self.from == TaskStatus::InProcessing && self.to == TaskStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    task_id: i64,
    previous_status: Option<TaskStatus>,
}

impl PollState {
    pub fn new(task_id: i64) -> Self {
        Self {
            task_id,
            previous_status: None,
        }
    }

    /// Seed the state with a status the caller already knows, so the first
    /// poll can already report a transition.
    pub fn with_status(task_id: i64, status: TaskStatus) -> Self {
        Self {
            task_id,
            previous_status: Some(status),
        }
    }

    pub fn task_id(&self) -> i64 {
        self.task_id
    }

    pub fn previous_status(&self) -> Option<&TaskStatus> {
        self.previous_status.as_ref()
    }

    /// Record the status of a successful poll. The first observation only
    /// seeds the state.
    pub fn observe(&mut self, current: TaskStatus) -> Option<Transition> {
        match self.previous_status.replace(current.clone()) {
            Some(previous) if previous != current => Some(Transition::new(previous, current)),
            _ => None,
        }
    }
}

pub struct StatusMonitor {
    source: Arc<dyn StatusSource>,
    config: MonitorConfig,
}

impl StatusMonitor {
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self {
            source,
            config: MonitorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn start<F>(&self, task_id: i64, on_transition: F) -> MonitorHandle
    where
        F: FnMut(Transition) + Send + 'static,
    {
        self.start_with(PollState::new(task_id), on_transition)
    }

    pub fn start_with<F>(&self, state: PollState, on_transition: F) -> MonitorHandle
    where
        F: FnMut(Transition) + Send + 'static,
    {
        let task_id = state.task_id();
        let cancel = CancellationToken::new();

        info!(
            "Monitoring task {} every {} ms",
            task_id,
            self.config.interval.as_millis()
        );

        let join = tokio::spawn(poll_loop(
            self.source.clone(),
            self.config,
            state,
            cancel.clone(),
            on_transition,
        ));

        MonitorHandle {
            task_id,
            cancel,
            join: Some(join),
        }
    }

    /// Like [`start_with`](Self::start_with), but delivers transitions over a
    /// channel instead of a callback.
    pub fn subscribe(&self, state: PollState) -> (MonitorHandle, mpsc::UnboundedReceiver<Transition>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.start_with(state, move |transition| {
            // Receiver gone means the consumer stopped listening
            let _ = tx.send(transition);
        });
        (handle, rx)
    }
}

/// Cancellation handle for a running monitor.
///
/// Dropping the handle cancels the monitor as well, but only
/// [`stop`](MonitorHandle::stop) waits for the loop to wind down.
pub struct MonitorHandle {
    task_id: i64,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn task_id(&self) -> i64 {
        self.task_id
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Request cancellation without waiting. Usable from inside the
    /// transition callback.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the poll loop to exit. Once this returns the
    /// callback is never invoked again. Calling it twice is a no-op.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take()
            && let Err(e) = join.await
            && !e.is_cancelled()
        {
            warn!("Monitor for task {} ended abnormally: {}", self.task_id, e);
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop<F>(
    source: Arc<dyn StatusSource>,
    config: MonitorConfig,
    mut state: PollState,
    cancel: CancellationToken,
    mut on_transition: F,
) where
    F: FnMut(Transition) + Send + 'static,
{
    let task_id = state.task_id();
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let request = fetch_status(source.as_ref(), task_id, config.request_timeout);
        let outcome = tokio::select! {
            biased;
            // Dropping the pending request discards whatever it resolves to
            _ = cancel.cancelled() => break,
            outcome = request => outcome,
        };

        match outcome {
            Ok(status) => {
                if let Some(transition) = state.observe(status) {
                    debug!(
                        "Task {} moved from {} to {}",
                        task_id, transition.from, transition.to
                    );
                    on_transition(transition);
                }
            }
            Err(e) => log_poll_failure(task_id, &e),
        }
    }

    debug!("Monitor for task {} stopped", task_id);
}

/// One status request, bounded by `timeout`. An abandoned request becomes
/// [`ClientError::Timeout`].
async fn fetch_status(
    source: &dyn StatusSource,
    task_id: i64,
    timeout: Duration,
) -> Result<TaskStatus> {
    match tokio::time::timeout(timeout, source.fetch_task_status(task_id)).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout(
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        )),
    }
}

// Either way the previous status is kept and the next tick polls again
fn log_poll_failure(task_id: i64, e: &ClientError) {
    if e.is_transient() {
        warn!("Status poll for task {} failed, retrying: {}", task_id, e);
    } else {
        error!("Status poll for task {} was rejected: {}", task_id, e);
    }
}
