//! Destinations for progress events.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use super::{ProgressStatus, StepProgress};

/// Accepts progress events.
///
/// Reporting is synchronous and must not block; sinks that need to do slow
/// work should hand events off (see [`ChannelProgress`]).
pub trait ProgressSink: Send + Sync {
    /// Receive one event.
    fn report(&self, event: StepProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(StepProgress) + Send + Sync,
{
    fn report(&self, event: StepProgress) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _event: StepProgress) {}
}

/// Keeps every event in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct ProgressLog {
    events: Arc<Mutex<Vec<StepProgress>>>,
}

impl ProgressLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<StepProgress> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `(step, status)` pairs in emission order.
    pub fn sequence(&self) -> Vec<(String, ProgressStatus)> {
        self.events()
            .into_iter()
            .map(|e| (e.step_name, e.status))
            .collect()
    }

    /// Statuses reported for one step, in order.
    pub fn statuses_for(&self, step: &str) -> Vec<ProgressStatus> {
        self.events()
            .into_iter()
            .filter(|e| e.step_name == step)
            .map(|e| e.status)
            .collect()
    }

    /// Number of events recorded.
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressSink for ProgressLog {
    fn report(&self, event: StepProgress) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<StepProgress>,
}

impl ChannelProgress {
    /// Create the sink and the receiving half.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StepProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, event: StepProgress) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}
