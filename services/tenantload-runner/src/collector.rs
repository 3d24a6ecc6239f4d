//! Bounded, non-blocking sink for per-user failures.

use tenantload_core::LifecycleError;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Collects lifecycle errors from concurrently running users.
///
/// Capacity must cover the number of reporting tasks; each task reports at
/// most once. Reporting never waits, so a full collector can't stall a task.
pub struct ErrorCollector {
    tx: mpsc::Sender<LifecycleError>,
    rx: mpsc::Receiver<LifecycleError>,
}

/// Sending half handed to each user task.
#[derive(Clone)]
pub struct ErrorReporter {
    tx: mpsc::Sender<LifecycleError>,
}

impl ErrorCollector {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { tx, rx }
    }

    pub fn reporter(&self) -> ErrorReporter {
        ErrorReporter {
            tx: self.tx.clone(),
        }
    }

    /// Returns every error reported so far, in reporting order.
    pub fn drain(mut self) -> Vec<LifecycleError> {
        drop(self.tx);
        let mut errors = Vec::new();
        while let Ok(err) = self.rx.try_recv() {
            errors.push(err);
        }
        errors
    }
}

impl ErrorReporter {
    /// Records `err`. Returns `false` if it was dropped.
    pub fn report(&self, err: LifecycleError) -> bool {
        match self.tx.try_send(err) {
            Ok(()) => true,
            Err(TrySendError::Full(err)) | Err(TrySendError::Closed(err)) => {
                warn!(tenant = err.tenant(), error = %err, "error collector full, dropping error");
                false
            }
        }
    }
}
