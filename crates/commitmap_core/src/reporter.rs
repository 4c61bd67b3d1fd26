//! Error sinks for the index.

use crate::error::CoreError;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::error;

/// Receives every recoverable error the index swallows.
///
/// The index never returns these to its callers; it reports them here and
/// answers with a sentinel. Hosts decide whether to log, surface or ignore
/// them.
///
/// Closures work directly:
///
/// ```rust
/// use commitmap_core::{CoreError, ErrorReporter};
///
/// let reporter = |err: CoreError| eprintln!("index: {err}");
/// reporter.report(CoreError::Closed);
/// ```
pub trait ErrorReporter: Send + Sync {
    /// Handles one error.
    fn report(&self, error: CoreError);
}

impl<F> ErrorReporter for F
where
    F: Fn(CoreError) + Send + Sync,
{
    fn report(&self, error: CoreError) {
        self(error);
    }
}

/// Logs every error at `error` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, err: CoreError) {
        error!(error = %err, "commit index operation failed");
    }
}

/// Keeps every reported error for later inspection.
#[derive(Debug, Clone, Default)]
pub struct CollectingReporter {
    errors: Arc<Mutex<Vec<CoreError>>>,
}

impl CollectingReporter {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of errors reported so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// Whether nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Removes and returns the collected errors.
    pub fn take(&self) -> Vec<CoreError> {
        std::mem::take(&mut *self.errors.lock())
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, error: CoreError) {
        self.errors.lock().push(error);
    }
}
