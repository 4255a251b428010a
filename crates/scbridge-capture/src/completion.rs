//! Correlation of one-shot native completions with their callers.
//!
//! Every asynchronous native call is issued with a [`NativeCompletion`]. The
//! token is consumed when it fires, so a continuation can run at most once.
//! A token that is dropped without firing resolves its continuation with
//! [`CaptureError::Abandoned`] instead of leaving the caller waiting forever.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{CaptureError, NativeError};
use crate::CaptureResult;

/// Continuation supplied by the caller of an asynchronous operation.
pub type Callback<T> = Box<dyn FnOnce(CaptureResult<T>) + Send + 'static>;

/// Asynchronous native operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ShareableContent,
    StartCapture,
    StopCapture,
    UpdateConfiguration,
    UpdateContentFilter,
    CaptureImage,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Self::ShareableContent => "shareable content request",
            Self::StartCapture => "start capture",
            Self::StopCapture => "stop capture",
            Self::UpdateConfiguration => "configuration update",
            Self::UpdateContentFilter => "content filter update",
            Self::CaptureImage => "image capture",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    operation: Operation,
    issued_at: Instant,
}

#[derive(Default)]
struct CorrelatorInner {
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
    next_id: AtomicU64,
    completed: AtomicU64,
    abandoned: AtomicU64,
}

/// Tracks outstanding native requests.
#[derive(Clone, Default)]
pub struct Correlator {
    inner: Arc<CorrelatorInner>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and return the token to hand to the backend.
    pub fn issue<T, F>(&self, operation: Operation, callback: F) -> NativeCompletion<T>
    where
        T: Send + 'static,
        F: FnOnce(CaptureResult<T>) + Send + 'static,
    {
        let id = RequestId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.inner.pending.lock().insert(
            id,
            PendingRequest {
                operation,
                issued_at: Instant::now(),
            },
        );

        debug!(request = %id, %operation, "Issued native request");

        NativeCompletion {
            id,
            operation,
            callback: Some(Box::new(callback)),
            correlator: self.clone(),
        }
    }

    /// Number of requests that have not fired yet.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Operations still outstanding, oldest first.
    pub fn pending_operations(&self) -> Vec<(RequestId, Operation)> {
        let mut pending: Vec<_> = self
            .inner
            .pending
            .lock()
            .iter()
            .map(|(id, request)| (*id, request.operation))
            .collect();
        pending.sort_by_key(|(id, _)| *id);
        pending
    }

    /// Requests that fired with a result.
    pub fn completed_count(&self) -> u64 {
        self.inner.completed.load(Ordering::Relaxed)
    }

    /// Requests whose token was dropped unfired.
    pub fn abandoned_count(&self) -> u64 {
        self.inner.abandoned.load(Ordering::Relaxed)
    }

    fn finish(&self, id: RequestId) -> Option<Duration> {
        self.inner
            .pending
            .lock()
            .remove(&id)
            .map(|request| request.issued_at.elapsed())
    }
}

impl fmt::Debug for Correlator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correlator")
            .field("pending", &self.pending_count())
            .field("completed", &self.completed_count())
            .field("abandoned", &self.abandoned_count())
            .finish()
    }
}

/// One-shot completion token for a native call.
///
/// Firing consumes the token. The backend may fire it from any thread.
pub struct NativeCompletion<T: Send + 'static> {
    id: RequestId,
    operation: Operation,
    callback: Option<Callback<T>>,
    correlator: Correlator,
}

impl<T: Send + 'static> NativeCompletion<T> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Deliver the native outcome.
    pub fn complete(self, result: Result<T, NativeError>) {
        self.resolve(result.map_err(CaptureError::from));
    }

    pub fn succeed(self, value: T) {
        self.resolve(Ok(value));
    }

    pub fn fail(self, error: NativeError) {
        self.resolve(Err(CaptureError::Native(error)));
    }

    /// Deliver an outcome produced by the core itself rather than the
    /// native layer.
    pub(crate) fn resolve(mut self, result: CaptureResult<T>) {
        if let Some(callback) = self.callback.take() {
            let elapsed = self.correlator.finish(self.id);
            self.correlator.inner.completed.fetch_add(1, Ordering::Relaxed);
            debug!(
                request = %self.id,
                operation = %self.operation,
                ok = result.is_ok(),
                elapsed_us = elapsed.map(|e| e.as_micros() as u64),
                "Native request completed"
            );
            callback(result);
        }
    }
}

impl<T: Send + 'static> Drop for NativeCompletion<T> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            self.correlator.finish(self.id);
            self.correlator.inner.abandoned.fetch_add(1, Ordering::Relaxed);
            warn!(request = %self.id, operation = %self.operation, "Native request abandoned");
            callback(Err(CaptureError::Abandoned {
                operation: self.operation,
            }));
        }
    }
}

impl<T: Send + 'static> fmt::Debug for NativeCompletion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCompletion")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("fired", &self.callback.is_none())
            .finish()
    }
}

/// A callback that forwards its result into a channel, for callers that
/// want to wait.
pub fn channel<T: Send + 'static>() -> (Callback<T>, Receiver<CaptureResult<T>>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let callback: Callback<T> = Box::new(move |result| {
        // The receiver may be gone; the result is then unobserved.
        let _ = tx.send(result);
    });
    (callback, rx)
}
