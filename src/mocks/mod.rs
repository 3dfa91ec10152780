//! Scripted operations for unit tests.

use crate::errors::OperationError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicU32, Ordering};

/// An operation that replays queued outcomes, then repeats a fallback.
pub struct MockOperation<T> {
    outcomes: Mutex<VecDeque<Result<T, OperationError>>>,
    fallback: Result<T, OperationError>,
    calls: AtomicU32,
}

impl<T: Clone> MockOperation<T> {
    /// Create an operation from a script and the outcome used once it runs dry
    pub fn new(
        outcomes: impl IntoIterator<Item = Result<T, OperationError>>,
        fallback: Result<T, OperationError>,
    ) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            fallback,
            calls: AtomicU32::new(0),
        }
    }

    /// Always succeeds with `value`
    pub fn succeeding(value: T) -> Self {
        Self::new([], Ok(value))
    }

    /// Always fails with `error`
    pub fn always_failing(error: OperationError) -> Self {
        Self::new([], Err(error))
    }

    /// Fails `failures` times with `error`, then succeeds with `value`
    pub fn failing_then(failures: u32, error: OperationError, value: T) -> Self {
        Self::new((0..failures).map(|_| Err(error.clone())), Ok(value))
    }

    /// Queue another outcome
    pub fn push(&self, outcome: Result<T, OperationError>) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Run the operation once
    pub fn invoke(&self) -> Ready<Result<T, OperationError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        ready(outcome)
    }

    /// Number of times the operation ran
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}
