//! Admission Control
//!
//! Bounds the number of in-flight async operations on a guarded instance. Calls beyond
//! the bound are not queued: they are answered by a rejection handler supplied when the
//! guard is built.
//!
//! The admission check is a single atomic compare-and-increment, so concurrently
//! dispatched calls on a multi-threaded runtime can never both take the last slot. The
//! slot is held by an [`AdmissionPermit`] and released in its `Drop`, which covers normal
//! return, error return, panics, and cancellation of the calling future.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{trace, warn};

/// Rejection handler shared by every clone of a guard
type RejectHandler<J> = Arc<dyn Fn() -> BoxFuture<'static, J> + Send + Sync>;

/// In-flight counter with an upper bound
#[derive(Debug)]
pub struct AdmissionCounter {
    in_flight: AtomicUsize,
    limit: usize,
    rejected: AtomicU64,
}

impl AdmissionCounter {
    /// Create a counter that admits at most `limit` concurrent operations
    pub fn new(limit: usize) -> Result<Self, GuardError> {
        if limit == 0 {
            return Err(GuardError::InvalidLimit);
        }

        Ok(Self {
            in_flight: AtomicUsize::new(0),
            limit,
            rejected: AtomicU64::new(0),
        })
    }

    /// Try to take a slot.
    ///
    /// Returns `None` without touching the in-flight count when the bound is reached.
    pub fn try_admit(this: &Arc<Self>) -> Option<AdmissionPermit> {
        let limit = this.limit;
        let admitted = this
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then(|| n + 1)
            });

        match admitted {
            Ok(previous) => {
                trace!(in_flight = previous + 1, limit, "Call admitted");
                Some(AdmissionPermit {
                    counter: Arc::clone(this),
                })
            }
            Err(_) => {
                this.rejected.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Number of operations currently admitted and not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Maximum number of concurrent operations
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Total number of rejected admissions since creation
    pub fn rejected_total(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// An admitted slot; dropping it releases the slot exactly once
#[must_use = "dropping the permit releases the admission slot immediately"]
#[derive(Debug)]
pub struct AdmissionPermit {
    counter: Arc<AdmissionCounter>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        let previous = self.counter.in_flight.fetch_sub(1, Ordering::AcqRel);
        trace!(in_flight = previous - 1, "Call released");
    }
}

/// Call guard for one service instance
///
/// Clones share the same counter and rejection handler, so the bound applies to the
/// instance as a whole rather than to each operation. Two guards built with
/// [`CallGuard::new`] never share state.
///
/// The rejection value `J` only has to convert into each operation's output, which lets
/// operations with different result types sit behind one guard.
pub struct CallGuard<J> {
    counter: Arc<AdmissionCounter>,
    on_reject: RejectHandler<J>,
}

impl<J> Clone for CallGuard<J> {
    fn clone(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
            on_reject: Arc::clone(&self.on_reject),
        }
    }
}

impl<J> std::fmt::Debug for CallGuard<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallGuard")
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

impl<J: Send + 'static> CallGuard<J> {
    /// Create a guard admitting at most `limit` concurrent calls
    ///
    /// # Arguments
    /// * `limit` - Upper bound on in-flight calls, must be positive
    /// * `on_reject` - Produces the value returned to callers that were not admitted
    pub fn new<F, Fut>(limit: usize, on_reject: F) -> Result<Self, GuardError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = J> + Send + 'static,
    {
        let counter = Arc::new(AdmissionCounter::new(limit)?);
        let on_reject: RejectHandler<J> = Arc::new(move || Box::pin(on_reject()));

        Ok(Self { counter, on_reject })
    }

    /// Run `op` if a slot is free, otherwise return the rejection handler's value.
    ///
    /// Admission is decided on the first poll of the returned future, before `op` is
    /// even constructed. Whatever `op` produces, including an `Err`, is handed back
    /// unchanged.
    pub async fn call<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        J: Into<T>,
    {
        let Some(permit) = AdmissionCounter::try_admit(&self.counter) else {
            warn!(
                limit = self.counter.limit(),
                rejected_total = self.counter.rejected_total(),
                "Max concurrent calls reached, rejecting call"
            );
            return (self.on_reject)().await.into();
        };

        let output = op().await;
        drop(permit);
        output
    }
}

impl<J> CallGuard<J> {
    /// Calls currently admitted and running
    pub fn in_flight_count(&self) -> usize {
        self.counter.in_flight()
    }

    pub fn limit(&self) -> usize {
        self.counter.limit()
    }

    pub fn rejected_total(&self) -> u64 {
        self.counter.rejected_total()
    }
}

/// Guard construction errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardError {
    #[error("Admission limit must be greater than zero")]
    InvalidLimit,
}
