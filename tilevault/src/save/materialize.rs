//! One-shot creation or clearing of a save's target table.
//!
//! Many tiles of a save finish downloading at nearly the same time, and the
//! first of them must create (or clear) the target table before anything is
//! persisted. [`TableMaterializer`] runs that step exactly once per save no
//! matter how many tiles race to it; latecomers wait for the winner and
//! share its outcome.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::schema::SchemaError;

#[derive(Debug, Default)]
pub struct TableMaterializer {
    ready: OnceCell<bool>,
    error: Mutex<Option<SchemaError>>,
    attempts: AtomicUsize,
}

impl TableMaterializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `init` if no caller has yet, otherwise waits for that run.
    ///
    /// Returns whether the table is ready. A failed `init` is not retried;
    /// its error is kept for [`take_error`](Self::take_error).
    pub async fn ensure<F, Fut>(&self, init: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), SchemaError>>,
    {
        *self
            .ready
            .get_or_init(|| async move {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                match init().await {
                    Ok(()) => true,
                    Err(e) => {
                        *self.error.lock() = Some(e);
                        false
                    }
                }
            })
            .await
    }

    /// True once `init` has completed successfully.
    pub fn is_ready(&self) -> bool {
        self.ready.get().copied().unwrap_or(false)
    }

    /// Number of times `init` ran. At most one.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn take_error(&self) -> Option<SchemaError> {
        self.error.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_run_init_once() {
        let materializer = TableMaterializer::new();
        let runs = AtomicUsize::new(0);

        let callers = (0..16).map(|_| {
            materializer.ensure(|| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });
        let results = join_all(callers).await;

        assert!(results.iter().all(|ready| *ready));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(materializer.attempts(), 1);
        assert!(materializer.is_ready());
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_not_retried() {
        let materializer = TableMaterializer::new();

        let first = materializer
            .ensure(|| async { Err(SchemaError::InvalidTableName(String::new())) })
            .await;
        let second = materializer.ensure(|| async { Ok(()) }).await;

        assert!(!first);
        assert!(!second, "A failed init must not be retried");
        assert_eq!(materializer.attempts(), 1);
        assert!(matches!(
            materializer.take_error(),
            Some(SchemaError::InvalidTableName(_))
        ));
        assert!(materializer.take_error().is_none());
    }
}
