//! Keyed, cancellable background operations.
//!
//! Export, regenerate and simulate run under a key such as
//! `export:adverse-events`. A second start under a key that is still in
//! flight aborts the first (the newer submission wins). Teardown cancels
//! everything still running.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::AbortHandle;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OperationError {
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Operation failed: {0}")]
    Join(String),
}

struct InFlight {
    id: Uuid,
    abort: AbortHandle,
}

/// Deregisters an operation when its caller finishes or goes away. A caller
/// dropped mid-await also aborts the task it started.
struct Registration<'a> {
    inner: &'a Mutex<HashMap<String, InFlight>>,
    key: &'a str,
    id: Uuid,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let Ok(mut map) = self.inner.lock() else {
            return;
        };
        if map.get(self.key).map(|e| e.id) == Some(self.id) {
            if let Some(entry) = map.remove(self.key) {
                entry.abort.abort();
            }
        }
    }
}

#[derive(Default)]
pub struct OperationRegistry {
    inner: Mutex<HashMap<String, InFlight>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` under `key`, superseding any operation already there.
    pub async fn run<F, T>(&self, key: &str, operation: F) -> Result<T, OperationError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::spawn(operation);
        let id = Uuid::new_v4();

        if let Ok(mut map) = self.inner.lock() {
            let entry = InFlight {
                id,
                abort: handle.abort_handle(),
            };
            if let Some(previous) = map.insert(key.to_string(), entry) {
                previous.abort.abort();
                tracing::info!(key, "Superseded in-flight operation");
            }
        }

        let _registration = Registration {
            inner: &self.inner,
            key,
            id,
        };

        match handle.await {
            Ok(value) => Ok(value),
            Err(e) if e.is_cancelled() => Err(OperationError::Cancelled),
            Err(e) => Err(OperationError::Join(e.to_string())),
        }
    }

    /// Run `work` after `delay`, under `key`.
    pub async fn run_delayed<W, T>(
        &self,
        key: &str,
        delay: Duration,
        work: W,
    ) -> Result<T, OperationError>
    where
        W: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.run(key, async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            work()
        })
        .await
    }

    /// Abort the operation under `key`. Returns whether one was running.
    pub fn cancel(&self, key: &str) -> bool {
        let Ok(mut map) = self.inner.lock() else {
            return false;
        };
        match map.remove(key) {
            Some(entry) => {
                entry.abort.abort();
                tracing::info!(key, "Cancelled operation");
                true
            }
            None => false,
        }
    }

    /// Abort everything. Returns how many operations were cancelled.
    pub fn cancel_all(&self) -> usize {
        let Ok(mut map) = self.inner.lock() else {
            return 0;
        };
        let count = map.len();
        for (_, entry) in map.drain() {
            entry.abort.abort();
        }
        if count > 0 {
            tracing::info!(count, "Cancelled all operations");
        }
        count
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.inner
            .lock()
            .map(|m| m.contains_key(key))
            .unwrap_or(false)
    }

    pub fn in_flight(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .lock()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}
