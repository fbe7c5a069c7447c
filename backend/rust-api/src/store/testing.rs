use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{MemoryStore, SessionStore, StoreError, StorePath, Subscription};

/// Memory store with injectable faults: failing increments and slow
/// guarded merges for one phase status.
#[derive(Default)]
pub(crate) struct FaultyStore {
    pub inner: MemoryStore,
    failing_increments: AtomicUsize,
    slow_merge: Option<(&'static str, Duration)>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` increments fail with a backend error.
    pub fn fail_increments(&self, count: usize) {
        self.failing_increments.store(count, Ordering::SeqCst);
    }

    /// Guarded merges that write `phase.status == status` wait `delay`
    /// before reaching the store.
    pub fn slow_merge_to(mut self, status: &'static str, delay: Duration) -> Self {
        self.slow_merge = Some((status, delay));
        self
    }
}

#[async_trait]
impl SessionStore for FaultyStore {
    async fn read_once(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.inner.read_once(path).await
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.inner.write(path, value).await
    }

    async fn merge(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.inner.merge(path, fields).await
    }

    async fn merge_if(
        &self,
        path: &StorePath,
        fields: Map<String, Value>,
        guard: &(dyn for<'v> Fn(Option<&'v Value>) -> bool + Send + Sync),
    ) -> Result<bool, StoreError> {
        if let Some((status, delay)) = self.slow_merge {
            if fields.get("phase").and_then(|p| p.get("status")) == Some(&Value::from(status)) {
                tokio::time::sleep(delay).await;
            }
        }
        self.inner.merge_if(path, fields, guard).await
    }

    async fn create_if_absent(&self, path: &StorePath, value: Value) -> Result<bool, StoreError> {
        self.inner.create_if_absent(path, value).await
    }

    async fn increment(&self, path: &StorePath, delta: i64) -> Result<i64, StoreError> {
        let failing = self
            .failing_increments
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        self.inner.increment(path, delta).await
    }

    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        self.inner.subscribe(path).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}
