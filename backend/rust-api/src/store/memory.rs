use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};

use super::{tree, SessionStore, StoreError, StorePath, Subscription};

const CHANGE_BUFFER: usize = 1024;

/// In-process store. Used by tests and by single-node deployments
/// (`STORE_BACKEND=memory`). All mutations are serialized by one mutex, so
/// `create_if_absent` and `increment` are atomic.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    root: Mutex<Value>,
    changes: broadcast::Sender<StorePath>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Arc::new(Inner {
                root: Mutex::new(Value::Object(Map::new())),
                changes,
            }),
        }
    }

    fn with_root<T>(
        &self,
        f: impl FnOnce(&mut Value) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut root = self
            .inner
            .root
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        let result = f(&mut root);
        if root.is_null() {
            *root = Value::Object(Map::new());
        }
        result
    }

    fn snapshot(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.with_root(|root| Ok(tree::get(root, path.segments())))
    }

    fn notify(&self, path: &StorePath) {
        // No receivers is fine: nobody is subscribed yet.
        let _ = self.inner.changes.send(path.clone());
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn read_once(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.snapshot(path)
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.with_root(|root| {
            tree::set(root, path.segments(), value);
            Ok(())
        })?;
        self.notify(path);
        Ok(())
    }

    async fn merge(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.with_root(|root| {
            tree::merge(root, path.segments(), fields);
            Ok(())
        })?;
        self.notify(path);
        Ok(())
    }

    async fn merge_if(
        &self,
        path: &StorePath,
        fields: Map<String, Value>,
        guard: &(dyn for<'v> Fn(Option<&'v Value>) -> bool + Send + Sync),
    ) -> Result<bool, StoreError> {
        let merged = self.with_root(|root| {
            if !guard(tree::get(root, path.segments()).as_ref()) {
                return Ok(false);
            }
            tree::merge(root, path.segments(), fields);
            Ok(true)
        })?;
        if merged {
            self.notify(path);
        }
        Ok(merged)
    }

    async fn create_if_absent(&self, path: &StorePath, value: Value) -> Result<bool, StoreError> {
        let created = self.with_root(|root| {
            if tree::get(root, path.segments()).is_some() {
                return Ok(false);
            }
            tree::set(root, path.segments(), value);
            Ok(true)
        })?;
        if created {
            self.notify(path);
        }
        Ok(created)
    }

    async fn increment(&self, path: &StorePath, delta: i64) -> Result<i64, StoreError> {
        let next = self.with_root(|root| tree::increment(root, path.segments(), delta))?;
        self.notify(path);
        Ok(next)
    }

    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        // Subscribe before the first read so no change slips in between.
        let receiver = self.inner.changes.subscribe();
        let initial = self.snapshot(path)?;

        let updates = stream::unfold(
            (self.clone(), path.clone(), receiver, initial.clone()),
            |(store, path, mut receiver, last)| async move {
                loop {
                    match receiver.recv().await {
                        Ok(changed) if !changed.overlaps(&path) => continue,
                        Ok(_) | Err(RecvError::Lagged(_)) => {
                            let current = store.snapshot(&path).ok()?;
                            if current != last {
                                return Some((current.clone(), (store, path, receiver, current)));
                            }
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            },
        );

        Ok(stream::once(async move { initial }).chain(updates).boxed())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_root(|_| Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn path(raw: &str) -> StorePath {
        StorePath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn create_if_absent_only_writes_once() {
        let store = MemoryStore::new();
        let p = path("game_participant/TBF12345/alice");

        assert!(store.create_if_absent(&p, json!({ "score": 0 })).await.unwrap());
        assert!(!store.create_if_absent(&p, json!({ "score": 5 })).await.unwrap());
        assert_eq!(store.read_once(&p).await.unwrap().unwrap()["score"], 0);
    }

    #[tokio::test]
    async fn merge_if_checks_the_guard_against_the_stored_value() {
        let store = MemoryStore::new();
        let quiz = path("quizzes/TBF12345");
        store.write(&quiz, json!({ "current_question": 1 })).await.unwrap();

        let mut fields = Map::new();
        fields.insert("current_question".into(), json!(0));
        let expects_zero =
            |current: Option<&Value>| current.is_some_and(|v| v["current_question"] == 0);
        assert!(!store.merge_if(&quiz, fields.clone(), &expects_zero).await.unwrap());

        let expects_one =
            |current: Option<&Value>| current.is_some_and(|v| v["current_question"] == 1);
        fields.insert("current_question".into(), json!(2));
        assert!(store.merge_if(&quiz, fields, &expects_one).await.unwrap());
        assert_eq!(
            store.read_once(&quiz).await.unwrap().unwrap()["current_question"],
            2
        );
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = MemoryStore::new();
        let p = path("game_participant/TBF12345/alice/score");

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                let p = p.clone();
                tokio::spawn(async move { store.increment(&p, 5).await.unwrap() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.read_once(&p).await.unwrap(), Some(json!(100)));
    }

    #[tokio::test]
    async fn subscription_sees_initial_value_and_relevant_changes_only() {
        let store = MemoryStore::new();
        let quiz = path("quizzes/TBF12345");
        store.write(&quiz, json!({ "current_question": 0 })).await.unwrap();

        let mut sub = store.subscribe(&quiz).await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap()["current_question"], 0);

        store
            .write(&path("quizzes/TBF99999/current_question"), json!(7))
            .await
            .unwrap();
        store
            .write(&path("quizzes/TBF12345/current_question"), json!(1))
            .await
            .unwrap();

        let next = tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(next["current_question"], 1);
    }
}
