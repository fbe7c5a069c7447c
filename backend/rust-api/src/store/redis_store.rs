use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use redis::aio::ConnectionManager;
use serde_json::{Map, Value};
use std::time::Duration;

use super::{tree, SessionStore, StoreError, StorePath, Subscription};
use crate::metrics::track_store_operation;
use crate::utils::retry::{retry_async_when, RetryConfig};

/// Compare-and-swap on a document guarded by its version counter.
/// KEYS[1] = document, KEYS[2] = version; ARGV[1] = expected version,
/// ARGV[2] = new JSON (empty string deletes the document).
const CAS_SCRIPT: &str = r#"
    local current = redis.call('GET', KEYS[2])
    if (current or '0') ~= ARGV[1] then
        return 0
    end
    if ARGV[2] == '' then
        redis.call('DEL', KEYS[1])
    else
        redis.call('SET', KEYS[1], ARGV[2])
    end
    redis.call('INCR', KEYS[2])
    return 1
"#;

/// Redis-backed key tree.
///
/// The first two path segments select a document (`quizzes/TBF1A2B3`),
/// stored as one JSON string next to a version counter. Deeper paths are
/// resolved inside the document. Mutations are optimistic: load, apply,
/// then swap only if the version is unchanged, retrying on conflict.
/// Subscriptions poll the version counter.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    key_prefix: String,
    poll_interval: Duration,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager, key_prefix: String, poll_interval: Duration) -> Self {
        Self {
            conn,
            key_prefix,
            poll_interval,
        }
    }

    fn document_keys(&self, path: &StorePath) -> Result<DocumentKeys, StoreError> {
        document_keys(&self.key_prefix, path)
    }

    async fn load(&self, keys: &DocumentKeys) -> Result<(Value, String), StoreError> {
        let mut conn = self.conn.clone();
        let (raw, version): (Option<String>, Option<String>) = redis::cmd("MGET")
            .arg(&keys.document)
            .arg(&keys.version)
            .query_async(&mut conn)
            .await?;

        let document = match raw {
            Some(json) => serde_json::from_str(&json)?,
            None => Value::Null,
        };
        Ok((document, version.unwrap_or_else(|| "0".to_string())))
    }

    async fn mutate<T, F>(&self, path: &StorePath, operation: &str, apply: F) -> Result<T, StoreError>
    where
        F: Fn(&mut Value, &[String]) -> Result<T, StoreError> + Send + Sync,
        T: Send,
    {
        let keys = self.document_keys(path)?;
        let outcome = track_store_operation(
            operation,
            retry_async_when(
                RetryConfig::contended(),
                || self.try_mutate(&keys, &apply),
                StoreError::is_retryable,
            ),
        )
        .await?;
        outcome
    }

    /// Outer error: the swap lost a race (retried) or the connection
    /// failed (not retried). Inner error: the mutation itself was rejected
    /// and retrying cannot help.
    async fn try_mutate<T, F>(
        &self,
        keys: &DocumentKeys,
        apply: &F,
    ) -> Result<Result<T, StoreError>, StoreError>
    where
        F: Fn(&mut Value, &[String]) -> Result<T, StoreError> + Send + Sync,
        T: Send,
    {
        let (mut document, version) = self.load(keys).await?;
        let before = document.clone();

        let outcome = match apply(&mut document, &keys.rest) {
            Ok(value) => value,
            Err(err) => return Ok(Err(err)),
        };
        if document == before {
            return Ok(Ok(outcome));
        }

        let payload = encode_document(&document)?;

        let mut conn = self.conn.clone();
        let swapped: u32 = redis::Script::new(CAS_SCRIPT)
            .key(&keys.document)
            .key(&keys.version)
            .arg(&version)
            .arg(payload)
            .invoke_async(&mut conn)
            .await?;

        if swapped == 1 {
            Ok(Ok(outcome))
        } else {
            tracing::debug!("CAS conflict on {}, retrying", keys.document);
            Err(StoreError::Conflict(keys.document.clone()))
        }
    }
}

#[derive(Debug)]
struct DocumentKeys {
    document: String,
    version: String,
    rest: Vec<String>,
}

/// Splits `path` into the Redis keys of its document and the path inside it.
fn document_keys(prefix: &str, path: &StorePath) -> Result<DocumentKeys, StoreError> {
    let segments = path.segments();
    if segments.len() < 2 {
        return Err(StoreError::InvalidPath(format!(
            "'{}' does not address a document (need at least two segments)",
            path
        )));
    }

    let document = format!("{}:{}/{}", prefix, segments[0], segments[1]);
    Ok(DocumentKeys {
        version: format!("{}:v", document),
        document,
        rest: segments[2..].to_vec(),
    })
}

/// JSON written by the swap script. Empty documents become the empty
/// string, which the script turns into a delete.
fn encode_document(document: &Value) -> Result<String, StoreError> {
    Ok(match document {
        Value::Null => String::new(),
        Value::Object(map) if map.is_empty() => String::new(),
        other => serde_json::to_string(other)?,
    })
}

struct PollState {
    store: RedisStore,
    keys: DocumentKeys,
    version: String,
    last: Option<Value>,
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn read_once(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let keys = self.document_keys(path)?;
        let (document, _) = track_store_operation("read", self.load(&keys)).await?;
        Ok(tree::get(&document, &keys.rest))
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.mutate(path, "write", move |document, rest| {
            tree::set(document, rest, value.clone());
            Ok(())
        })
        .await
    }

    async fn merge(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.mutate(path, "merge", move |document, rest| {
            tree::merge(document, rest, fields.clone());
            Ok(())
        })
        .await
    }

    async fn merge_if(
        &self,
        path: &StorePath,
        fields: Map<String, Value>,
        guard: &(dyn for<'v> Fn(Option<&'v Value>) -> bool + Send + Sync),
    ) -> Result<bool, StoreError> {
        self.mutate(path, "merge_if", move |document, rest| {
            if !guard(tree::get(document, rest).as_ref()) {
                return Ok(false);
            }
            tree::merge(document, rest, fields.clone());
            Ok(true)
        })
        .await
    }

    async fn create_if_absent(&self, path: &StorePath, value: Value) -> Result<bool, StoreError> {
        self.mutate(path, "create_if_absent", move |document, rest| {
            if tree::get(document, rest).is_some() {
                return Ok(false);
            }
            tree::set(document, rest, value.clone());
            Ok(true)
        })
        .await
    }

    async fn increment(&self, path: &StorePath, delta: i64) -> Result<i64, StoreError> {
        self.mutate(path, "increment", move |document, rest| {
            tree::increment(document, rest, delta)
        })
        .await
    }

    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError> {
        let keys = self.document_keys(path)?;
        let (document, version) = self.load(&keys).await?;
        let initial = tree::get(&document, &keys.rest);

        let state = PollState {
            store: self.clone(),
            keys,
            version,
            last: initial.clone(),
        };

        let updates = stream::unfold(state, |mut state| async move {
            loop {
                tokio::time::sleep(state.store.poll_interval).await;

                let mut conn = state.store.conn.clone();
                let version: Option<String> = match redis::cmd("GET")
                    .arg(&state.keys.version)
                    .query_async(&mut conn)
                    .await
                {
                    Ok(version) => version,
                    Err(err) => {
                        tracing::warn!(error = %err, "Polling {} failed", state.keys.document);
                        continue;
                    }
                };
                if version.as_deref().unwrap_or("0") == state.version {
                    continue;
                }

                let (document, version) = match state.store.load(&state.keys).await {
                    Ok(loaded) => loaded,
                    Err(err) => {
                        tracing::warn!(error = %err, "Reloading {} failed", state.keys.document);
                        continue;
                    }
                };
                state.version = version;

                let current = tree::get(&document, &state.keys.rest);
                if current != state.last {
                    state.last = current.clone();
                    return Some((current, state));
                }
            }
        });

        Ok(stream::once(async move { initial }).chain(updates).boxed())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        tokio::time::timeout(
            Duration::from_millis(500),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| StoreError::Backend("Redis timeout after 500ms".to_string()))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_keys_split_on_the_second_segment() {
        let path = StorePath::parse("quizzes/TBF12345/participants/alice").unwrap();
        let keys = document_keys("triviabase", &path).unwrap();

        assert_eq!(keys.document, "triviabase:quizzes/TBF12345");
        assert_eq!(keys.version, "triviabase:quizzes/TBF12345:v");
        assert_eq!(keys.rest, vec!["participants".to_string(), "alice".to_string()]);

        let whole = document_keys("p", &StorePath::parse("leaderboard/alice").unwrap()).unwrap();
        assert!(whole.rest.is_empty());
    }

    #[test]
    fn single_segment_paths_do_not_address_a_document() {
        let root = StorePath::root("quizzes").unwrap();
        assert!(matches!(
            document_keys("triviabase", &root),
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn empty_documents_encode_as_delete() {
        assert_eq!(encode_document(&Value::Null).unwrap(), "");
        assert_eq!(encode_document(&json!({})).unwrap(), "");
        assert_eq!(
            encode_document(&json!({ "score": 9 })).unwrap(),
            r#"{"score":9}"#
        );
    }
}
