//! Hierarchical key-tree store shared by hosts and players.
//!
//! Every piece of session state lives under a slash-separated path
//! (`quizzes/TBF1A2B3/current_question`). Backends implement
//! [`SessionStore`]; the coordination services only ever talk to the trait.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};
use std::fmt;

pub mod memory;
pub mod paths;
pub mod redis_store;
#[cfg(test)]
pub(crate) mod testing;
pub mod tree;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Characters the store refuses inside a single path segment.
pub const FORBIDDEN_KEY_CHARS: [char; 6] = ['.', '#', '$', '[', ']', '/'];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store path: {0}")]
    InvalidPath(String),

    #[error("value at {path} is not a number")]
    TypeMismatch { path: String },

    #[error("concurrent modification of {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Only a lost compare-and-swap is safe to replay. A transport error
    /// may arrive after the write already committed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Slash-separated location inside the key tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// Builds a path from a single root segment.
    pub fn root(segment: &str) -> Result<Self, StoreError> {
        Self::default_empty().child(segment)
    }

    /// Parses `a/b/c`. Empty segments and forbidden characters are rejected.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        raw.trim_matches('/')
            .split('/')
            .try_fold(Self::default_empty(), |path, segment| path.child(segment))
    }

    pub fn child(&self, segment: &str) -> Result<Self, StoreError> {
        validate_segment(segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    /// Numeric child, used for question indexes.
    pub fn index(&self, index: u32) -> Self {
        let mut segments = self.segments.clone();
        segments.push(index.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when one path is an ancestor of (or equal to) the other, i.e. a
    /// write to one can change what a reader of the other observes.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a == b)
    }

    fn default_empty() -> Self {
        Self {
            segments: Vec::new(),
        }
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

fn validate_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty() {
        return Err(StoreError::InvalidPath("empty path segment".to_string()));
    }
    if let Some(c) = segment.chars().find(|c| FORBIDDEN_KEY_CHARS.contains(c)) {
        return Err(StoreError::InvalidPath(format!(
            "segment '{}' contains forbidden character '{}'",
            segment, c
        )));
    }
    Ok(())
}

/// Stream of snapshots for a subscribed path. `None` means nothing is stored
/// there. The first item is the current value; dropping the stream
/// unsubscribes.
pub type Subscription = BoxStream<'static, Option<Value>>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Reads the subtree at `path` once.
    async fn read_once(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// Replaces the subtree at `path`. Writing `Value::Null` deletes it.
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// Sets each field below `path`, leaving sibling fields untouched.
    async fn merge(&self, path: &StorePath, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Merges `fields` below `path` only when `guard` accepts the subtree
    /// stored there at the moment of the write. Returns `false` when the
    /// guard refused and nothing was written.
    async fn merge_if(
        &self,
        path: &StorePath,
        fields: Map<String, Value>,
        guard: &(dyn for<'v> Fn(Option<&'v Value>) -> bool + Send + Sync),
    ) -> Result<bool, StoreError>;

    /// Writes `value` only when nothing is stored at `path`.
    /// Returns `false` when the path was already occupied.
    async fn create_if_absent(&self, path: &StorePath, value: Value) -> Result<bool, StoreError>;

    /// Atomically adds `delta` to the number at `path` (missing counts as 0)
    /// and returns the new value.
    async fn increment(&self, path: &StorePath, delta: i64) -> Result<i64, StoreError>;

    /// Observes the subtree at `path`.
    async fn subscribe(&self, path: &StorePath) -> Result<Subscription, StoreError>;

    /// Liveness check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_forbidden_characters() {
        assert!(StorePath::parse("quizzes/TBF12345").is_ok());
        assert!(StorePath::parse("quizzes/alice.smith").is_err());
        assert!(StorePath::parse("quizzes//x").is_err());
    }

    #[test]
    fn only_conflicts_are_retried() {
        assert!(StoreError::Conflict("quizzes/TBF12345".into()).is_retryable());
        assert!(!StoreError::Backend("connection reset".into()).is_retryable());
        assert!(!StoreError::TypeMismatch { path: "x/y".into() }.is_retryable());
    }

    #[test]
    fn overlap_is_symmetric_prefix_check() {
        let quiz = StorePath::parse("quizzes/TBF12345").unwrap();
        let flag = StorePath::parse("quizzes/TBF12345/game_start").unwrap();
        let other = StorePath::parse("quizzes/TBF99999").unwrap();

        assert!(quiz.overlaps(&flag));
        assert!(flag.overlaps(&quiz));
        assert!(!quiz.overlaps(&other));
    }

    #[test]
    fn display_joins_segments() {
        let path = StorePath::root("game_participant")
            .unwrap()
            .child("TBP0A1B2")
            .unwrap()
            .index(3);
        assert_eq!(path.to_string(), "game_participant/TBP0A1B2/3");
    }
}
