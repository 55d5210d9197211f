//! To-do item storage.
//!
//! Defines the [`TodoStore`] trait that both storage backends satisfy, the
//! [`TodoItem`] record they hold, and the in-memory [`MemoryStore`]. The
//! PostgreSQL backend lives in [`crate::postgres`].
//!
//! Every store serializes its operations behind a single lock that is held
//! for the full duration of a `list` or `add`, so mutations are totally
//! ordered and a list never observes a half-applied add.

use std::future::Future;

use tokio::sync::Mutex;

/// A single entry in the to-do list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TodoItem {
    /// Unique identifier, assigned by the store at creation.
    pub id: i64,
    /// Task text. Never empty.
    pub task: String,
    /// Completion flag. Always `false` at creation and never changed.
    pub done: bool,
}

/// Errors surfaced by a [`TodoStore`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached at startup.
    #[error("database connection failed: {0}")]
    Connect(String),

    /// The backing table could not be created.
    #[error("schema creation failed: {0}")]
    Schema(String),

    /// Reading the list failed.
    #[error("query error: {0}")]
    Query(String),

    /// Persisting a new item failed.
    #[error("insert error: {0}")]
    Write(String),
}

/// Storage backend for to-do items.
///
/// Implementations own all items and hand out copies. An empty task passed
/// to [`TodoStore::add`] is not an error: nothing is stored and `Ok(None)`
/// is returned.
pub trait TodoStore: Send + Sync {
    /// Return every stored item in a stable order.
    fn list(&self) -> impl Future<Output = Result<Vec<TodoItem>, StoreError>> + Send;

    /// Store a new item with `done = false`, returning it with its assigned id.
    ///
    /// Returns `Ok(None)` without touching the store when `task` is empty.
    fn add(&self, task: &str) -> impl Future<Output = Result<Option<TodoItem>, StoreError>> + Send;

    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;
}

/// Items and id counter guarded together by [`MemoryStore`]'s lock.
#[derive(Debug)]
struct MemoryInner {
    items: Vec<TodoItem>,
    next_id: i64,
}

/// Process-local store. Items are kept in insertion order and are lost
/// when the process exits.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store whose first item will get id 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                items: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Returns the number of stored items.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    /// Returns `true` if nothing has been stored yet.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.items.is_empty()
    }
}

impl TodoStore for MemoryStore {
    async fn list(&self) -> Result<Vec<TodoItem>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.items.clone())
    }

    async fn add(&self, task: &str) -> Result<Option<TodoItem>, StoreError> {
        if task.is_empty() {
            return Ok(None);
        }

        let mut inner = self.inner.lock().await;
        let item = TodoItem {
            id: inner.next_id,
            task: task.to_string(),
            done: false,
        };
        inner.next_id += 1;
        inner.items.push(item.clone());
        drop(inner);

        Ok(Some(item))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
