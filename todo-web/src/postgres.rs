//! PostgreSQL-backed [`TodoStore`].
//!
//! Items live in a single `todos` table. The schema is created on startup
//! with `CREATE TABLE IF NOT EXISTS`, so restarting against an existing
//! database keeps every stored item.
//!
//! # Example
//!
//! ```no_run
//! use todo_web::config::DatabaseSettings;
//! use todo_web::postgres::PostgresStore;
//!
//! # async fn example(settings: DatabaseSettings) -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresStore::connect(&settings).await?;
//! store.ensure_schema().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{PgPool, Row};
use tokio::sync::Mutex;

use crate::config::DatabaseSettings;
use crate::store::{StoreError, TodoItem, TodoStore};

/// How long to wait for a pooled connection before failing the request.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// `PostgreSQL` to-do store.
///
/// Every operation holds `lock` for the whole database round trip, so the
/// backend sees at most one statement from this process at a time.
pub struct PostgresStore {
    /// `PostgreSQL` connection pool.
    pool: PgPool,
    lock: Mutex<()>,
}

impl PostgresStore {
    /// Connect to the database described by `settings` and verify it answers.
    ///
    /// TLS is disabled on the connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connect`] if no connection can be established
    /// or the server does not answer a trivial query.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        Self::connect_with_timeout(settings, ACQUIRE_TIMEOUT).await
    }

    /// Like [`connect`](Self::connect), but waits at most `acquire_timeout`
    /// for a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connect`] if no connection can be established
    /// in time or the server does not answer a trivial query.
    pub async fn connect_with_timeout(
        settings: &DatabaseSettings,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.name)
            .ssl_mode(PgSslMode::Disable);

        tracing::debug!(
            host = %settings.host,
            port = settings.port,
            database = %settings.name,
            "connecting to postgres"
        );

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        let store = Self::from_pool(pool);
        store.ping().await?;
        Ok(store)
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            lock: Mutex::new(()),
        }
    }

    /// Run a trivial query to confirm the database is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connect`] if the query fails.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(())
    }

    /// Create the `todos` table if it does not exist yet.
    ///
    /// Safe to call on every startup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Schema`] if the statement fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS todos (
                id SERIAL PRIMARY KEY,
                task TEXT NOT NULL,
                done BOOLEAN NOT NULL DEFAULT FALSE
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Schema(e.to_string()))?;
        Ok(())
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_item(row: &PgRow) -> Result<TodoItem, sqlx::Error> {
        let id: i32 = row.try_get("id")?;
        Ok(TodoItem {
            id: i64::from(id),
            task: row.try_get("task")?,
            done: row.try_get("done")?,
        })
    }
}

impl TodoStore for PostgresStore {
    async fn list(&self) -> Result<Vec<TodoItem>, StoreError> {
        let _guard = self.lock.lock().await;
        let rows = sqlx::query("SELECT id, task, done FROM todos ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        rows.iter()
            .map(Self::row_to_item)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn add(&self, task: &str) -> Result<Option<TodoItem>, StoreError> {
        if task.is_empty() {
            return Ok(None);
        }

        let _guard = self.lock.lock().await;
        let row = sqlx::query(
            r"
            INSERT INTO todos (task, done)
            VALUES ($1, $2)
            RETURNING id, task, done
            ",
        )
        .bind(task)
        .bind(false)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;

        Self::row_to_item(&row)
            .map(Some)
            .map_err(|e| StoreError::Write(e.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
