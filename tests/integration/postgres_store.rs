//! Integration tests for `PostgresStore` using testcontainers.
//!
//! These tests use a real `PostgreSQL` database. Docker must be running, so
//! they are ignored by default:
//!
//! ```bash
//! cargo test -p todo-web --test postgres_store -- --ignored
//! ```

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use todo_web::config::DatabaseSettings;
use todo_web::postgres::PostgresStore;
use todo_web::server::{self, AppState};
use todo_web::store::{StoreError, TodoItem, TodoStore};
use todo_web::template::PageTemplate;

/// Start a Postgres container and return it with matching connection settings.
async fn start_postgres() -> (ContainerAsync<Postgres>, DatabaseSettings) {
    let container = Postgres::default()
        .start()
        .await
        .expect("Failed to start postgres container");

    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get postgres port");

    let settings = DatabaseSettings {
        host: "127.0.0.1".to_string(),
        port,
        user: "postgres".to_string(),
        password: "postgres".to_string(),
        name: "postgres".to_string(),
        max_connections: 5,
    };

    (container, settings)
}

/// Connect with retries while the container finishes booting.
async fn connect(settings: &DatabaseSettings) -> PostgresStore {
    let mut retries = 0;
    loop {
        match PostgresStore::connect(settings).await {
            Ok(store) => return store,
            Err(e) => {
                assert!(retries < 60, "Failed to connect after 60 retries: {e}");
                retries += 1;
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

fn todo(id: i64, task: &str) -> TodoItem {
    TodoItem {
        id,
        task: task.to_string(),
        done: false,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn add_and_list_round_trip() {
    let (_container, settings) = start_postgres().await;
    let store = connect(&settings).await;
    store.ensure_schema().await.unwrap();

    assert!(store.list().await.unwrap().is_empty());

    assert_eq!(store.add("buy milk").await.unwrap(), Some(todo(1, "buy milk")));
    assert_eq!(store.add("").await.unwrap(), None);
    assert_eq!(store.add("walk dog").await.unwrap(), Some(todo(2, "walk dog")));

    assert_eq!(
        store.list().await.unwrap(),
        vec![todo(1, "buy milk"), todo(2, "walk dog")]
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn schema_creation_is_idempotent_and_keeps_rows() {
    let (_container, settings) = start_postgres().await;

    let first = connect(&settings).await;
    first.ensure_schema().await.unwrap();
    first.add("survives restart").await.unwrap();
    first.close().await;

    // A second startup against the same database.
    let second = connect(&settings).await;
    second.ensure_schema().await.unwrap();
    second.ensure_schema().await.unwrap();

    assert_eq!(
        second.list().await.unwrap(),
        vec![todo(1, "survives restart")]
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn done_defaults_to_false_for_rows_inserted_elsewhere() {
    let (_container, settings) = start_postgres().await;
    let store = connect(&settings).await;
    store.ensure_schema().await.unwrap();

    sqlx::query("INSERT INTO todos (task) VALUES ('from psql')")
        .execute(store.pool())
        .await
        .unwrap();

    assert_eq!(store.list().await.unwrap(), vec![todo(1, "from psql")]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn concurrent_adds_get_distinct_ids() {
    let (_container, settings) = start_postgres().await;
    let store = Arc::new(connect(&settings).await);
    store.ensure_schema().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.add(&format!("task {i}")).await.unwrap().unwrap().id
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();

    assert_eq!(ids.len(), 20);
    assert_eq!(store.list().await.unwrap().len(), 20);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn list_without_table_is_a_query_error() {
    let (_container, settings) = start_postgres().await;
    let store = connect(&settings).await;

    assert!(matches!(store.list().await, Err(StoreError::Query(_))));
    assert!(matches!(store.add("x").await, Err(StoreError::Write(_))));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn http_surface_over_postgres() {
    let (_container, settings) = start_postgres().await;
    let store = connect(&settings).await;
    store.ensure_schema().await.unwrap();

    let state = Arc::new(AppState::new(store, PageTemplate::builtin().unwrap()));
    let (addr, _handle) = server::start_server("127.0.0.1:0", Arc::clone(&state))
        .await
        .unwrap();

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let response = client
        .post(format!("http://{addr}/add"))
        .form(&[("task", "stored in postgres")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);

    let page = client
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("stored in postgres"));
}
