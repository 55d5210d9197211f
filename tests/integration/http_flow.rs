//! End-to-end tests against a real listening server.
//!
//! Each test starts the server in-process on an OS-assigned port with the
//! in-memory backend and drives it over HTTP, the way a browser would.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::LOCATION;
use todo_web::server::{self, AppState};
use todo_web::store::{MemoryStore, TodoItem, TodoStore};
use todo_web::template::PageTemplate;

/// Start a server with an empty in-memory store.
async fn start() -> (String, Arc<AppState<MemoryStore>>, tokio::task::JoinHandle<()>) {
    let state = Arc::new(AppState::new(
        MemoryStore::new(),
        PageTemplate::builtin().expect("builtin template"),
    ));
    let (addr, handle) = server::start_server("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start server");
    (format!("http://{addr}"), state, handle)
}

/// Client that reports redirects instead of following them.
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client")
}

async fn add(client: &reqwest::Client, base: &str, task: &str) -> reqwest::Response {
    client
        .post(format!("{base}/add"))
        .form(&[("task", task)])
        .send()
        .await
        .expect("POST /add")
}

fn todo(id: i64, task: &str) -> TodoItem {
    TodoItem {
        id,
        task: task.to_string(),
        done: false,
    }
}

#[tokio::test]
async fn empty_store_renders_empty_page() {
    let (base, _state, _handle) = start().await;

    let response = client().get(&base).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("Nothing to do yet."));
}

#[tokio::test]
async fn add_then_list_walkthrough() {
    let (base, state, _handle) = start().await;
    let client = client();

    let response = add(&client, &base, "buy milk").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/");
    assert_eq!(state.store.list().await.unwrap(), vec![todo(1, "buy milk")]);

    let response = add(&client, &base, "").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(state.store.list().await.unwrap(), vec![todo(1, "buy milk")]);

    add(&client, &base, "walk dog").await;
    assert_eq!(
        state.store.list().await.unwrap(),
        vec![todo(1, "buy milk"), todo(2, "walk dog")]
    );

    let page = client.get(&base).send().await.unwrap().text().await.unwrap();
    let milk = page.find("buy milk").expect("first item rendered");
    let dog = page.find("walk dog").expect("second item rendered");
    assert!(milk < dog);
}

#[tokio::test]
async fn get_on_add_redirects_without_change() {
    let (base, state, _handle) = start().await;

    let response = client()
        .get(format!("{base}/add?task=sneaky"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/");
    assert!(state.store.is_empty().await);
}

#[tokio::test]
async fn post_with_task_in_query_string_is_stored() {
    let (base, state, _handle) = start().await;

    let response = client()
        .post(format!("{base}/add?task=buy+milk"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(state.store.list().await.unwrap(), vec![todo(1, "buy milk")]);
}

#[tokio::test]
async fn following_the_redirect_lands_on_the_list() {
    let (base, _state, _handle) = start().await;

    // Default policy follows the 303 with a GET to `/`.
    let response = reqwest::Client::new()
        .post(format!("{base}/add"))
        .form(&[("task", "follow me")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("follow me"));
}

#[tokio::test]
async fn concurrent_adds_are_all_kept_with_distinct_ids() {
    let (base, state, _handle) = start().await;
    let client = client();
    const N: usize = 40;

    let requests = (0..N).map(|i| {
        let client = client.clone();
        let base = base.clone();
        async move { add(&client, &base, &format!("task {i}")).await.status() }
    });
    let statuses = futures_util::future::join_all(requests).await;
    assert!(statuses.iter().all(|s| *s == StatusCode::SEE_OTHER));

    let items = state.store.list().await.unwrap();
    assert_eq!(items.len(), N);

    let mut ids: Vec<i64> = items.iter().map(|item| item.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), N);
    assert!(items.iter().all(|item| !item.done));
}

#[tokio::test]
async fn markup_in_task_is_escaped_on_the_page() {
    let (base, _state, _handle) = start().await;
    let client = client();

    add(&client, &base, "<b>bold</b>").await;
    let page = client.get(&base).send().await.unwrap().text().await.unwrap();

    assert!(!page.contains("<b>bold</b>"));
    assert!(page.contains("&lt;b&gt;bold&lt;"));
}
