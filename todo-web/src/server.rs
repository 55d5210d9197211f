//! HTTP surface: shared state, request handlers, and server startup.
//!
//! Two routes are served:
//!
//! | Method | Path   | Result                                   |
//! |--------|--------|------------------------------------------|
//! | GET    | `/`    | rendered list page                       |
//! | POST   | `/add` | store `task` field, 303 to `/`           |
//! | other  | `/add` | 303 to `/`, nothing stored               |
//!
//! Store and template failures are answered with a plain-text 500 via
//! [`AppError`]. A form body that cannot be parsed gets a 400.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Form, FromRequest, Multipart, Query, Request, State};
use axum::http::header;
use axum::response::{Html, Redirect};
use axum::routing::{get, post};

use crate::error::AppError;
use crate::store::TodoStore;
use crate::template::PageTemplate;

/// State shared by every request: the store and the compiled page.
///
/// Built once at startup and handed to the router; handlers never reach
/// for globals.
pub struct AppState<S> {
    /// Backing store for this deployment.
    pub store: S,
    template: PageTemplate,
}

impl<S: TodoStore> AppState<S> {
    /// Creates state from a ready store and a compiled template.
    #[must_use]
    pub const fn new(store: S, template: PageTemplate) -> Self {
        Self { store, template }
    }
}

/// Fields of a `POST /add` request, from the body or the query string.
#[derive(Debug, Default, serde::Deserialize)]
pub struct AddTodoForm {
    /// Task text. Absent and empty are treated alike when stored.
    #[serde(default)]
    pub task: Option<String>,
}

/// Builds the application router over `state`.
pub fn router<S: TodoStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/", get(list_todos::<S>))
        .route("/add", post(add_todo::<S>).fallback(redirect_home))
        .with_state(state)
}

/// `GET /`: render every stored item.
///
/// The page is rendered into a `String` before a response is built, so a
/// template failure yields a clean 500 with no partial body.
async fn list_todos<S: TodoStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Html<String>, AppError> {
    let items = state.store.list().await?;
    tracing::debug!(count = items.len(), "listing todos");
    let page = state.template.render(&items)?;
    Ok(Html(page))
}

/// `POST /add`: store the submitted task and send the browser back to `/`.
///
/// `task` is read from a urlencoded or multipart body first and from the
/// query string when the body does not carry it. A body that is neither
/// form type is ignored. A form body that cannot be parsed is a 400.
async fn add_todo<S: TodoStore>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<AddTodoForm>, QueryRejection>,
    request: Request,
) -> Result<Redirect, AppError> {
    let body_task = body_task(request).await?;
    let task = body_task
        .or_else(|| match query {
            Ok(Query(form)) => form.task,
            Err(rejection) => {
                tracing::debug!(error = %rejection, "unreadable add query, ignoring");
                None
            }
        })
        .unwrap_or_default();

    match state.store.add(&task).await? {
        Some(item) => tracing::info!(id = item.id, "todo added"),
        None => tracing::debug!("empty task ignored"),
    }

    Ok(Redirect::to("/"))
}

/// Read `task` from a form body, or `None` if the body has no such field
/// or is not a form.
async fn body_task(request: Request) -> Result<Option<String>, AppError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.to_string()))?;
        return multipart_task(multipart)
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()));
    }

    match Form::<AddTodoForm>::from_request(request, &()).await {
        Ok(Form(form)) => Ok(form.task),
        Err(FormRejection::InvalidFormContentType(rejection)) => {
            tracing::debug!(error = %rejection, "add body is not a form, ignoring");
            Ok(None)
        }
        Err(rejection) => Err(AppError::BadRequest(rejection.to_string())),
    }
}

/// First `task` field of a multipart body.
async fn multipart_task(mut multipart: Multipart) -> Result<Option<String>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("task") {
            return Ok(Some(field.text().await?));
        }
    }
    Ok(None)
}

/// Any non-POST request to `/add`.
#[allow(clippy::unused_async)]
async fn redirect_home() -> Redirect {
    Redirect::to("/")
}

/// Starts the server on the given address and returns the bound address
/// and a join handle.
///
/// This is the entry point used by test code; the server runs until the
/// handle is aborted.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server<S: TodoStore + 'static>(
    addr: &str,
    state: Arc<AppState<S>>,
) -> std::io::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    start_server_with_shutdown(addr, state, std::future::pending()).await
}

/// Starts the server and stops it gracefully once `shutdown` resolves.
///
/// In-flight requests are allowed to finish before the returned handle
/// completes.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_shutdown<S, F>(
    addr: &str,
    state: Arc<AppState<S>>,
    shutdown: F,
) -> std::io::Result<(SocketAddr, tokio::task::JoinHandle<()>)>
where
    S: TodoStore + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}
