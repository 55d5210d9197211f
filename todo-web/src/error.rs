//! Error types for request handling and startup.
//!
//! [`AppError`] bridges request, store, and template failures to HTTP
//! responses by implementing axum's `IntoResponse`. [`StartupError`] covers everything
//! that must stop the process before it serves traffic.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::store::StoreError;
use crate::template::TemplateError;

/// A failed request.
///
/// Answered with the underlying message as a plain-text body: `400` for an
/// unreadable form body, `500` for everything else. Backend messages are
/// passed through verbatim.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The request claimed a form body that could not be parsed.
    #[error("bad form body: {0}")]
    BadRequest(String),

    /// The store could not read or write.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The page could not be rendered.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = self.to_string();
        tracing::warn!(status = status.as_u16(), error = %message, "request failed");
        (status, message).into_response()
    }
}

/// A failure before the server starts accepting requests. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The page template could not be loaded.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The backend could not be reached or prepared.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was attempted.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
