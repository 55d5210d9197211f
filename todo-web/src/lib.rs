//! Browser to-do list server library.
//!
//! Exposes the store backends, page template, and HTTP router for use in
//! the binary and in tests. One backend is chosen per deployment: the
//! in-memory [`store::MemoryStore`] or the PostgreSQL
//! [`postgres::PostgresStore`].

pub mod config;
pub mod error;
pub mod postgres;
pub mod server;
pub mod store;
pub mod template;
