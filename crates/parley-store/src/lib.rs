//! # parley-store
//!
//! Persistence layer for Parley, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model: users, chat requests, and messages. Schema changes go through
//! versioned migrations guarded by SQLite's `user_version` pragma.

pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod requests;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
