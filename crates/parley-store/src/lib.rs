//! # parley-store
//!
//! On-device cache for the Parley chat client, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed upsert/read helpers for users,
//! chats and messages, plus the bookkeeping needed to reconcile locally
//! created records with the server: synced flags, retry counters and the
//! temporary-to-server id remap log.

pub mod chats;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod remaps;
pub mod session;
pub mod users;

mod codec;
mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
