//! # parley-client
//!
//! Offline-first sync layer of the Parley chat client.
//!
//! - [`api`]: the REST backend behind the [`api::ChatApi`] trait
//! - [`sync`]: optimistic writes, confirmation and reconciliation
//! - [`connectivity`]: online/offline state and the probe loop
//! - [`auth`]: login, signup and profile maintenance
//! - [`state`]: wiring used by the `parley` binary

pub mod api;
pub mod auth;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod state;
pub mod sync;

#[cfg(test)]
mod testing;

pub use error::{ClientError, Result};
