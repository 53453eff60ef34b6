//! # parley-shared
//!
//! Types shared by the Parley store and client crates: record identifiers,
//! the JSON wire format spoken by the chat backend, invite payloads and
//! session token claims.

pub mod constants;
pub mod error;
pub mod invite;
pub mod protocol;
pub mod token;
pub mod types;

pub use error::SharedError;
