use parley_shared::error::{InviteError, TokenError};
use parley_shared::SharedError;
use parley_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Server rejected the request: {0}")]
    Rejected(String),

    #[error(transparent)]
    Shared(#[from] SharedError),

    #[error("Invite error: {0}")]
    Invite(#[from] InviteError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
