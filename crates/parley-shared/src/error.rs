use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Invite error: {0}")]
    Invite(#[from] InviteError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Unknown delivery status: {0}")]
    UnknownStatus(String),

    #[error("Unknown record kind: {0}")]
    UnknownRecordKind(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum InviteError {
    #[error("Invalid invite format: {0}")]
    InvalidFormat(String),

    #[error("Invite does not name a user")]
    MissingUserId,

    #[error("Cannot open a chat with yourself")]
    SelfInvite,
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token is not a three-part JWT")]
    Malformed,

    #[error("Base64 decode error")]
    Base64Decode,

    #[error("Invalid claims: {0}")]
    InvalidClaims(String),
}
