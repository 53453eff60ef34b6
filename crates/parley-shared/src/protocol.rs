//! JSON bodies exchanged with the chat backend.
//!
//! The backend is a Mongo-backed REST service, so records carry their id
//! as `_id` and every other field is camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatId, DeliveryStatus, MessageId, UserId};

/// Chat record as the server stores it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteChat {
    #[serde(rename = "_id")]
    pub id: ChatId,
    #[serde(default)]
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub last_message_id: Option<MessageId>,
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub consent1: bool,
    #[serde(default)]
    pub consent2: bool,
    #[serde(default)]
    pub unread_count: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Message record as the server stores it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub chat_id: ChatId,
    #[serde(default)]
    pub text: String,
    pub sender_id: UserId,
    #[serde(default)]
    pub status: DeliveryStatus,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /message/create`. The server assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageRequest {
    pub chat_id: ChatId,
    pub text: String,
    pub sender_id: UserId,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User profile as returned by `GET /user/get`.
///
/// Older accounts only carry a single `name`; newer ones split it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profile_pic: Option<String>,
}

impl RemoteUser {
    /// First and last name, falling back to splitting `name` on whitespace.
    pub fn split_name(&self) -> (String, String) {
        if let Some(first) = self.first_name.as_deref().filter(|s| !s.is_empty()) {
            return (
                first.to_string(),
                self.last_name.clone().unwrap_or_default(),
            );
        }
        split_full_name(self.name.as_deref().unwrap_or_default())
    }
}

/// Split `"Ada Lovelace"` into `("Ada", "Lovelace")`. Every word after the
/// first belongs to the last name.
pub fn split_full_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or_default().to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Body carrying only an email (`/otp/send`, `/user/login`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Response of `/user/login` and `/user/signup`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub token: String,
}

/// Partial profile update for `PUT /user/update`. Absent fields are left
/// untouched by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

/// Body of `PUT /user/email`: the server checks the new address is free.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailChangeRequest {
    pub id: UserId,
    #[serde(rename = "x")]
    pub current_email: String,
    pub email: String,
}

/// Query string of `GET /chat/create`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatQuery {
    pub invite_to: UserId,
    pub scan: UserId,
    pub user_name: String,
}

/// Query string `?id=` used by every lookup endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IdQuery<'a> {
    pub id: &'a str,
}

/// Servers answer creation endpoints with the bare id, sometimes JSON
/// quoted. Strip whitespace and quotes.
pub fn parse_id_text(body: &str) -> Option<String> {
    let trimmed = body.trim().trim_matches('"').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
