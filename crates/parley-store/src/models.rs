//! Domain model structs persisted in the local SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a UI layer. Conversions to and from the wire types in
//! [`parley_shared::protocol`] live here too, since the store is the only
//! place both shapes meet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use parley_shared::protocol::{NewMessageRequest, RemoteChat, RemoteMessage, RemoteUser};
use parley_shared::types::{ChatId, DeliveryStatus, MessageId, RecordKind, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A user profile cached on this device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Profile picture reference (URL or blob key); empty when unset.
    pub profile_pic: String,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl From<RemoteUser> for User {
    fn from(remote: RemoteUser) -> Self {
        let (first_name, last_name) = remote.split_name();
        Self {
            id: remote.id,
            first_name,
            last_name,
            email: remote.email,
            profile_pic: remote.profile_pic.unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A two-party conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    /// Temporary (`tmp-`) until the server confirms the chat.
    pub id: ChatId,
    /// The two participants, inviter first.
    pub participants: Vec<UserId>,
    pub last_message_id: Option<MessageId>,
    pub status: bool,
    pub is_online: bool,
    /// Denormalized title `"<name one>,<name two>"`.
    pub user_name: String,
    pub consent1: bool,
    pub consent2: bool,
    pub unread_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Whether the server has confirmed this record.
    pub is_synced: bool,
    /// Failed confirmation attempts since the last success.
    pub sync_attempts: u32,
    pub last_sync_error: Option<String>,
}

impl Chat {
    /// A fresh, unsynced chat between `me` and `other`.
    pub fn new_local(me: UserId, other: UserId, user_name: String) -> Self {
        let now = Utc::now();
        Self {
            id: ChatId::temporary(),
            participants: vec![me, other],
            last_message_id: None,
            status: true,
            is_online: false,
            user_name,
            consent1: false,
            consent2: false,
            unread_count: 0,
            created_at: now,
            updated_at: now,
            is_synced: false,
            sync_attempts: 0,
            last_sync_error: None,
        }
    }

    /// The participant that is not `me`, if any.
    pub fn peer_of(&self, me: &UserId) -> Option<&UserId> {
        self.participants.iter().find(|p| *p != me)
    }

    /// Wire form sent to `POST /chat/creates`.
    pub fn to_remote(&self) -> RemoteChat {
        RemoteChat {
            id: self.id.clone(),
            participants: self.participants.clone(),
            last_message_id: self.last_message_id.clone(),
            status: self.status,
            is_online: self.is_online,
            user_name: self.user_name.clone(),
            consent1: self.consent1,
            consent2: self.consent2,
            unread_count: self.unread_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<RemoteChat> for Chat {
    /// Anything the server returns is, by definition, synced.
    fn from(remote: RemoteChat) -> Self {
        Self {
            id: remote.id,
            participants: remote.participants,
            last_message_id: remote.last_message_id,
            status: remote.status,
            is_online: remote.is_online,
            user_name: remote.user_name,
            consent1: remote.consent1,
            consent2: remote.consent2,
            unread_count: remote.unread_count,
            created_at: remote.created_at,
            updated_at: remote.updated_at,
            is_synced: true,
            sync_attempts: 0,
            last_sync_error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub text: String,
    pub status: DeliveryStatus,
    /// Soft-delete flag; deleted messages stay in the table.
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_synced: bool,
    pub sync_attempts: u32,
    pub last_sync_error: Option<String>,
}

impl Message {
    /// A fresh, unsynced outgoing message.
    pub fn new_local(chat_id: ChatId, sender_id: UserId, text: String) -> Self {
        let now = Utc::now();
        Self {
            id: MessageId::temporary(),
            chat_id,
            sender_id,
            text,
            status: DeliveryStatus::Sent,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            is_synced: false,
            sync_attempts: 0,
            last_sync_error: None,
        }
    }

    /// Body for `POST /message/create`.
    pub fn to_request(&self) -> NewMessageRequest {
        NewMessageRequest {
            chat_id: self.chat_id.clone(),
            text: self.text.clone(),
            sender_id: self.sender_id.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<RemoteMessage> for Message {
    fn from(remote: RemoteMessage) -> Self {
        Self {
            id: remote.id,
            chat_id: remote.chat_id,
            sender_id: remote.sender_id,
            text: remote.text,
            status: remote.status,
            is_deleted: remote.is_deleted,
            created_at: remote.created_at,
            updated_at: remote.updated_at,
            is_synced: true,
            sync_attempts: 0,
            last_sync_error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Id remap
// ---------------------------------------------------------------------------

/// Record of a temporary id replaced by a server id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdRemap {
    pub temp_id: String,
    pub server_id: String,
    pub kind: RecordKind,
    pub remapped_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Credentials of the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    /// Opaque bearer token issued at login.
    pub token: String,
}
