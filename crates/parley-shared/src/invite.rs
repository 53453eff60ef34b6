use serde::{Deserialize, Serialize};

use crate::constants::{UNKNOWN_USER_NAME, USER_NAME_SEPARATOR};
use crate::error::InviteError;
use crate::types::UserId;

/// What a user's invite QR code encodes: their id and display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvitePayload {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl InvitePayload {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }

    /// Encode as the JSON text placed in the QR code.
    pub fn encode(&self) -> String {
        // A struct of strings always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode scanned text back into a payload.
    pub fn decode(data: &str) -> Result<Self, InviteError> {
        let payload: Self = serde_json::from_str(data.trim())
            .map_err(|e| InviteError::InvalidFormat(e.to_string()))?;
        if payload.id.as_str().trim().is_empty() {
            return Err(InviteError::MissingUserId);
        }
        Ok(payload)
    }

    /// Invitee name, or the placeholder when the code carried none.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_USER_NAME)
    }

    /// The denormalized chat title `"<mine>,<theirs>"`.
    pub fn chat_user_name(&self, my_name: &str) -> String {
        format!("{my_name}{USER_NAME_SEPARATOR}{}", self.display_name())
    }

    /// Reject invites that point at the scanning user.
    pub fn check_not_self(&self, me: &UserId) -> Result<(), InviteError> {
        if &self.id == me {
            return Err(InviteError::SelfInvite);
        }
        Ok(())
    }
}
