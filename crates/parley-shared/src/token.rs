//! Session token claims.
//!
//! The backend issues a JWT whose payload names the logged-in user. The
//! client never verifies the signature (only the server can); it reads the
//! payload to learn who it is.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::TokenError;
use crate::protocol::split_full_name;
use crate::types::UserId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl TokenClaims {
    /// Decode the payload segment of `header.payload.signature`.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let mut parts = token.trim().split('.');
        let (Some(_header), Some(payload), Some(_sig), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        // Some issuers keep base64 padding; strip it for the no-pad engine.
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| TokenError::Base64Decode)?;

        serde_json::from_slice(&bytes).map_err(|e| TokenError::InvalidClaims(e.to_string()))
    }

    /// First and last name, preferring the split claims over `name`.
    pub fn names(&self) -> (String, String) {
        let (fallback_first, fallback_last) =
            split_full_name(self.name.as_deref().unwrap_or_default());
        let first = self
            .first_name
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback_first);
        let last = self
            .last_name
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback_last);
        (first, last)
    }
}

#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2ln")
}
