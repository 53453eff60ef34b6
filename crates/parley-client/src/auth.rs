//! Login, signup and profile maintenance.
//!
//! Thin wrappers over the user/OTP endpoints that keep the local store and
//! the API bearer token in step with the server.

use std::sync::Arc;

use parley_shared::constants::OTP_LENGTH;
use parley_shared::invite::InvitePayload;
use parley_shared::protocol::{
    EmailChangeRequest, SignupRequest, UpdateUserRequest, VerifyOtpRequest,
};
use parley_shared::token::TokenClaims;
use parley_store::{Session, StoreError, User};

use crate::api::ChatApi;
use crate::error::{ClientError, Result};
use crate::state::{with_db, SharedDatabase};

/// Word the backend puts in a positive OTP verdict.
const OTP_OK_MARKER: &str = "successfully";
/// Word the backend puts in a positive email-change verdict.
const EMAIL_OK_MARKER: &str = "success";

/// Fields of a profile edit; `None` leaves the value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_pic: Option<String>,
}

pub struct AuthService {
    db: SharedDatabase,
    api: Arc<dyn ChatApi>,
}

impl AuthService {
    pub fn new(db: SharedDatabase, api: Arc<dyn ChatApi>) -> Self {
        Self { db, api }
    }

    /// Re-arm the API token from a session saved by an earlier run.
    pub fn restore_session(&self) -> Result<Option<Session>> {
        let session = with_db(&self.db, |db| db.load_session())?;
        if let Some(s) = &session {
            self.api.set_token(Some(s.token.clone()))?;
            tracing::debug!(user = %s.user_id, "session restored");
        }
        Ok(session)
    }

    pub async fn send_otp(&self, email: &str) -> Result<String> {
        let email = normalize_email(email)?;
        self.api.send_otp(&email).await
    }

    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<()> {
        let email = normalize_email(email)?;
        let code = code.trim();
        if code.len() != OTP_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ClientError::InvalidInput(format!(
                "OTP must be {OTP_LENGTH} digits"
            )));
        }

        let req = VerifyOtpRequest {
            email,
            otp: code.to_string(),
        };
        let verdict = self.api.verify_otp(&req).await?;
        if verdict.contains(OTP_OK_MARKER) {
            Ok(())
        } else {
            Err(ClientError::Rejected(verdict))
        }
    }

    pub async fn login(&self, email: &str) -> Result<User> {
        let email = normalize_email(email)?;
        let token = self.api.login(&email).await?;
        self.establish(token, &email)
    }

    pub async fn signup(&self, first_name: &str, last_name: &str, email: &str) -> Result<User> {
        let email = normalize_email(email)?;
        let req = SignupRequest {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            email: email.clone(),
        };
        let token = self.api.signup(&req).await?;
        self.establish(token, &email)
    }

    /// Decode the token, persist user and session, and install the token.
    fn establish(&self, token: String, email: &str) -> Result<User> {
        let claims = TokenClaims::decode(&token)?;
        let (first_name, last_name) = claims.names();
        let user = User {
            id: claims.id.clone(),
            first_name,
            last_name,
            email: claims.email.clone().unwrap_or_else(|| email.to_string()),
            profile_pic: String::new(),
        };
        let session = Session {
            user_id: user.id.clone(),
            token: token.clone(),
        };

        with_db(&self.db, |db| {
            db.upsert_user(&user)?;
            db.save_session(&session)
        })?;
        self.api.set_token(Some(token))?;

        tracing::info!(user = %user.id, "logged in");
        Ok(user)
    }

    pub fn session(&self) -> Result<Session> {
        with_db(&self.db, |db| db.load_session())?.ok_or(ClientError::NotLoggedIn)
    }

    /// The logged-in user from the local store.
    pub fn current_user(&self) -> Result<User> {
        with_db(&self.db, |db| db.current_user())?.ok_or(ClientError::NotLoggedIn)
    }

    /// Text to put in this user's invite code.
    pub fn invite_code(&self) -> Result<String> {
        let user = self.current_user()?;
        Ok(InvitePayload::new(user.id.clone(), user.full_name()).encode())
    }

    /// Replace the cached profile with the server's copy.
    pub async fn refresh_profile(&self) -> Result<User> {
        let session = self.session()?;
        let user = User::from(self.api.get_user(&session.user_id).await?);
        with_db(&self.db, |db| db.upsert_user(&user))?;
        Ok(user)
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User> {
        let mut user = self.current_user()?;
        let req = UpdateUserRequest {
            id: user.id.clone(),
            first_name: update.first_name.clone(),
            last_name: update.last_name.clone(),
            email: None,
            profile_pic: update.profile_pic.clone(),
        };
        self.api.update_user(&req).await?;

        if let Some(first) = update.first_name {
            user.first_name = first;
        }
        if let Some(last) = update.last_name {
            user.last_name = last;
        }
        if let Some(pic) = update.profile_pic {
            user.profile_pic = pic;
        }
        with_db(&self.db, |db| db.upsert_user(&user))?;
        Ok(user)
    }

    /// Move the account to `new_email`. The server checks the address is
    /// free before the profile is updated.
    pub async fn change_email(&self, new_email: &str) -> Result<User> {
        let new_email = normalize_email(new_email)?;
        let user = self.current_user()?;

        let check = EmailChangeRequest {
            id: user.id.clone(),
            current_email: user.email.clone(),
            email: new_email.clone(),
        };
        let verdict = self.api.change_email(&check).await?;
        if !verdict.contains(EMAIL_OK_MARKER) {
            return Err(ClientError::Rejected(verdict));
        }

        let update = UpdateUserRequest {
            id: user.id.clone(),
            email: Some(new_email.clone()),
            ..Default::default()
        };
        self.api.update_user(&update).await?;

        with_db(&self.db, |db| {
            if !db.update_user_email(&user.id, &new_email)? {
                return Err(StoreError::NotFound);
            }
            db.get_user(&user.id)
        })
    }

    /// Forget everything cached on this device.
    pub fn logout(&self) -> Result<()> {
        with_db(&self.db, |db| db.clear_all())?;
        self.api.set_token(None)?;
        tracing::info!("logged out");
        Ok(())
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ClientError::InvalidInput(format!("not an email address: {email:?}")));
    }
    Ok(email.to_lowercase())
}
