//! In-process [`ChatApi`] used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use parley_shared::protocol::{
    CreateChatQuery, EmailChangeRequest, NewMessageRequest, RemoteChat, RemoteMessage,
    RemoteUser, SignupRequest, UpdateUserRequest, VerifyOtpRequest,
};
use parley_shared::types::{ChatId, MessageId, UserId};
use parley_store::Database;

use crate::api::ChatApi;
use crate::error::{ClientError, Result};
use crate::state::SharedDatabase;

pub const GOOD_OTP: &str = "123456";

#[derive(Default)]
pub struct FakeApi {
    pub offline: AtomicBool,
    next_id: AtomicUsize,
    pub token: Mutex<Option<String>>,
    pub issued_token: Mutex<String>,
    pub email_reply: Mutex<String>,
    pub users: Mutex<Vec<RemoteUser>>,
    pub user_updates: Mutex<Vec<UpdateUserRequest>>,
    pub email_changes: Mutex<Vec<EmailChangeRequest>>,
    pub chat_invites: Mutex<Vec<CreateChatQuery>>,
    pub pushed_chats: Mutex<Vec<RemoteChat>>,
    pub pushed_messages: Mutex<Vec<NewMessageRequest>>,
    pub server_chats: Mutex<Vec<RemoteChat>>,
    pub server_messages: Mutex<Vec<RemoteMessage>>,
    /// Response delays keyed by message text or chat `user_name`.
    pub delays: Mutex<HashMap<String, Duration>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        *api.email_reply.lock().unwrap() = "Email updated success".into();
        Arc::new(api)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn pushed_message_count(&self) -> usize {
        self.pushed_messages.lock().unwrap().len()
    }

    fn check(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ClientError::Api {
                status: 503,
                body: "unavailable".into(),
            })
        } else {
            Ok(())
        }
    }

    pub fn delay(&self, key: &str, millis: u64) {
        self.delays
            .lock()
            .unwrap()
            .insert(key.to_string(), Duration::from_millis(millis));
    }

    async fn pause(&self, key: &str) {
        let delay = self.delays.lock().unwrap().get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn mint(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

pub fn memory_db() -> SharedDatabase {
    Arc::new(Mutex::new(Database::open_in_memory().unwrap()))
}

#[async_trait]
impl ChatApi for FakeApi {
    fn set_token(&self, token: Option<String>) -> Result<()> {
        *self.token.lock().unwrap() = token;
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        self.check()
    }

    async fn signup(&self, _req: &SignupRequest) -> Result<String> {
        self.check()?;
        Ok(self.issued_token.lock().unwrap().clone())
    }

    async fn login(&self, _email: &str) -> Result<String> {
        self.check()?;
        Ok(self.issued_token.lock().unwrap().clone())
    }

    async fn get_user(&self, id: &UserId) -> Result<RemoteUser> {
        self.check()?;
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| &u.id == id)
            .cloned()
            .ok_or(ClientError::Api {
                status: 404,
                body: "user not found".into(),
            })
    }

    async fn update_user(&self, req: &UpdateUserRequest) -> Result<()> {
        self.check()?;
        self.user_updates.lock().unwrap().push(req.clone());
        Ok(())
    }

    async fn change_email(&self, req: &EmailChangeRequest) -> Result<String> {
        self.check()?;
        self.email_changes.lock().unwrap().push(req.clone());
        Ok(self.email_reply.lock().unwrap().clone())
    }

    async fn send_otp(&self, _email: &str) -> Result<String> {
        self.check()?;
        Ok("OTP sent".into())
    }

    async fn verify_otp(&self, req: &VerifyOtpRequest) -> Result<String> {
        self.check()?;
        Ok(if req.otp == GOOD_OTP {
            "OTP verified successfully".into()
        } else {
            "Invalid OTP".into()
        })
    }

    async fn create_chat(&self, query: &CreateChatQuery) -> Result<ChatId> {
        self.check()?;
        self.pause(&query.user_name).await;
        self.chat_invites.lock().unwrap().push(query.clone());
        Ok(ChatId(self.mint("srv-chat")))
    }

    async fn create_chats(&self, chat: &RemoteChat) -> Result<ChatId> {
        self.check()?;
        self.pause(&chat.user_name).await;
        self.pushed_chats.lock().unwrap().push(chat.clone());
        Ok(ChatId(self.mint("srv-chat")))
    }

    async fn list_chats(&self, user_id: &UserId) -> Result<Vec<RemoteChat>> {
        self.check()?;
        Ok(self
            .server_chats
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.participants.contains(user_id))
            .cloned()
            .collect())
    }

    async fn get_chat(&self, id: &ChatId) -> Result<RemoteChat> {
        self.check()?;
        self.server_chats
            .lock()
            .unwrap()
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or(ClientError::Api {
                status: 404,
                body: "chat not found".into(),
            })
    }

    async fn create_message(&self, req: &NewMessageRequest) -> Result<RemoteMessage> {
        self.check()?;
        self.pause(&req.text).await;
        self.pushed_messages.lock().unwrap().push(req.clone());
        Ok(RemoteMessage {
            id: MessageId(self.mint("srv-msg")),
            chat_id: req.chat_id.clone(),
            text: req.text.clone(),
            sender_id: req.sender_id.clone(),
            status: req.status,
            is_deleted: false,
            created_at: req.created_at,
            updated_at: req.updated_at,
        })
    }

    async fn list_messages(&self, chat_id: &ChatId) -> Result<Vec<RemoteMessage>> {
        self.check()?;
        Ok(self
            .server_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| &m.chat_id == chat_id)
            .cloned()
            .collect())
    }
}
