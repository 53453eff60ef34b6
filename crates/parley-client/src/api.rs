//! REST client for the chat backend.
//!
//! [`ChatApi`] is the seam the sync engine and auth service talk through;
//! [`HttpApi`] is the reqwest implementation used in production. Tests swap
//! in an in-process fake.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use parley_shared::protocol::{
    parse_id_text, CreateChatQuery, EmailChangeRequest, EmailRequest, IdQuery,
    NewMessageRequest, RemoteChat, RemoteMessage, RemoteUser, SignupRequest, TokenResponse,
    UpdateUserRequest, VerifyOtpRequest,
};
use parley_shared::types::{ChatId, UserId};

use crate::error::{ClientError, Result};

/// One method per backend endpoint.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Install or clear the bearer token sent with every request.
    fn set_token(&self, token: Option<String>) -> Result<()>;

    /// Succeeds if the backend answered at all, whatever the status.
    async fn probe(&self) -> Result<()>;

    async fn signup(&self, req: &SignupRequest) -> Result<String>;
    async fn login(&self, email: &str) -> Result<String>;
    async fn get_user(&self, id: &UserId) -> Result<RemoteUser>;
    async fn update_user(&self, req: &UpdateUserRequest) -> Result<()>;
    /// `PUT /user/email`; returns the server's text verdict.
    async fn change_email(&self, req: &EmailChangeRequest) -> Result<String>;

    async fn send_otp(&self, email: &str) -> Result<String>;
    async fn verify_otp(&self, req: &VerifyOtpRequest) -> Result<String>;

    /// `GET /chat/create`, the invite-scan flow.
    async fn create_chat(&self, query: &CreateChatQuery) -> Result<ChatId>;
    /// `POST /chat/creates`, used to push a chat created offline.
    async fn create_chats(&self, chat: &RemoteChat) -> Result<ChatId>;
    async fn list_chats(&self, user_id: &UserId) -> Result<Vec<RemoteChat>>;
    async fn get_chat(&self, id: &ChatId) -> Result<RemoteChat>;

    async fn create_message(&self, req: &NewMessageRequest) -> Result<RemoteMessage>;
    /// Every message of a chat.
    async fn list_messages(&self, chat_id: &ChatId) -> Result<Vec<RemoteMessage>>;
}

/// [`ChatApi`] over HTTP.
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.read().map_err(|_| ClientError::LockPoisoned)?;
        Ok(match token.as_deref() {
            Some(t) => builder.bearer_auth(t),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let resp = self.authorized(builder)?.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), %body, "backend returned an error");
        Err(ClientError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let resp = self.send(builder).await?;
        resp.json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn send_text(&self, builder: RequestBuilder) -> Result<String> {
        Ok(self.send(builder).await?.text().await?)
    }

    async fn send_id(&self, builder: RequestBuilder) -> Result<ChatId> {
        let body = self.send_text(builder).await?;
        parse_id_text(&body)
            .map(ChatId)
            .ok_or_else(|| ClientError::Decode(format!("expected an id, got {body:?}")))
    }
}

#[async_trait]
impl ChatApi for HttpApi {
    fn set_token(&self, token: Option<String>) -> Result<()> {
        *self.token.write().map_err(|_| ClientError::LockPoisoned)? = token;
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        self.client.get(self.url("/")).send().await?;
        Ok(())
    }

    async fn signup(&self, req: &SignupRequest) -> Result<String> {
        let resp: TokenResponse = self
            .send_json(self.client.post(self.url("/user/signup")).json(req))
            .await?;
        Ok(resp.token)
    }

    async fn login(&self, email: &str) -> Result<String> {
        let body = EmailRequest {
            email: email.to_string(),
        };
        let resp: TokenResponse = self
            .send_json(self.client.post(self.url("/user/login")).json(&body))
            .await?;
        Ok(resp.token)
    }

    async fn get_user(&self, id: &UserId) -> Result<RemoteUser> {
        let query = IdQuery { id: id.as_str() };
        self.send_json(self.client.get(self.url("/user/get")).query(&query))
            .await
    }

    async fn update_user(&self, req: &UpdateUserRequest) -> Result<()> {
        self.send(self.client.put(self.url("/user/update")).json(req))
            .await?;
        Ok(())
    }

    async fn change_email(&self, req: &EmailChangeRequest) -> Result<String> {
        self.send_text(self.client.put(self.url("/user/email")).json(req))
            .await
    }

    async fn send_otp(&self, email: &str) -> Result<String> {
        let body = EmailRequest {
            email: email.to_string(),
        };
        self.send_text(self.client.post(self.url("/otp/send")).json(&body))
            .await
    }

    async fn verify_otp(&self, req: &VerifyOtpRequest) -> Result<String> {
        self.send_text(self.client.post(self.url("/otp/verify")).json(req))
            .await
    }

    async fn create_chat(&self, query: &CreateChatQuery) -> Result<ChatId> {
        self.send_id(self.client.get(self.url("/chat/create")).query(query))
            .await
    }

    async fn create_chats(&self, chat: &RemoteChat) -> Result<ChatId> {
        self.send_id(self.client.post(self.url("/chat/creates")).json(chat))
            .await
    }

    async fn list_chats(&self, user_id: &UserId) -> Result<Vec<RemoteChat>> {
        let query = IdQuery {
            id: user_id.as_str(),
        };
        self.send_json(self.client.get(self.url("/chat/list")).query(&query))
            .await
    }

    async fn get_chat(&self, id: &ChatId) -> Result<RemoteChat> {
        let query = IdQuery { id: id.as_str() };
        self.send_json(self.client.get(self.url("/chat/get")).query(&query))
            .await
    }

    async fn create_message(&self, req: &NewMessageRequest) -> Result<RemoteMessage> {
        self.send_json(self.client.post(self.url("/message/create")).json(req))
            .await
    }

    async fn list_messages(&self, chat_id: &ChatId) -> Result<Vec<RemoteMessage>> {
        let query = IdQuery {
            id: chat_id.as_str(),
        };
        self.send_json(self.client.get(self.url("/message/get")).query(&query))
            .await
    }
}
