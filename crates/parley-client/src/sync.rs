//! Optimistic writes, server confirmation and reconciliation.
//!
//! Every locally created chat or message is written to the store first
//! under a temporary id with `is_synced = false`. When the backend is
//! reachable the record is pushed immediately; the server's id then
//! replaces the temporary one via [`Database::confirm_chat`] /
//! [`Database::confirm_message`]. Anything that could not be pushed stays
//! unsynced and is picked up by [`SyncEngine::reconcile`] on the next
//! offline to online transition.
//!
//! The database mutex is only ever locked inside synchronous closures
//! passed to [`with_db`], so no guard lives across an `.await`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use parley_shared::invite::InvitePayload;
use parley_shared::protocol::CreateChatQuery;
use parley_shared::types::{ChatId, UserId};
use parley_store::{Chat, Database, Message, StoreError};

use crate::api::ChatApi;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{ClientError, Result};
use crate::events::{EventBus, SyncEvent};
use crate::state::{with_db, SharedDatabase};

/// Outcome of one [`SyncEngine::reconcile`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub chats_synced: usize,
    pub chats_failed: usize,
    pub messages_synced: usize,
    pub messages_failed: usize,
    /// Messages held back because their chat is not confirmed yet.
    pub messages_skipped: usize,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn failed(&self) -> usize {
        self.chats_failed + self.messages_failed
    }
}

/// A chat together with its cached messages, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatView {
    pub chat: Option<Chat>,
    pub messages: Vec<Message>,
}

pub struct SyncEngine {
    db: SharedDatabase,
    api: Arc<dyn ChatApi>,
    connectivity: ConnectivityMonitor,
    events: EventBus,
    /// Held for the duration of a reconciliation pass.
    reconcile_guard: tokio::sync::Mutex<()>,
    /// Ids with a create request on the wire.
    in_flight: Mutex<HashSet<String>>,
}

impl SyncEngine {
    pub fn new(
        db: SharedDatabase,
        api: Arc<dyn ChatApi>,
        connectivity: ConnectivityMonitor,
        events: EventBus,
    ) -> Self {
        Self {
            db,
            api,
            connectivity,
            events,
            reconcile_guard: tokio::sync::Mutex::new(()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ------------------------------------------------------------------
    // Optimistic writes
    // ------------------------------------------------------------------

    /// Queue a message locally and push it if possible.
    ///
    /// The returned message reflects the store after the attempt: synced
    /// with a server id on success, otherwise still under its temporary id.
    pub async fn send_message(
        &self,
        chat_id: &ChatId,
        sender_id: &UserId,
        text: &str,
    ) -> Result<Message> {
        if text.trim().is_empty() {
            return Err(ClientError::InvalidInput("message text is empty".into()));
        }

        let chat_id = with_db(&self.db, |db| db.resolve_chat_id(chat_id))?;
        let msg = Message::new_local(chat_id.clone(), sender_id.clone(), text.to_string());
        with_db(&self.db, |db| {
            db.upsert_message(&msg)?;
            db.set_chat_last_message(&chat_id, &msg.id)?;
            Ok(())
        })?;

        tracing::debug!(chat = %chat_id, message = %msg.id, "message queued");
        self.events.emit(SyncEvent::MessageQueued {
            chat_id: chat_id.clone(),
            message_id: msg.id.clone(),
        });

        if self.connectivity.is_online() && !chat_id.is_temporary() {
            if let Err(e) = self.push_message(&msg).await {
                tracing::warn!(message = %msg.id, error = %e, "send failed, kept for retry");
            }
        }

        with_db(&self.db, |db| {
            let id = db.resolve_message_id(&msg.id)?;
            db.get_message(&id)
        })
    }

    /// Start a chat from a scanned invite and push it if possible.
    pub async fn create_chat_from_invite(
        &self,
        me: &UserId,
        my_name: &str,
        invite: &str,
    ) -> Result<Chat> {
        let payload = InvitePayload::decode(invite)?;
        payload.check_not_self(me)?;

        let user_name = payload.chat_user_name(my_name);
        let chat = Chat::new_local(me.clone(), payload.id.clone(), user_name.clone());
        with_db(&self.db, |db| db.upsert_chat(&chat))?;

        tracing::debug!(chat = %chat.id, peer = %payload.id, "chat queued");
        self.events.emit(SyncEvent::ChatQueued {
            chat_id: chat.id.clone(),
        });

        if self.connectivity.is_online() {
            let query = CreateChatQuery {
                invite_to: payload.id.clone(),
                scan: me.clone(),
                user_name,
            };
            if let Some(_claim) = self.claim(chat.id.as_str())? {
                let result = self.api.create_chat(&query).await;
                if let Err(e) = self.settle_chat(&chat.id, result) {
                    tracing::warn!(chat = %chat.id, error = %e, "chat create failed, kept for retry");
                }
            }
        }

        with_db(&self.db, |db| {
            let id = db.resolve_chat_id(&chat.id)?;
            db.get_chat(&id)
        })
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Push every unsynced chat, then every unsynced message.
    ///
    /// A call made while another pass is running returns an empty report.
    pub async fn reconcile(&self) -> Result<SyncReport> {
        let Ok(_guard) = self.reconcile_guard.try_lock() else {
            tracing::debug!("reconciliation already running");
            return Ok(SyncReport::default());
        };

        let mut report = SyncReport::default();

        let chats = with_db(&self.db, |db| db.list_unsynced_chats())?;
        for chat in chats {
            match self.push_chat(&chat).await {
                Ok(true) => report.chats_synced += 1,
                Ok(false) => {}
                Err(ClientError::Store(e)) => return Err(e.into()),
                Err(_) => report.chats_failed += 1,
            }
        }

        // Listed after the chat pass so confirmed chat ids have cascaded.
        let msgs = with_db(&self.db, |db| db.list_unsynced_messages())?;
        for msg in msgs {
            if msg.chat_id.is_temporary() {
                report.messages_skipped += 1;
                continue;
            }
            match self.push_message(&msg).await {
                Ok(true) => report.messages_synced += 1,
                Ok(false) => report.messages_skipped += 1,
                Err(ClientError::Store(e)) => return Err(e.into()),
                Err(_) => report.messages_failed += 1,
            }
        }

        tracing::info!(
            chats_synced = report.chats_synced,
            chats_failed = report.chats_failed,
            messages_synced = report.messages_synced,
            messages_failed = report.messages_failed,
            messages_skipped = report.messages_skipped,
            "reconciliation finished"
        );
        self.events.emit(SyncEvent::Reconciled(report.clone()));
        Ok(report)
    }

    /// Reconcile on every offline to online transition, and once up front
    /// if already online. Runs until the connectivity monitor is dropped.
    pub async fn run_on_reconnect(&self) {
        let mut rx = self.connectivity.subscribe();
        let mut was_online = *rx.borrow_and_update();
        if was_online {
            self.reconcile_logged().await;
        }

        while rx.changed().await.is_ok() {
            let online = *rx.borrow_and_update();
            if online == was_online {
                continue;
            }
            self.events.emit(SyncEvent::ConnectivityChanged { online });
            if online {
                self.reconcile_logged().await;
            }
            was_online = online;
        }
    }

    async fn reconcile_logged(&self) {
        if let Err(e) = self.reconcile().await {
            tracing::error!(error = %e, "reconciliation failed");
        }
    }

    // ------------------------------------------------------------------
    // Cached reads
    // ------------------------------------------------------------------

    /// Local chats merged with the server's list when reachable.
    pub async fn load_chats(&self, user_id: &UserId) -> Result<Vec<Chat>> {
        let local = with_db(&self.db, |db| db.list_chats())?;
        if !self.connectivity.is_online() {
            tracing::debug!(count = local.len(), "offline, serving cached chats");
            return Ok(local);
        }

        match self.api.list_chats(user_id).await {
            Ok(remote) => {
                let chats: Vec<Chat> = remote.into_iter().map(Chat::from).collect();
                tracing::debug!(count = chats.len(), "chats refreshed from server");
                with_db(&self.db, |db| {
                    db.upsert_chats(&chats)?;
                    db.list_chats()
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat list fetch failed, serving cache");
                Ok(local)
            }
        }
    }

    /// One chat and its messages; refreshed from the server when reachable.
    pub async fn open_chat(&self, chat_id: &ChatId) -> Result<ChatView> {
        let chat_id = with_db(&self.db, |db| db.resolve_chat_id(chat_id))?;

        if self.connectivity.is_online() && !chat_id.is_temporary() {
            if let Err(e) = self.refresh_chat(&chat_id).await {
                tracing::warn!(chat = %chat_id, error = %e, "chat fetch failed, serving cache");
            }
        }

        with_db(&self.db, |db| {
            let chat = found(db.get_chat(&chat_id))?;
            let messages = db.list_messages_for_chat(&chat_id)?;
            Ok(ChatView { chat, messages })
        })
    }

    async fn refresh_chat(&self, chat_id: &ChatId) -> Result<()> {
        let chat = Chat::from(self.api.get_chat(chat_id).await?);
        let messages: Vec<Message> = self
            .api
            .list_messages(chat_id)
            .await?
            .into_iter()
            .map(Message::from)
            .collect();
        with_db(&self.db, |db| {
            db.upsert_chat(&chat)?;
            db.upsert_messages(&messages)
        })
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Push one message. `Ok(false)` means nothing was sent: another task
    /// holds the id, or the row was confirmed after the caller read it.
    async fn push_message(&self, msg: &Message) -> Result<bool> {
        let Some(_claim) = self.claim(msg.id.as_str())? else {
            return Ok(false);
        };
        let current = with_db(&self.db, |db| found(db.get_message(&msg.id)))?;
        let Some(msg) = current.filter(|m| !m.is_synced && !m.chat_id.is_temporary()) else {
            return Ok(false);
        };

        match self.api.create_message(&msg.to_request()).await {
            Ok(remote) => {
                let server_id = remote.id.clone();
                let saved = Message::from(remote);
                let confirmed = with_db(&self.db, |db| {
                    if !db.confirm_message(&msg.id, &server_id)? {
                        return Ok(false);
                    }
                    db.upsert_message(&saved)?;
                    Ok(true)
                })?;
                if confirmed {
                    self.events.emit(SyncEvent::MessageConfirmed {
                        temp_id: msg.id.clone(),
                        server_id,
                    });
                } else {
                    tracing::warn!(message = %msg.id, server = %server_id, "message vanished before confirmation");
                }
                Ok(confirmed)
            }
            Err(e) => {
                self.fail(msg.id.as_str(), &e, |db, err| {
                    db.record_message_sync_failure(&msg.id, err)
                })?;
                Err(e)
            }
        }
    }

    /// Push one queued chat through `/chat/creates`. `Ok(false)` as for
    /// [`Self::push_message`].
    async fn push_chat(&self, chat: &Chat) -> Result<bool> {
        let Some(_claim) = self.claim(chat.id.as_str())? else {
            return Ok(false);
        };
        let current = with_db(&self.db, |db| found(db.get_chat(&chat.id)))?;
        let Some(chat) = current.filter(|c| !c.is_synced) else {
            return Ok(false);
        };

        let result = self.api.create_chats(&chat.to_remote()).await;
        self.settle_chat(&chat.id, result)?;
        Ok(true)
    }

    /// Apply the server's answer to a chat create request.
    fn settle_chat(&self, temp_id: &ChatId, result: Result<ChatId>) -> Result<()> {
        match result {
            Ok(server_id) => {
                if with_db(&self.db, |db| db.confirm_chat(temp_id, &server_id))? {
                    self.events.emit(SyncEvent::ChatConfirmed {
                        temp_id: temp_id.clone(),
                        server_id,
                    });
                } else {
                    tracing::warn!(chat = %temp_id, server = %server_id, "chat vanished before confirmation");
                }
                Ok(())
            }
            Err(e) => {
                self.fail(temp_id.as_str(), &e, |db, err| {
                    db.record_chat_sync_failure(temp_id, err)
                })?;
                Err(e)
            }
        }
    }

    fn fail<F>(&self, record_id: &str, error: &ClientError, record: F) -> Result<()>
    where
        F: FnOnce(&mut Database, &str) -> parley_store::Result<()>,
    {
        let text = error.to_string();
        tracing::warn!(record = record_id, error = %text, "sync attempt failed");
        with_db(&self.db, |db| record(db, &text))?;
        self.events.emit(SyncEvent::SyncFailed {
            record_id: record_id.to_string(),
            error: text,
        });
        Ok(())
    }

    /// Reserve `id` for one push; `None` if it is already on the wire.
    fn claim(&self, id: &str) -> Result<Option<Claim<'_>>> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| ClientError::LockPoisoned)?;
        if !set.insert(id.to_string()) {
            return Ok(None);
        }
        Ok(Some(Claim {
            set: &self.in_flight,
            id: id.to_string(),
        }))
    }
}

fn found<T>(result: parley_store::Result<T>) -> parley_store::Result<Option<T>> {
    match result {
        Ok(row) => Ok(Some(row)),
        Err(StoreError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Releases an in-flight id on drop.
struct Claim<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_db, FakeApi};
    use chrono::Utc;
    use parley_shared::protocol::{RemoteChat, RemoteMessage};
    use parley_shared::types::{DeliveryStatus, MessageId};
    use std::time::Duration;

    struct Harness {
        db: SharedDatabase,
        api: Arc<FakeApi>,
        engine: Arc<SyncEngine>,
    }

    fn harness(online: bool) -> Harness {
        let db = memory_db();
        let api = FakeApi::new();
        let engine = Arc::new(SyncEngine::new(
            db.clone(),
            api.clone(),
            ConnectivityMonitor::new(online),
            EventBus::new(),
        ));
        Harness { db, api, engine }
    }

    fn server_chat(id: &str, me: &str) -> RemoteChat {
        RemoteChat {
            id: ChatId::from(id),
            participants: vec![UserId::from(me), UserId::from("peer")],
            last_message_id: None,
            status: true,
            is_online: false,
            user_name: "Me,Peer".into(),
            consent1: true,
            consent2: true,
            unread_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn seed_synced_chat(h: &Harness, id: &str) -> ChatId {
        let chat = Chat::from(server_chat(id, "me"));
        h.db.lock().unwrap().upsert_chat(&chat).unwrap();
        chat.id
    }

    const INVITE: &str = r#"{"id":"peer","name":"Grace"}"#;
    const SECOND_INVITE: &str = r#"{"id":"peer2","name":"Linus"}"#;

    #[tokio::test]
    async fn test_send_online_confirms_immediately() {
        let h = harness(true);
        let chat = seed_synced_chat(&h, "c1");

        let msg = h
            .engine
            .send_message(&chat, &UserId::from("me"), "hello")
            .await
            .unwrap();

        assert!(msg.is_synced);
        assert_eq!(msg.id.as_str(), "srv-msg-1");
        let db = h.db.lock().unwrap();
        assert_eq!(db.list_messages_for_chat(&chat).unwrap().len(), 1);
        assert_eq!(
            db.get_chat(&chat).unwrap().last_message_id,
            Some(MessageId::from("srv-msg-1"))
        );
    }

    #[tokio::test]
    async fn test_failed_send_keeps_exactly_one_unsynced_row() {
        let h = harness(true);
        let chat = seed_synced_chat(&h, "c1");
        h.api.set_offline(true);

        let msg = h
            .engine
            .send_message(&chat, &UserId::from("me"), "hello")
            .await
            .unwrap();

        assert!(!msg.is_synced);
        assert!(msg.id.is_temporary());
        assert_eq!(msg.sync_attempts, 1);
        let db = h.db.lock().unwrap();
        assert_eq!(db.list_unsynced_messages().unwrap().len(), 1);
        assert_eq!(db.list_messages_for_chat(&chat).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_message_rejected() {
        let h = harness(true);
        let err = h
            .engine
            .send_message(&ChatId::from("c1"), &UserId::from("me"), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
        assert_eq!(h.api.pushed_message_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_send_does_not_hit_network() {
        let h = harness(false);
        let chat = seed_synced_chat(&h, "c1");

        let msg = h
            .engine
            .send_message(&chat, &UserId::from("me"), "queued")
            .await
            .unwrap();

        assert!(!msg.is_synced);
        assert_eq!(msg.sync_attempts, 0);
        assert_eq!(h.api.pushed_message_count(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_retries_until_synced() {
        let h = harness(false);
        let chat = seed_synced_chat(&h, "c1");
        h.engine
            .send_message(&chat, &UserId::from("me"), "one")
            .await
            .unwrap();
        h.engine
            .send_message(&chat, &UserId::from("me"), "two")
            .await
            .unwrap();

        h.api.set_offline(true);
        let report = h.engine.reconcile().await.unwrap();
        assert_eq!(report.messages_failed, 2);
        assert_eq!(h.db.lock().unwrap().list_unsynced_messages().unwrap().len(), 2);

        h.api.set_offline(false);
        let report = h.engine.reconcile().await.unwrap();
        assert_eq!(report.messages_synced, 2);
        assert_eq!(report.failed(), 0);

        let db = h.db.lock().unwrap();
        assert!(db.list_unsynced_messages().unwrap().is_empty());
        let msgs = db.list_messages_for_chat(&chat).unwrap();
        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().all(|m| m.is_synced && !m.id.is_temporary()));
    }

    #[tokio::test]
    async fn test_offline_chat_and_message_reconcile_in_order() {
        let h = harness(false);
        let me = UserId::from("me");
        let chat = h
            .engine
            .create_chat_from_invite(&me, "Ada", INVITE)
            .await
            .unwrap();
        assert!(chat.id.is_temporary());
        assert_eq!(chat.user_name, "Ada,Grace");

        let msg = h.engine.send_message(&chat.id, &me, "hi").await.unwrap();
        assert_eq!(msg.chat_id, chat.id);

        let report = h.engine.reconcile().await.unwrap();
        assert_eq!(report.chats_synced, 1);
        assert_eq!(report.messages_synced, 1);
        assert_eq!(report.messages_skipped, 0);

        let pushed = h.api.pushed_messages.lock().unwrap().clone();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].chat_id.as_str(), "srv-chat-1");

        let db = h.db.lock().unwrap();
        let chats = db.list_chats().unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].id.as_str(), "srv-chat-1");
        assert_eq!(chats[0].last_message_id, Some(MessageId::from("srv-msg-2")));
        assert_eq!(db.resolve_chat_id(&chat.id).unwrap().as_str(), "srv-chat-1");
    }

    #[tokio::test]
    async fn test_messages_wait_for_their_chat() {
        let h = harness(false);
        let me = UserId::from("me");
        let chat = h
            .engine
            .create_chat_from_invite(&me, "Ada", INVITE)
            .await
            .unwrap();
        h.engine.send_message(&chat.id, &me, "hi").await.unwrap();

        // Chat push fails, so its message must not be sent with a temp chat id.
        h.api.set_offline(true);
        let report = h.engine.reconcile().await.unwrap();
        assert_eq!(report.chats_failed, 1);
        assert_eq!(report.messages_skipped, 1);
        assert_eq!(report.messages_failed, 0);
        assert_eq!(h.api.pushed_message_count(), 0);
    }

    #[tokio::test]
    async fn test_invite_online_uses_scan_endpoint() {
        let h = harness(true);
        let chat = h
            .engine
            .create_chat_from_invite(&UserId::from("me"), "Ada", r#"{"id":"peer"}"#)
            .await
            .unwrap();

        assert!(chat.is_synced);
        assert_eq!(chat.user_name, "Ada,Unknown");
        let invites = h.api.chat_invites.lock().unwrap().clone();
        assert_eq!(invites.len(), 1);
        assert_eq!(invites[0].invite_to.as_str(), "peer");
        assert_eq!(invites[0].scan.as_str(), "me");
    }

    #[tokio::test]
    async fn test_self_invite_rejected() {
        let h = harness(true);
        let err = h
            .engine
            .create_chat_from_invite(&UserId::from("peer"), "Grace", INVITE)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Invite(_)));
        assert!(h.db.lock().unwrap().list_chats().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_reconcile_is_deduplicated() {
        let h = harness(false);
        let chat = seed_synced_chat(&h, "c1");
        h.engine
            .send_message(&chat, &UserId::from("me"), "once")
            .await
            .unwrap();

        let _held = h.engine.reconcile_guard.lock().await;
        let report = h.engine.reconcile().await.unwrap();
        assert!(report.is_empty());
        assert_eq!(h.api.pushed_message_count(), 0);
    }

    #[tokio::test]
    async fn test_push_during_reconcile_posts_each_message_once() {
        let h = harness(false);
        let chat = seed_synced_chat(&h, "c1");
        let me = UserId::from("me");
        h.engine.send_message(&chat, &me, "slow").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let fast = h.engine.send_message(&chat, &me, "fast").await.unwrap();
        h.api.delay("slow", 200);
        h.api.delay("fast", 20);

        let engine = h.engine.clone();
        let pass = tokio::spawn(async move { engine.reconcile().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The pass is waiting on "slow" and still lists "fast" by its temp id.
        assert!(h.engine.push_message(&fast).await.unwrap());
        let report = pass.await.unwrap().unwrap();
        assert_eq!(report.messages_synced, 1);
        assert_eq!(report.messages_skipped, 1);

        assert_eq!(h.api.pushed_message_count(), 2);
        let db = h.db.lock().unwrap();
        let msgs = db.list_messages_for_chat(&chat).unwrap();
        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().all(|m| m.is_synced && !m.id.is_temporary()));
        let mut texts: Vec<&str> = msgs.iter().map(|m| m.text.as_str()).collect();
        texts.sort();
        assert_eq!(texts, ["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_reconcile_leaves_chat_on_the_wire_alone() {
        let h = harness(true);
        h.api.delay("Ada,Linus", 200);

        let engine = h.engine.clone();
        let invite = tokio::spawn(async move {
            engine
                .create_chat_from_invite(&UserId::from("me"), "Ada", SECOND_INVITE)
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let report = h.engine.reconcile().await.unwrap();
        assert!(report.is_empty());

        let chat = invite.await.unwrap().unwrap();
        assert!(chat.is_synced);
        assert!(h.api.pushed_chats.lock().unwrap().is_empty());
        assert_eq!(h.api.chat_invites.lock().unwrap().len(), 1);
        assert_eq!(h.db.lock().unwrap().list_chats().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_skips_chat_confirmed_after_listing() {
        let h = harness(false);
        let me = UserId::from("me");
        h.engine
            .create_chat_from_invite(&me, "Ada", INVITE)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        h.engine.connectivity().set_online(true);
        h.api.delay("Ada,Grace", 200);
        h.api.delay("Ada,Linus", 100);

        let engine = h.engine.clone();
        let invite = tokio::spawn(async move {
            engine
                .create_chat_from_invite(&UserId::from("me"), "Ada", SECOND_INVITE)
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Lists both chats, then the invite confirms its own while the queued
        // one is still being pushed.
        let report = h.engine.reconcile().await.unwrap();
        assert_eq!(report.chats_synced, 1);
        assert_eq!(report.chats_failed, 0);
        invite.await.unwrap().unwrap();

        let pushed = h.api.pushed_chats.lock().unwrap().clone();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].user_name, "Ada,Grace");
        assert_eq!(h.api.chat_invites.lock().unwrap().len(), 1);

        let chats = h.db.lock().unwrap().list_chats().unwrap();
        assert_eq!(chats.len(), 2);
        assert!(chats.iter().all(|c| c.is_synced && !c.id.is_temporary()));
    }

    #[tokio::test]
    async fn test_load_chats_merges_and_falls_back() {
        let h = harness(true);
        let me = UserId::from("me");
        h.api
            .server_chats
            .lock()
            .unwrap()
            .push(server_chat("srv-a", "me"));

        // Local unsynced chat survives the merge.
        h.api.set_offline(true);
        h.engine
            .create_chat_from_invite(&me, "Ada", INVITE)
            .await
            .unwrap();
        h.api.set_offline(false);

        let chats = h.engine.load_chats(&me).await.unwrap();
        assert_eq!(chats.len(), 2);
        assert!(chats.iter().any(|c| c.id.as_str() == "srv-a" && c.is_synced));
        assert!(chats.iter().any(|c| c.id.is_temporary() && !c.is_synced));

        // Server unreachable: the cache, including the pulled chat.
        h.api.set_offline(true);
        let cached = h.engine.load_chats(&me).await.unwrap();
        assert_eq!(cached, chats);
    }

    #[tokio::test]
    async fn test_open_chat_caches_server_data_for_offline_reads() {
        let h = harness(true);
        h.api
            .server_chats
            .lock()
            .unwrap()
            .push(server_chat("c9", "me"));
        h.api.server_messages.lock().unwrap().push(RemoteMessage {
            id: MessageId::from("m1"),
            chat_id: ChatId::from("c9"),
            text: "from server".into(),
            sender_id: UserId::from("peer"),
            status: DeliveryStatus::Delivered,
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });

        let online = h.engine.open_chat(&ChatId::from("c9")).await.unwrap();
        assert!(online.chat.is_some());
        assert_eq!(online.messages.len(), 1);

        h.api.set_offline(true);
        let offline = h.engine.open_chat(&ChatId::from("c9")).await.unwrap();
        assert_eq!(offline, online);

        h.engine.connectivity().set_online(false);
        let no_network = h.engine.open_chat(&ChatId::from("c9")).await.unwrap();
        assert_eq!(no_network.messages[0].text, "from server");
    }

    #[tokio::test]
    async fn test_open_unknown_chat_is_empty_view() {
        let h = harness(false);
        let view = h.engine.open_chat(&ChatId::from("nope")).await.unwrap();
        assert!(view.chat.is_none());
        assert!(view.messages.is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_triggers_reconcile() {
        let h = harness(false);
        let chat = seed_synced_chat(&h, "c1");
        h.engine
            .send_message(&chat, &UserId::from("me"), "later")
            .await
            .unwrap();

        let mut events = h.engine.events().subscribe();
        let engine = h.engine.clone();
        let task = tokio::spawn(async move { engine.run_on_reconnect().await });

        tokio::task::yield_now().await;
        h.engine.connectivity().set_online(true);

        let report = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(SyncEvent::Reconciled(report)) = events.recv().await {
                    return report;
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(report.messages_synced, 1);
        assert!(h.db.lock().unwrap().list_unsynced_messages().unwrap().is_empty());
        task.abort();
    }
}
