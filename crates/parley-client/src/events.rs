use serde::Serialize;
use tokio::sync::broadcast;

use parley_shared::types::{ChatId, MessageId};

use crate::sync::SyncReport;

/// Capacity of the event channel; slow subscribers lag past this.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncEvent {
    MessageQueued {
        chat_id: ChatId,
        message_id: MessageId,
    },
    MessageConfirmed {
        temp_id: MessageId,
        server_id: MessageId,
    },
    ChatQueued {
        chat_id: ChatId,
    },
    ChatConfirmed {
        temp_id: ChatId,
        server_id: ChatId,
    },
    SyncFailed {
        record_id: String,
        error: String,
    },
    Reconciled(SyncReport),
    ConnectivityChanged {
        online: bool,
    },
}

/// Fan-out of [`SyncEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        // Err only means nobody is listening.
        if self.tx.send(event).is_err() {
            tracing::trace!("sync event dropped, no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
