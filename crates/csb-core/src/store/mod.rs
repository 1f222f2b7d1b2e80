//! Durable tracking state: tracked message per chat, manual-refresh cooldowns
//! and named counters.
//!
//! Every operation is atomic with respect to a single chat's record. Backends
//! report any storage trouble as [`Error::StoreUnavailable`] and never leave a
//! partially applied mutation behind.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChatId, CounterName, MessageId},
    Result,
};

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn tracked_message(&self, chat_id: ChatId) -> Result<Option<MessageId>>;

    /// Upsert; overwrites any previous value.
    async fn set_tracked_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()>;

    /// Idempotent.
    async fn clear_tracked_message(&self, chat_id: ChatId) -> Result<()>;

    /// Work list for sweeps and broadcasts, ordered by chat id.
    async fn tracked_chats(&self) -> Result<Vec<ChatId>>;

    /// Last manual refresh of the chat, if any.
    async fn cooldown(&self, chat_id: ChatId) -> Result<Option<DateTime<Utc>>>;

    /// Never moves a chat's timestamp backwards.
    async fn set_cooldown(&self, chat_id: ChatId, at: DateTime<Utc>) -> Result<()>;

    /// Returns the new value.
    async fn increment_counter(&self, name: CounterName) -> Result<u64>;

    async fn counter(&self, name: CounterName) -> Result<u64>;
}

/// Plain record set shared by the backends (also the on-disk JSON layout).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoreState {
    #[serde(default)]
    tracked: BTreeMap<i64, i32>,
    /// Unix milliseconds.
    #[serde(default)]
    cooldowns: BTreeMap<i64, i64>,
    #[serde(default)]
    counters: BTreeMap<String, u64>,
}

impl StoreState {
    fn tracked_message(&self, chat_id: ChatId) -> Option<MessageId> {
        self.tracked.get(&chat_id.0).copied().map(MessageId)
    }

    fn set_tracked_message(&mut self, chat_id: ChatId, message_id: MessageId) {
        self.tracked.insert(chat_id.0, message_id.0);
    }

    fn clear_tracked_message(&mut self, chat_id: ChatId) -> bool {
        self.tracked.remove(&chat_id.0).is_some()
    }

    fn tracked_chats(&self) -> Vec<ChatId> {
        self.tracked.keys().copied().map(ChatId).collect()
    }

    fn cooldown(&self, chat_id: ChatId) -> Option<DateTime<Utc>> {
        self.cooldowns
            .get(&chat_id.0)
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(*ms))
    }

    fn set_cooldown(&mut self, chat_id: ChatId, at: DateTime<Utc>) {
        let ms = at.timestamp_millis();
        let slot = self.cooldowns.entry(chat_id.0).or_insert(ms);
        if ms > *slot {
            *slot = ms;
        }
    }

    fn increment_counter(&mut self, name: CounterName) -> u64 {
        let slot = self.counters.entry(name.as_str().to_string()).or_insert(0);
        *slot = slot.saturating_add(1);
        *slot
    }

    fn counter(&self, name: CounterName) -> u64 {
        self.counters.get(name.as_str()).copied().unwrap_or(0)
    }
}
