use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{StateStore, StoreState};
use crate::{
    domain::{ChatId, CounterName, MessageId},
    Result,
};

/// Non-durable store. Used in tests and when no state file is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn tracked_message(&self, chat_id: ChatId) -> Result<Option<MessageId>> {
        Ok(self.state.lock().await.tracked_message(chat_id))
    }

    async fn set_tracked_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.state
            .lock()
            .await
            .set_tracked_message(chat_id, message_id);
        Ok(())
    }

    async fn clear_tracked_message(&self, chat_id: ChatId) -> Result<()> {
        self.state.lock().await.clear_tracked_message(chat_id);
        Ok(())
    }

    async fn tracked_chats(&self) -> Result<Vec<ChatId>> {
        Ok(self.state.lock().await.tracked_chats())
    }

    async fn cooldown(&self, chat_id: ChatId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state.lock().await.cooldown(chat_id))
    }

    async fn set_cooldown(&self, chat_id: ChatId, at: DateTime<Utc>) -> Result<()> {
        self.state.lock().await.set_cooldown(chat_id, at);
        Ok(())
    }

    async fn increment_counter(&self, name: CounterName) -> Result<u64> {
        Ok(self.state.lock().await.increment_counter(name))
    }

    async fn counter(&self, name: CounterName) -> Result<u64> {
        Ok(self.state.lock().await.counter(name))
    }
}
