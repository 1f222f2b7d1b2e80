//! Per-chat cooldown for manual refreshes.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use crate::{domain::ChatId, locks::ChatLocks, store::StateStore, Result};

pub struct ThrottleGate {
    store: Arc<dyn StateStore>,
    locks: ChatLocks,
}

impl ThrottleGate {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            locks: ChatLocks::new(),
        }
    }

    /// Succeeds (and records `now`) iff at least `cooldown` has passed since
    /// the last successful acquisition for this chat.
    ///
    /// Check and set happen under the chat's lock, so two concurrent callers
    /// cannot both pass inside one window.
    pub async fn try_acquire(
        &self,
        chat_id: ChatId,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<bool> {
        let _guard = self.locks.lock_chat(chat_id).await;

        let last = self.store.cooldown(chat_id).await?;
        if remaining(last, now, cooldown).is_some() {
            return Ok(false);
        }

        self.store.set_cooldown(chat_id, now).await?;
        Ok(true)
    }

    /// Time left before the next acquisition can succeed.
    pub async fn retry_after(
        &self,
        chat_id: ChatId,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<Option<Duration>> {
        let last = self.store.cooldown(chat_id).await?;
        Ok(remaining(last, now, cooldown))
    }
}

fn remaining(last: Option<DateTime<Utc>>, now: DateTime<Utc>, cooldown: Duration) -> Option<Duration> {
    let last = last?;
    // A timestamp in the future (clock stepped back) counts as "just refreshed".
    let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
    if elapsed >= cooldown {
        None
    } else {
        Some(cooldown - elapsed)
    }
}
