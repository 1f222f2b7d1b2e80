//! Outbound pacing for the messaging port.
//!
//! A sweep edits every tracked chat back to back; unpaced, a large sweep
//! trips Telegram's 429 flood control and every chat after that point would
//! be classified as a transient failure.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef, UserId},
    messaging::{
        port::MessagingPort,
        types::{ChatRole, DeliveryError, EditResult, InlineKeyboard, MessagingCapabilities},
    },
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Spacing between any two API calls.
    pub global_gap: Duration,
    /// Spacing between calls into one chat (groups allow ~20 messages/min).
    pub per_chat_gap: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_gap: Duration::from_millis(40),
            per_chat_gap: Duration::from_millis(1050),
        }
    }
}

/// Earliest instant the next call may go out.
#[derive(Debug)]
struct Pace {
    gap: Duration,
    free_at: Instant,
}

impl Pace {
    fn new(gap: Duration) -> Self {
        Self {
            gap,
            free_at: Instant::now(),
        }
    }

    /// Book the next free slot; returns how long to wait for it.
    fn book(&mut self, now: Instant) -> Duration {
        let slot = self.free_at.max(now);
        self.free_at = slot + self.gap;
        slot - now
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.free_at <= now
    }
}

/// [`MessagingPort`] decorator that spaces calls globally and per chat.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<Pace>,
    chats: Mutex<HashMap<i64, Pace>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(Pace::new(cfg.global_gap)),
            chats: Mutex::new(HashMap::new()),
        }
    }

    async fn pace_chat(&self, chat_id: ChatId) {
        let now = Instant::now();
        let global_wait = self.global.lock().await.book(now);
        let chat_wait = {
            let mut chats = self.chats.lock().await;
            // A chat whose slot already passed paces exactly like a fresh
            // one, so only chats with a pending slot are kept.
            chats.retain(|_, pace| !pace.is_idle(now));
            chats
                .entry(chat_id.0)
                .or_insert_with(|| Pace::new(self.cfg.per_chat_gap))
                .book(now)
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn pace_global(&self) {
        let wait = self.global.lock().await.book(Instant::now());
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    #[cfg(test)]
    async fn paced_chats(&self) -> usize {
        self.chats.lock().await.len()
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef, DeliveryError> {
        self.pace_chat(chat_id).await;
        self.inner.send_html(chat_id, html, keyboard).await
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> EditResult {
        self.pace_chat(msg.chat_id).await;
        self.inner.edit_html(msg, html).await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<(), DeliveryError> {
        self.pace_chat(msg.chat_id).await;
        self.inner.delete_message(msg).await
    }

    async fn chat_member_role(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<ChatRole, DeliveryError> {
        // Lookups do not post into the chat.
        self.pace_global().await;
        self.inner.chat_member_role(chat_id, user_id).await
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.pace_global().await;
        self.inner.answer_callback_query(callback_id, text).await
    }
}
