//! Test doubles shared by the core test modules.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    domain::{ChatId, CounterName, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatRole, DeliveryError, EditResult, InlineKeyboard, MessagingCapabilities},
    },
    reservations::{Court, FetchError, ReservationSource, ScheduleSnapshot, Slot},
    store::{MemoryStore, StateStore},
    Result,
};

/// In-memory stand-in for the Telegram side: it keeps message texts so edits
/// can report `Unchanged`/`NotFound` the way the real API does.
#[derive(Default)]
pub(crate) struct FakeTelegram {
    next_id: Mutex<i32>,
    messages: Mutex<HashMap<(i64, i32), String>>,
    forbidden: Mutex<HashSet<i64>>,
    flaky: Mutex<HashSet<i64>>,
    sends: Mutex<Vec<(ChatId, String)>>,
    deletes: Mutex<Vec<MessageRef>>,
    edit_calls: AtomicUsize,
    edit_delay: Mutex<Option<Duration>>,
}

impl FakeTelegram {
    fn alloc(&self) -> i32 {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        *guard
    }

    /// A message that already exists in the chat.
    pub(crate) fn seed(&self, chat_id: ChatId, text: &str) -> MessageRef {
        let id = self.alloc();
        self.messages
            .lock()
            .unwrap()
            .insert((chat_id.0, id), text.to_string());
        MessageRef {
            chat_id,
            message_id: MessageId(id),
        }
    }

    pub(crate) fn text_of(&self, msg: MessageRef) -> Option<String> {
        self.messages
            .lock()
            .unwrap()
            .get(&(msg.chat_id.0, msg.message_id.0))
            .cloned()
    }

    /// Someone deletes the message behind the bot's back.
    pub(crate) fn delete_out_of_band(&self, msg: MessageRef) {
        self.messages
            .lock()
            .unwrap()
            .remove(&(msg.chat_id.0, msg.message_id.0));
    }

    pub(crate) fn forbid(&self, chat_id: ChatId) {
        self.forbidden.lock().unwrap().insert(chat_id.0);
    }

    pub(crate) fn make_flaky(&self, chat_id: ChatId) {
        self.flaky.lock().unwrap().insert(chat_id.0);
    }

    pub(crate) fn heal(&self, chat_id: ChatId) {
        self.flaky.lock().unwrap().remove(&chat_id.0);
        self.forbidden.lock().unwrap().remove(&chat_id.0);
    }

    pub(crate) fn set_edit_delay(&self, delay: Duration) {
        *self.edit_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn sent(&self) -> Vec<(ChatId, String)> {
        self.sends.lock().unwrap().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<MessageRef> {
        self.deletes.lock().unwrap().clone()
    }

    pub(crate) fn edit_calls(&self) -> usize {
        self.edit_calls.load(Ordering::SeqCst)
    }

    fn check_chat(&self, chat_id: ChatId) -> std::result::Result<(), DeliveryError> {
        if self.forbidden.lock().unwrap().contains(&chat_id.0) {
            return Err(DeliveryError::Forbidden);
        }
        if self.flaky.lock().unwrap().contains(&chat_id.0) {
            return Err(DeliveryError::Transient("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for FakeTelegram {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_html: true,
            supports_edit: true,
            max_message_len: 4096,
        }
    }

    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        _keyboard: Option<InlineKeyboard>,
    ) -> std::result::Result<MessageRef, DeliveryError> {
        self.check_chat(chat_id)?;
        self.sends
            .lock()
            .unwrap()
            .push((chat_id, html.to_string()));
        Ok(self.seed(chat_id, html))
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> EditResult {
        self.edit_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.edit_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        if let Err(e) = self.check_chat(msg.chat_id) {
            return e.into();
        }
        let mut messages = self.messages.lock().unwrap();
        match messages.get_mut(&(msg.chat_id.0, msg.message_id.0)) {
            None => EditResult::NotFound,
            Some(current) if current == html => EditResult::Unchanged,
            Some(current) => {
                *current = html.to_string();
                EditResult::Updated
            }
        }
    }

    async fn delete_message(&self, msg: MessageRef) -> std::result::Result<(), DeliveryError> {
        self.check_chat(msg.chat_id)?;
        self.deletes.lock().unwrap().push(msg);
        let removed = self
            .messages
            .lock()
            .unwrap()
            .remove(&(msg.chat_id.0, msg.message_id.0));
        match removed {
            Some(_) => Ok(()),
            None => Err(DeliveryError::NotFound),
        }
    }

    async fn chat_member_role(
        &self,
        chat_id: ChatId,
        _user_id: UserId,
    ) -> std::result::Result<ChatRole, DeliveryError> {
        self.check_chat(chat_id)?;
        Ok(ChatRole::Member)
    }

    async fn answer_callback_query(
        &self,
        _callback_id: &str,
        _text: Option<&str>,
    ) -> std::result::Result<(), DeliveryError> {
        Ok(())
    }
}

/// Memory store that can be switched into "storage is down" mode, either
/// entirely or for writes, counters or single chats only.
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    down: AtomicBool,
    writes_down: AtomicBool,
    counters_down: AtomicBool,
    down_chats: Mutex<HashSet<i64>>,
}

impl FlakyStore {
    pub(crate) fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub(crate) fn set_writes_down(&self, down: bool) {
        self.writes_down.store(down, Ordering::SeqCst);
    }

    pub(crate) fn set_counters_down(&self, down: bool) {
        self.counters_down.store(down, Ordering::SeqCst);
    }

    pub(crate) fn fail_chat(&self, chat_id: ChatId) {
        self.down_chats.lock().unwrap().insert(chat_id.0);
    }

    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("disk on fire".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        self.check()?;
        if self.writes_down.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("read-only filesystem".to_string()));
        }
        Ok(())
    }

    fn check_chat(&self, chat_id: ChatId) -> Result<()> {
        self.check()?;
        if self.down_chats.lock().unwrap().contains(&chat_id.0) {
            return Err(Error::StoreUnavailable(format!("record for {chat_id} unreadable")));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn tracked_message(&self, chat_id: ChatId) -> Result<Option<MessageId>> {
        self.check_chat(chat_id)?;
        self.inner.tracked_message(chat_id).await
    }

    async fn set_tracked_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.check_write()?;
        self.inner.set_tracked_message(chat_id, message_id).await
    }

    async fn clear_tracked_message(&self, chat_id: ChatId) -> Result<()> {
        self.check_write()?;
        self.inner.clear_tracked_message(chat_id).await
    }

    async fn tracked_chats(&self) -> Result<Vec<ChatId>> {
        self.check()?;
        self.inner.tracked_chats().await
    }

    async fn cooldown(&self, chat_id: ChatId) -> Result<Option<DateTime<Utc>>> {
        self.check()?;
        self.inner.cooldown(chat_id).await
    }

    async fn set_cooldown(&self, chat_id: ChatId, at: DateTime<Utc>) -> Result<()> {
        self.check_write()?;
        self.inner.set_cooldown(chat_id, at).await
    }

    async fn increment_counter(&self, name: CounterName) -> Result<u64> {
        self.check_write()?;
        if self.counters_down.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("counter file locked".to_string()));
        }
        self.inner.increment_counter(name).await
    }

    async fn counter(&self, name: CounterName) -> Result<u64> {
        self.check()?;
        self.inner.counter(name).await
    }
}

/// Reservation feed returning a fixed answer.
pub(crate) struct FakeSource {
    answer: Mutex<std::result::Result<Vec<Court>, FetchError>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn with_courts(courts: Vec<Court>) -> Self {
        Self {
            answer: Mutex::new(Ok(courts)),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            answer: Mutex::new(Err(FetchError("503 Service Unavailable".to_string()))),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_courts(&self, courts: Vec<Court>) {
        *self.answer.lock().unwrap() = Ok(courts);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReservationSource for FakeSource {
    async fn fetch(&self, date: NaiveDate) -> std::result::Result<ScheduleSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .lock()
            .unwrap()
            .clone()
            .map(|courts| ScheduleSnapshot { date, courts })
    }
}

pub(crate) fn one_court(start_time: &str, is_available: bool) -> Vec<Court> {
    vec![Court {
        name: "Court 1".to_string(),
        slots: vec![Slot {
            start_time: start_time.to_string(),
            is_available,
            occupant: None,
        }],
    }]
}

/// `courts` fully booked courts with `slots` hourly slots each, Persian names.
pub(crate) fn booked_courts(courts: usize, slots: usize) -> Vec<Court> {
    (1..=courts)
        .map(|c| Court {
            name: format!("زمین شماره {c}"),
            slots: (0..slots)
                .map(|s| Slot {
                    start_time: format!("{:02}:00", 8 + s % 16),
                    is_available: false,
                    occupant: Some(format!("محمدرضا حسین‌زاده {s}")),
                })
                .collect(),
        })
        .collect()
}
