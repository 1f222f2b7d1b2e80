//! Fake Telegram + fixtures for handler tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::NaiveDate;

use csb_core::{
    config::Config,
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::{
        port::MessagingPort,
        types::{ChatKind, ChatRole, DeliveryError, EditResult, InlineKeyboard, MessagingCapabilities},
    },
    reservations::{Court, FetchError, ReservationSource, ScheduleSnapshot, Slot},
    store::{MemoryStore, StateStore},
};

use crate::router::AppState;

use super::Origin;

pub(crate) const OWNER: UserId = UserId(1);
pub(crate) const ADMIN: UserId = UserId(7);

pub(crate) const PRIVATE: Origin = Origin {
    chat_id: ChatId(42),
    kind: ChatKind::Private,
    user_id: Some(UserId(42)),
};

pub(crate) const GROUP: Origin = Origin {
    chat_id: ChatId(-100),
    kind: ChatKind::Group,
    user_id: Some(UserId(500)),
};

#[derive(Default)]
pub(crate) struct RecordingTelegram {
    next_id: Mutex<i32>,
    texts: Mutex<HashMap<(i64, i32), String>>,
    roles: Mutex<HashMap<(i64, i64), ChatRole>>,
    sends: Mutex<Vec<(ChatId, String, bool, MessageRef)>>,
    edits: Mutex<Vec<(MessageRef, String)>>,
    deletes: Mutex<Vec<MessageRef>>,
    answered: Mutex<usize>,
}

impl RecordingTelegram {
    pub(crate) fn seed(&self, chat_id: ChatId, text: &str) -> MessageRef {
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        self.texts
            .lock()
            .unwrap()
            .insert((chat_id.0, *id), text.to_string());
        MessageRef {
            chat_id,
            message_id: MessageId(*id),
        }
    }

    pub(crate) fn set_role(&self, chat_id: ChatId, user_id: UserId, role: ChatRole) {
        self.roles
            .lock()
            .unwrap()
            .insert((chat_id.0, user_id.0), role);
    }

    /// (chat, text, had keyboard)
    pub(crate) fn sends(&self) -> Vec<(ChatId, String, bool)> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|(c, t, k, _)| (*c, t.clone(), *k))
            .collect()
    }

    pub(crate) fn last_sent(&self) -> Option<MessageRef> {
        self.sends.lock().unwrap().last().map(|s| s.3)
    }

    pub(crate) fn last_text(&self) -> Option<String> {
        self.sends.lock().unwrap().last().map(|s| s.1.clone())
    }

    pub(crate) fn edits(&self) -> Vec<(MessageRef, String)> {
        self.edits.lock().unwrap().clone()
    }

    pub(crate) fn deletes(&self) -> Vec<MessageRef> {
        self.deletes.lock().unwrap().clone()
    }

    pub(crate) fn answered(&self) -> usize {
        *self.answered.lock().unwrap()
    }
}

#[async_trait]
impl MessagingPort for RecordingTelegram {
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
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef, DeliveryError> {
        let sent = self.seed(chat_id, html);
        self.sends
            .lock()
            .unwrap()
            .push((chat_id, html.to_string(), keyboard.is_some(), sent));
        Ok(sent)
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> EditResult {
        self.edits.lock().unwrap().push((msg, html.to_string()));
        let mut texts = self.texts.lock().unwrap();
        match texts.get_mut(&(msg.chat_id.0, msg.message_id.0)) {
            None => EditResult::NotFound,
            Some(current) if current == html => EditResult::Unchanged,
            Some(current) => {
                *current = html.to_string();
                EditResult::Updated
            }
        }
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<(), DeliveryError> {
        self.deletes.lock().unwrap().push(msg);
        match self
            .texts
            .lock()
            .unwrap()
            .remove(&(msg.chat_id.0, msg.message_id.0))
        {
            Some(_) => Ok(()),
            None => Err(DeliveryError::NotFound),
        }
    }

    async fn chat_member_role(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<ChatRole, DeliveryError> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .get(&(chat_id.0, user_id.0))
            .copied()
            .unwrap_or(ChatRole::Member))
    }

    async fn answer_callback_query(
        &self,
        _callback_id: &str,
        _text: Option<&str>,
    ) -> Result<(), DeliveryError> {
        *self.answered.lock().unwrap() += 1;
        Ok(())
    }
}

struct OneCourt;

#[async_trait]
impl ReservationSource for OneCourt {
    async fn fetch(&self, date: NaiveDate) -> Result<ScheduleSnapshot, FetchError> {
        Ok(ScheduleSnapshot {
            date,
            courts: vec![Court {
                name: "Court 1".to_string(),
                slots: vec![Slot {
                    start_time: "09:00".to_string(),
                    is_available: true,
                    occupant: None,
                }],
            }],
        })
    }
}

pub(crate) struct Harness {
    pub state: AppState,
    pub tg: Arc<RecordingTelegram>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub(crate) async fn tracked(&self, chat_id: ChatId) -> Option<MessageId> {
        self.store.tracked_message(chat_id).await.unwrap()
    }
}

pub(crate) fn harness() -> Harness {
    let cfg = Config::from_lookup(|key| match key {
        "TELEGRAM_BOT_TOKEN" => Some("test-token".to_string()),
        "BOT_OWNER_IDS" => Some(OWNER.0.to_string()),
        _ => None,
    })
    .unwrap();

    let tg = Arc::new(RecordingTelegram::default());
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(Arc::new(cfg), tg.clone(), store.clone(), Arc::new(OneCourt));
    Harness { state, tg, store }
}
