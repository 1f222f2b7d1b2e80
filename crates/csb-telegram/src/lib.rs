//! Telegram adapter (teloxide).
//!
//! This crate implements the `csb-core` MessagingPort over the Telegram Bot
//! API and hosts the update handlers.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ChatMemberKind, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
    ApiError, RequestError,
};

pub mod handlers;
pub mod router;

use csb_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::{
        port::MessagingPort,
        types::{ChatRole, DeliveryError, EditResult, InlineKeyboard, MessagingCapabilities},
    },
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn tg_markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|b| InlineKeyboardButton::callback(b.label, b.callback_data))
                    .collect()
            })
            .collect();
        InlineKeyboardMarkup::new(rows)
    }
}

/// Sort a Bot API failure into the closed set the core works with.
///
/// Flood control (`RetryAfter`) is transient: nothing is retried here, the
/// next sweep or the caller decides.
pub fn classify(e: &RequestError) -> DeliveryError {
    match e {
        RequestError::Api(api) => match api {
            ApiError::MessageToEditNotFound
            | ApiError::MessageIdInvalid
            | ApiError::MessageToDeleteNotFound
            | ApiError::MessageCantBeEdited
            | ApiError::MessageCantBeDeleted => DeliveryError::NotFound,
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::ChatNotFound
            | ApiError::NotEnoughRightsToPostMessages
            | ApiError::GroupDeactivated
            | ApiError::UserDeactivated
            | ApiError::CantInitiateConversation => DeliveryError::Forbidden,
            other => DeliveryError::Transient(other.to_string()),
        },
        other => DeliveryError::Transient(other.to_string()),
    }
}

fn classify_edit(e: &RequestError) -> EditResult {
    match e {
        RequestError::Api(ApiError::MessageNotModified) => EditResult::Unchanged,
        other => classify(other).into(),
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
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
        let mut req = self
            .bot
            .send_message(Self::tg_chat(chat_id), html.to_string())
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true);
        if let Some(kb) = keyboard {
            req = req.reply_markup(Self::tg_markup(kb));
        }

        let msg = req.await.map_err(|e| classify(&e))?;
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> EditResult {
        let res = self
            .bot
            .edit_message_text(
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
                html.to_string(),
            )
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true)
            .await;

        match res {
            Ok(_) => EditResult::Updated,
            Err(e) => classify_edit(&e),
        }
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<(), DeliveryError> {
        self.bot
            .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
            .await
            .map_err(|e| classify(&e))?;
        Ok(())
    }

    async fn chat_member_role(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> Result<ChatRole, DeliveryError> {
        let member = self
            .bot
            .get_chat_member(Self::tg_chat(chat_id), teloxide::types::UserId(user_id.0 as u64))
            .await
            .map_err(|e| classify(&e))?;

        Ok(match member.kind {
            ChatMemberKind::Owner(_) => ChatRole::Owner,
            ChatMemberKind::Administrator(_) => ChatRole::Administrator,
            ChatMemberKind::Member => ChatRole::Member,
            ChatMemberKind::Restricted(_) => ChatRole::Restricted,
            ChatMemberKind::Left => ChatRole::Left,
            ChatMemberKind::Banned(_) => ChatRole::Banned,
        })
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), DeliveryError> {
        let mut req = self.bot.answer_callback_query(callback_id.to_string());
        if let Some(t) = text {
            req = req.text(t.to_string());
        }
        req.await.map_err(|e| classify(&e))?;
        Ok(())
    }
}
