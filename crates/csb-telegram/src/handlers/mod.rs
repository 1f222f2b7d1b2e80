//! Telegram update handlers.
//!
//! The teloxide endpoints only pull ids and text out of the update; the
//! handlers themselves talk to Telegram through the `MessagingPort` in
//! [`AppState`] so they can run against a fake messenger.

use std::{sync::Arc, time::Duration};

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Chat, Message},
};
use tokio::task::JoinHandle;
use tracing::debug;

use csb_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::{port::MessagingPort, types::ChatKind},
};

use crate::router::AppState;

mod callback;
mod commands;
mod text;

#[cfg(test)]
mod test_support;

/// Where an update came from.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Origin {
    pub chat_id: ChatId,
    pub kind: ChatKind,
    pub user_id: Option<UserId>,
}

fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    }
}

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let data = q.data.clone().unwrap_or_default();

    let Some(message) = q.message.as_ref() else {
        let _ = state.messenger.answer_callback_query(&q.id, None).await;
        return Ok(());
    };

    let origin = Origin {
        chat_id: ChatId(message.chat.id.0),
        kind: chat_kind(&message.chat),
        user_id: Some(UserId(q.from.id.0 as i64)),
    };
    callback::handle_date_button(&state, &q.id, origin, MessageId(message.id.0), &data).await;
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let origin = Origin {
        chat_id: ChatId(msg.chat.id.0),
        kind: chat_kind(&msg.chat),
        user_id: msg.from().map(|u| UserId(u.id.0 as i64)),
    };

    if text.starts_with('/') {
        commands::handle_command(&state, origin, MessageId(msg.id.0), text).await;
    } else {
        text::handle_text(&state, origin, text).await;
    }
    Ok(())
}

/// Delete `msg` once `after` has elapsed.
pub(crate) fn delete_later(
    messenger: Arc<dyn MessagingPort>,
    msg: MessageRef,
    after: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if let Err(e) = messenger.delete_message(msg).await {
            debug!(chat_id = %msg.chat_id, message_id = %msg.message_id, "timed delete failed: {e}");
        }
    })
}

/// Send and log failures; replies are never worth failing an update over.
pub(crate) async fn reply(state: &AppState, chat_id: ChatId, html: &str) -> Option<MessageRef> {
    match state.messenger.send_html(chat_id, html, None).await {
        Ok(sent) => Some(sent),
        Err(e) => {
            debug!(chat_id = %chat_id, "reply failed: {e}");
            None
        }
    }
}
