use tracing::{debug, warn};

use csb_core::{
    domain::{MessageId, MessageRef},
    messaging::types::{ChatKind, EditResult},
    refresh::local_today,
    render::{date_keyboard, parse_date_callback, pick_another_day, please_wait, RenderMode},
};

use crate::router::AppState;

use super::{delete_later, Origin};

/// Today/tomorrow buttons.
///
/// Private chats get the schedule in place of the pressed keyboard plus a
/// fresh keyboard. Groups get a short-lived copy so the chat does not fill
/// up with schedules.
pub(crate) async fn handle_date_button(
    state: &AppState,
    callback_id: &str,
    origin: Origin,
    pressed: MessageId,
    data: &str,
) {
    // Always answer so the client stops its spinner.
    if let Err(e) = state.messenger.answer_callback_query(callback_id, None).await {
        debug!("answer_callback_query failed: {e}");
    }

    let Some(date) = parse_date_callback(data) else {
        debug!(data, "ignoring unknown callback data");
        return;
    };

    match origin.kind {
        ChatKind::Private => {
            let keyboard_msg = MessageRef {
                chat_id: origin.chat_id,
                message_id: pressed,
            };
            let _ = state
                .messenger
                .edit_html(keyboard_msg, &please_wait(date))
                .await;

            let text = state.service.schedule_text(date, RenderMode::Plain).await;
            match state.messenger.edit_html(keyboard_msg, &text).await {
                EditResult::Updated | EditResult::Unchanged => {}
                EditResult::Forbidden => return,
                _ => {
                    // The keyboard message is gone; answer with a new one.
                    super::reply(state, origin.chat_id, &text).await;
                }
            }

            if let Err(e) = state
                .messenger
                .send_html(
                    origin.chat_id,
                    pick_another_day(),
                    Some(date_keyboard(local_today())),
                )
                .await
            {
                debug!(chat_id = %origin.chat_id, "date keyboard not sent: {e}");
            }
        }
        ChatKind::Group => {
            let ttl = state.cfg.group_message_ttl;
            let text = state
                .service
                .schedule_text(date, RenderMode::Ephemeral { visible_for: ttl })
                .await;
            match state.messenger.send_html(origin.chat_id, &text, None).await {
                Ok(sent) => {
                    delete_later(state.messenger.clone(), sent, ttl);
                }
                Err(e) => warn!(chat_id = %origin.chat_id, "group schedule not sent: {e}"),
            }
        }
        ChatKind::Channel => {}
    }
}
