use tracing::debug;

use csb_core::{
    messaging::types::ChatKind,
    refresh::local_today,
    render::{bad_date_hint, date_keyboard, date_received, parse_iso_date, pick_another_day, RenderMode},
};

use crate::router::AppState;

use super::{reply, Origin};

/// Free text: a `YYYY-MM-DD` date in a private chat. Group chatter is ignored.
pub(crate) async fn handle_text(state: &AppState, origin: Origin, text: &str) {
    if origin.kind != ChatKind::Private {
        return;
    }

    let Some(date) = parse_iso_date(text) else {
        reply(state, origin.chat_id, bad_date_hint()).await;
        return;
    };

    reply(state, origin.chat_id, &date_received(date)).await;
    let schedule = state.service.schedule_text(date, RenderMode::Plain).await;
    reply(state, origin.chat_id, &schedule).await;

    if let Err(e) = state
        .messenger
        .send_html(origin.chat_id, pick_another_day(), Some(date_keyboard(local_today())))
        .await
    {
        debug!(chat_id = %origin.chat_id, "date keyboard not sent: {e}");
    }
}
