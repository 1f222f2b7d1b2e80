use chrono::Utc;
use tracing::{info, warn};

use csb_core::{
    access::Capability,
    domain::{MessageId, MessageRef},
    errors::Error,
    formatting::escape_html,
    messaging::types::{ChatKind, DeliveryError},
    reconcile::Outcome,
    refresh::{local_today, ManualRefresh},
    render,
};

use crate::router::AppState;

use super::{delete_later, reply, Origin};

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub(crate) async fn handle_command(
    state: &AppState,
    origin: Origin,
    command_msg: MessageId,
    text: &str,
) {
    let (cmd, rest) = parse_command(text);
    let command_ref = MessageRef {
        chat_id: origin.chat_id,
        message_id: command_msg,
    };

    match cmd.as_str() {
        "start" => handle_start(state, origin).await,
        "setupgroup" => handle_setup_group(state, origin, command_ref).await,
        "track" => handle_track(state, origin, command_ref).await,
        "refresh" => handle_refresh(state, origin, command_ref).await,
        "untrack" => handle_untrack(state, origin, command_ref).await,
        "broadcast" => handle_broadcast(state, origin, &rest).await,
        "stats" => handle_stats(state, origin).await,
        _ => {}
    }
}

/// Group admins (or bot owners) only. Replies with the reason on refusal.
async fn can_manage(state: &AppState, origin: Origin) -> bool {
    if origin.kind != ChatKind::Group {
        reply(state, origin.chat_id, render::groups_only()).await;
        return false;
    }
    let Some(user_id) = origin.user_id else {
        return false;
    };

    let role = match state
        .messenger
        .chat_member_role(origin.chat_id, user_id)
        .await
    {
        Ok(role) => Some(role),
        Err(e) => {
            warn!(chat_id = %origin.chat_id, "role lookup failed: {e}");
            None
        }
    };

    if state.policy.allows(user_id, role, Capability::ManageChat) {
        return true;
    }
    reply(state, origin.chat_id, render::admins_only()).await;
    false
}

/// Owner commands are private-chat only and silently ignored for others.
fn is_owner_here(state: &AppState, origin: Origin, cap: Capability) -> bool {
    origin.kind == ChatKind::Private
        && origin
            .user_id
            .is_some_and(|u| state.policy.allows(u, None, cap))
}

/// Admin replies in a group vanish after a while, together with the command.
async fn reply_briefly(state: &AppState, command: MessageRef, html: &str) {
    let ttl = state.cfg.group_message_ttl;
    if let Some(sent) = reply(state, command.chat_id, html).await {
        delete_later(state.messenger.clone(), sent, ttl);
    }
    delete_later(state.messenger.clone(), command, ttl);
}

async fn handle_start(state: &AppState, origin: Origin) {
    if origin.kind != ChatKind::Private {
        return;
    }
    let keyboard = render::date_keyboard(local_today());
    if let Err(e) = state
        .messenger
        .send_html(origin.chat_id, render::private_welcome(), Some(keyboard))
        .await
    {
        warn!(chat_id = %origin.chat_id, "welcome not sent: {e}");
    }
}

async fn handle_setup_group(state: &AppState, origin: Origin, command: MessageRef) {
    if !can_manage(state, origin).await {
        return;
    }

    let today = local_today();
    let text = render::group_welcome(today, &state.links);
    if let Err(e) = state
        .messenger
        .send_html(origin.chat_id, &text, Some(render::date_keyboard(today)))
        .await
    {
        warn!(chat_id = %origin.chat_id, "group welcome not sent: {e}");
        return;
    }

    let _ = state.messenger.delete_message(command).await;
}

async fn handle_track(state: &AppState, origin: Origin, command: MessageRef) {
    if !can_manage(state, origin).await {
        return;
    }

    match state.service.initialize(origin.chat_id, local_today()).await {
        Ok(sent) => {
            info!(chat_id = %origin.chat_id, message_id = %sent.message_id, "tracking started");
            reply_briefly(state, command, render::tracking_started()).await;
        }
        Err(Error::Delivery(DeliveryError::Forbidden)) => {
            warn!(chat_id = %origin.chat_id, "cannot post in chat, tracking not started");
        }
        Err(Error::Delivery(e)) => {
            warn!(chat_id = %origin.chat_id, "tracking not started: {e}");
            reply_briefly(state, command, render::refresh_failed()).await;
        }
        Err(e) => {
            warn!(chat_id = %origin.chat_id, "tracking not started: {e}");
            reply_briefly(state, command, render::storage_trouble()).await;
        }
    }
}

async fn handle_refresh(state: &AppState, origin: Origin, command: MessageRef) {
    if !can_manage(state, origin).await {
        return;
    }

    let result = state
        .service
        .manual_refresh(origin.chat_id, Utc::now(), local_today())
        .await;

    let notice = match result {
        Ok(ManualRefresh::CoolingDown { retry_after }) => render::cooling_down(retry_after),
        Ok(ManualRefresh::Done(outcome)) => match outcome {
            Outcome::Updated => render::refresh_done().to_string(),
            Outcome::Unchanged => render::refresh_unchanged().to_string(),
            Outcome::Recreated { .. } => render::recreated_notice().to_string(),
            Outcome::Untracked => render::not_tracked().to_string(),
            Outcome::Failed { reason } => {
                warn!(chat_id = %origin.chat_id, "manual refresh failed: {reason}");
                render::refresh_failed().to_string()
            }
        },
        Err(e) => {
            warn!(chat_id = %origin.chat_id, "manual refresh failed: {e}");
            render::storage_trouble().to_string()
        }
    };
    reply_briefly(state, command, &notice).await;
}

async fn handle_untrack(state: &AppState, origin: Origin, command: MessageRef) {
    if !can_manage(state, origin).await {
        return;
    }

    let notice = match state.service.teardown(origin.chat_id).await {
        Ok(previous) => render::tracking_stopped(previous.is_some()),
        Err(e) => {
            warn!(chat_id = %origin.chat_id, "untrack failed: {e}");
            render::storage_trouble()
        }
    };
    reply_briefly(state, command, notice).await;
}

async fn handle_broadcast(state: &AppState, origin: Origin, text: &str) {
    if !is_owner_here(state, origin, Capability::Broadcast) {
        return;
    }
    if text.is_empty() {
        reply(state, origin.chat_id, render::broadcast_usage()).await;
        return;
    }

    let notice = match state.service.broadcast(&escape_html(text)).await {
        Ok(report) => render::broadcast_report(report.succeeded, report.failed),
        Err(e) => {
            warn!("broadcast failed: {e}");
            render::storage_trouble().to_string()
        }
    };
    reply(state, origin.chat_id, &notice).await;
}

async fn handle_stats(state: &AppState, origin: Origin) {
    if !is_owner_here(state, origin, Capability::ViewStats) {
        return;
    }

    let notice = match state.service.stats().await {
        Ok(s) => render::stats_report(s.manual_refreshes, s.auto_refreshes, s.tracked_chats),
        Err(e) => {
            warn!("stats failed: {e}");
            render::storage_trouble().to_string()
        }
    };
    reply(state, origin.chat_id, &notice).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{harness, ADMIN, GROUP, OWNER, PRIVATE};
    use csb_core::{domain::UserId, messaging::types::ChatRole};

    fn from(origin: Origin, user: UserId) -> Origin {
        Origin {
            user_id: Some(user),
            ..origin
        }
    }

    #[test]
    fn parses_command_with_bot_suffix_and_args() {
        assert_eq!(
            parse_command("/Broadcast@court_bot  hello all "),
            ("broadcast".to_string(), "hello all".to_string())
        );
        assert_eq!(parse_command("/stats"), ("stats".to_string(), String::new()));
    }

    #[tokio::test]
    async fn start_only_answers_in_private() {
        let h = harness();
        handle_command(&h.state, GROUP, MessageId(1), "/start").await;
        assert!(h.tg.sends().is_empty());

        handle_command(&h.state, PRIVATE, MessageId(1), "/start").await;
        let sends = h.tg.sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].1, render::private_welcome());
        assert!(sends[0].2);
    }

    #[tokio::test]
    async fn setupgroup_requires_admin() {
        let h = harness();
        handle_command(&h.state, GROUP, MessageId(7), "/setupgroup").await;
        assert_eq!(h.tg.sends().len(), 1);
        assert_eq!(h.tg.sends()[0].1, render::admins_only());

        h.tg.set_role(GROUP.chat_id, ADMIN, ChatRole::Administrator);
        handle_command(&h.state, from(GROUP, ADMIN), MessageId(8), "/setupgroup").await;
        let sends = h.tg.sends();
        assert!(sends[1].1.contains("آکادمی تنیس آرسس"));
        assert!(sends[1].2);
        assert_eq!(
            h.tg.deletes(),
            vec![MessageRef {
                chat_id: GROUP.chat_id,
                message_id: MessageId(8)
            }]
        );
    }

    #[tokio::test]
    async fn group_commands_refused_in_private() {
        let h = harness();
        handle_command(&h.state, PRIVATE, MessageId(1), "/track").await;
        assert_eq!(h.tg.sends()[0].1, render::groups_only());
        assert!(h.tracked(GROUP.chat_id).await.is_none());
    }

    #[tokio::test]
    async fn track_refresh_untrack_cycle() {
        let h = harness();
        h.tg.set_role(GROUP.chat_id, ADMIN, ChatRole::Owner);
        let admin = from(GROUP, ADMIN);

        handle_command(&h.state, admin, MessageId(10), "/track").await;
        let tracked = h.tracked(GROUP.chat_id).await.expect("tracked");
        assert!(h.tg.sends().iter().any(|s| s.1 == render::tracking_started()));

        // The schedule has not changed since /track.
        handle_command(&h.state, admin, MessageId(11), "/refresh").await;
        assert!(h.tg.sends().iter().any(|s| s.1 == render::refresh_unchanged()));

        handle_command(&h.state, admin, MessageId(12), "/refresh").await;
        assert!(h.tg.sends().iter().any(|s| s.1.starts_with("⏳")));

        handle_command(&h.state, admin, MessageId(13), "/untrack").await;
        assert!(h.tracked(GROUP.chat_id).await.is_none());
        assert!(h.tg.deletes().contains(&MessageRef {
            chat_id: GROUP.chat_id,
            message_id: tracked
        }));
    }

    #[tokio::test]
    async fn refresh_in_untracked_group_advises_track() {
        let h = harness();
        h.tg.set_role(GROUP.chat_id, ADMIN, ChatRole::Administrator);
        handle_command(&h.state, from(GROUP, ADMIN), MessageId(1), "/refresh").await;
        assert_eq!(h.tg.sends()[0].1, render::not_tracked());
    }

    #[tokio::test]
    async fn owner_commands_are_private_and_owner_only() {
        let h = harness();
        handle_command(&h.state, from(PRIVATE, ADMIN), MessageId(1), "/stats").await;
        handle_command(&h.state, from(GROUP, OWNER), MessageId(1), "/stats").await;
        assert!(h.tg.sends().is_empty());

        handle_command(&h.state, from(PRIVATE, OWNER), MessageId(1), "/stats").await;
        assert!(h.tg.sends()[0].1.contains("آمار ربات"));
    }

    #[tokio::test]
    async fn broadcast_reaches_tracked_chats_and_reports() {
        let h = harness();
        h.tg.set_role(GROUP.chat_id, ADMIN, ChatRole::Administrator);
        handle_command(&h.state, from(GROUP, ADMIN), MessageId(1), "/track").await;

        let owner = from(PRIVATE, OWNER);
        handle_command(&h.state, owner, MessageId(2), "/broadcast").await;
        assert_eq!(h.tg.last_text(), Some(render::broadcast_usage().to_string()));

        handle_command(&h.state, owner, MessageId(3), "/broadcast <courts> closed").await;
        assert!(h
            .tg
            .sends()
            .iter()
            .any(|s| s.0 == GROUP.chat_id && s.1 == "&lt;courts&gt; closed"));
        assert_eq!(h.tg.last_text(), Some(render::broadcast_report(1, 0)));
    }
}
