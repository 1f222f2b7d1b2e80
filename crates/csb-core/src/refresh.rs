//! Application service behind the bot commands and the periodic sweep.
//!
//! Fetches today's snapshot, renders it for the trigger, and hands the text
//! to the [`Reconciler`]. Manual refreshes go through the [`ThrottleGate`];
//! sweeps do not.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Local, NaiveDate, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    domain::{ChatId, CounterName, MessageId, MessageRef},
    formatting::{clamp_message, visible_len},
    messaging::port::MessagingPort,
    reconcile::{BroadcastReport, Outcome, Reconciler, SweepReport},
    render::{schedule_body, with_footer, RenderMode},
    reservations::ReservationSource,
    store::StateStore,
    throttle::ThrottleGate,
    Result,
};

/// Answer to an admin's `/refresh`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManualRefresh {
    /// Rejected without touching anything.
    CoolingDown { retry_after: Duration },
    Done(Outcome),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub manual_refreshes: u64,
    pub auto_refreshes: u64,
    pub tracked_chats: usize,
}

pub struct RefreshService {
    source: Arc<dyn ReservationSource>,
    store: Arc<dyn StateStore>,
    reconciler: Reconciler,
    gate: ThrottleGate,
    cooldown: Duration,
    max_message_len: usize,
}

impl RefreshService {
    pub fn new(
        source: Arc<dyn ReservationSource>,
        store: Arc<dyn StateStore>,
        messenger: Arc<dyn MessagingPort>,
        cooldown: Duration,
    ) -> Self {
        let max_message_len = messenger.capabilities().max_message_len;
        Self {
            source,
            reconciler: Reconciler::new(store.clone(), messenger),
            gate: ThrottleGate::new(store.clone()),
            store,
            cooldown,
            max_message_len,
        }
    }

    /// Fetch and render one day. A feed failure renders the "unavailable"
    /// text instead of failing, so tracked messages still converge.
    pub async fn schedule_text(&self, date: NaiveDate, mode: RenderMode) -> String {
        let snapshot = match self.source.fetch(date).await {
            Ok(s) => {
                debug!(
                    date = %date,
                    courts = s.courts.len(),
                    available = s.available_slots(),
                    "schedule fetched"
                );
                Some(s)
            }
            Err(e) => {
                warn!(date = %date, "{e}");
                None
            }
        };
        // Long schedules lose trailing slots, never the footer.
        let body = schedule_body(snapshot.as_ref(), date);
        let footer_len = visible_len(&with_footer("", mode));
        let body = clamp_message(&body, self.max_message_len.saturating_sub(footer_len));
        with_footer(&body, mode)
    }

    /// Cooldown-gated refresh of the chat's tracked message.
    pub async fn manual_refresh(
        &self,
        chat_id: ChatId,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<ManualRefresh> {
        // Untracked chats get the advisory without spending their cooldown.
        if self.store.tracked_message(chat_id).await?.is_none() {
            return Ok(ManualRefresh::Done(Outcome::Untracked));
        }

        if !self.gate.try_acquire(chat_id, now, self.cooldown).await? {
            let retry_after = self
                .gate
                .retry_after(chat_id, now, self.cooldown)
                .await?
                .unwrap_or(Duration::ZERO);
            return Ok(ManualRefresh::CoolingDown { retry_after });
        }

        let text = self.schedule_text(today, RenderMode::Manual).await;
        let outcome = self.reconciler.reconcile(chat_id, &text).await?;
        if outcome.is_applied() {
            self.store
                .increment_counter(CounterName::ManualRefresh)
                .await?;
        }
        info!(chat_id = %chat_id, outcome = outcome.label(), "manual refresh");
        Ok(ManualRefresh::Done(outcome))
    }

    /// Post today's schedule in the chat and track it.
    pub async fn initialize(&self, chat_id: ChatId, today: NaiveDate) -> Result<MessageRef> {
        let text = self.schedule_text(today, RenderMode::Manual).await;
        self.reconciler.initialize(chat_id, &text).await
    }

    pub async fn teardown(&self, chat_id: ChatId) -> Result<Option<MessageId>> {
        self.reconciler.teardown(chat_id).await
    }

    /// One sweep over every tracked chat. Chats listed in `first` (left over
    /// from a sweep that hit its deadline) go ahead of the rest.
    pub async fn sweep(
        &self,
        today: NaiveDate,
        deadline: Option<Instant>,
        first: &[ChatId],
    ) -> Result<SweepReport> {
        let tracked = self.store.tracked_chats().await?;
        if tracked.is_empty() {
            return Ok(SweepReport::default());
        }

        let mut order: Vec<ChatId> = first
            .iter()
            .copied()
            .filter(|c| tracked.contains(c))
            .collect();
        order.extend(tracked.iter().copied().filter(|c| !first.contains(c)));

        let text = self.schedule_text(today, RenderMode::Auto).await;
        Ok(self.reconciler.sweep(&order, &text, deadline).await)
    }

    /// Send `html` to every tracked chat.
    pub async fn broadcast(&self, html: &str) -> Result<BroadcastReport> {
        let chats = self.store.tracked_chats().await?;
        Ok(self.reconciler.broadcast(&chats, html).await)
    }

    pub async fn stats(&self) -> Result<Stats> {
        Ok(Stats {
            manual_refreshes: self.store.counter(CounterName::ManualRefresh).await?,
            auto_refreshes: self.store.counter(CounterName::AutoRefresh).await?,
            tracked_chats: self.store.tracked_chats().await?.len(),
        })
    }
}

/// The club's calendar day.
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}
