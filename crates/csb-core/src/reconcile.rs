//! Schedule message reconciliation.
//!
//! Keeps at most one live "current schedule" message per tracked chat and
//! converges it to freshly rendered text. Transport failures are classified
//! and handled here; only store failures reach the caller as errors.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{
    domain::{ChatId, CounterName, MessageId, MessageRef},
    errors::Error,
    locks::ChatLocks,
    messaging::{
        port::MessagingPort,
        types::{DeliveryError, EditResult},
    },
    store::StateStore,
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The tracked message now shows the new text.
    Updated,
    /// The tracked message already showed exactly this text.
    Unchanged,
    /// The tracked message was gone; a new one was posted and is now tracked.
    Recreated { message_id: MessageId },
    /// The chat is not tracked (or stopped being tracked during this call).
    Untracked,
    /// Transient failure; tracking state left as it was.
    Failed { reason: String },
}

impl Outcome {
    /// Whether the remote state changed, i.e. a refresh counter applies.
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Updated | Outcome::Recreated { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Updated => "updated",
            Outcome::Unchanged => "unchanged",
            Outcome::Recreated { .. } => "recreated",
            Outcome::Untracked => "untracked",
            Outcome::Failed { .. } => "failed",
        }
    }
}

/// Tally of one sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub updated: usize,
    pub unchanged: usize,
    pub recreated: usize,
    pub untracked: usize,
    pub failed: usize,
    /// Chats whose reconcile hit a store error.
    pub store_errors: usize,
    /// Applied refreshes whose counter write failed. These chats are also
    /// counted under their outcome, so [`SweepReport::attempted`] skips them.
    pub counter_errors: usize,
    /// Chats not started because the deadline passed, in original order.
    pub deferred: Vec<ChatId>,
}

impl SweepReport {
    pub fn attempted(&self) -> usize {
        self.updated + self.unchanged + self.recreated + self.untracked + self.failed + self.store_errors
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Updated => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Recreated { .. } => self.recreated += 1,
            Outcome::Untracked => self.untracked += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Chats dropped from tracking because the bot lost access.
    pub untracked: Vec<ChatId>,
}

pub struct Reconciler {
    store: Arc<dyn StateStore>,
    messenger: Arc<dyn MessagingPort>,
    locks: ChatLocks,
}

impl Reconciler {
    pub fn new(store: Arc<dyn StateStore>, messenger: Arc<dyn MessagingPort>) -> Self {
        Self {
            store,
            messenger,
            locks: ChatLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Converge the chat's tracked message to `html`.
    pub async fn reconcile(&self, chat_id: ChatId, html: &str) -> Result<Outcome> {
        let _guard = self.locks.lock_chat(chat_id).await;

        let Some(message_id) = self.store.tracked_message(chat_id).await? else {
            return Ok(Outcome::Untracked);
        };

        let msg = MessageRef {
            chat_id,
            message_id,
        };
        let outcome = match self.messenger.edit_html(msg, html).await {
            EditResult::Updated => Outcome::Updated,
            EditResult::Unchanged => Outcome::Unchanged,
            EditResult::NotFound => {
                info!(chat_id = %chat_id, message_id = %message_id, "tracked message is gone, recreating");
                self.recreate(chat_id, html).await?
            }
            EditResult::Forbidden => {
                self.drop_tracking(chat_id).await?;
                Outcome::Untracked
            }
            EditResult::Transient(reason) => Outcome::Failed { reason },
        };

        debug!(chat_id = %chat_id, outcome = outcome.label(), "reconciled");
        Ok(outcome)
    }

    /// Post a new schedule message and start tracking it. A previously
    /// tracked message is replaced and deleted on a best-effort basis.
    pub async fn initialize(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let _guard = self.locks.lock_chat(chat_id).await;

        let previous = self.store.tracked_message(chat_id).await?;

        let sent = match self.messenger.send_html(chat_id, html, None).await {
            Ok(sent) => sent,
            Err(DeliveryError::Forbidden) => {
                if previous.is_some() {
                    self.drop_tracking(chat_id).await?;
                }
                return Err(Error::Delivery(DeliveryError::Forbidden));
            }
            Err(e) => return Err(Error::Delivery(e)),
        };

        self.track_or_retract(sent).await?;
        info!(chat_id = %chat_id, message_id = %sent.message_id, "tracking initialized");

        if let Some(old) = previous.filter(|old| *old != sent.message_id) {
            self.delete_best_effort(MessageRef {
                chat_id,
                message_id: old,
            })
            .await;
        }

        Ok(sent)
    }

    /// Stop tracking the chat and delete its schedule message (best-effort).
    /// Returns the message that was tracked, if any.
    pub async fn teardown(&self, chat_id: ChatId) -> Result<Option<MessageId>> {
        let _guard = self.locks.lock_chat(chat_id).await;

        let previous = self.store.tracked_message(chat_id).await?;
        self.store.clear_tracked_message(chat_id).await?;

        if let Some(message_id) = previous {
            info!(chat_id = %chat_id, message_id = %message_id, "tracking torn down");
            self.delete_best_effort(MessageRef {
                chat_id,
                message_id,
            })
            .await;
        }
        Ok(previous)
    }

    /// Reconcile every chat in `chats` with the same text.
    ///
    /// Chats are independent: a failure for one (including a store error) is
    /// logged and counted, and the next chat is processed anyway. Once
    /// `deadline` has passed no further chat is started; the rest are
    /// returned in [`SweepReport::deferred`].
    pub async fn sweep(
        &self,
        chats: &[ChatId],
        html: &str,
        deadline: Option<Instant>,
    ) -> SweepReport {
        let mut report = SweepReport::default();

        for (idx, &chat_id) in chats.iter().enumerate() {
            // The first chat always runs so a short deadline cannot starve a sweep.
            if idx > 0 && deadline.is_some_and(|d| Instant::now() >= d) {
                report.deferred = chats[idx..].to_vec();
                warn!(
                    deferred = report.deferred.len(),
                    "sweep deadline passed, deferring remaining chats"
                );
                break;
            }

            let outcome = match self.reconcile(chat_id, html).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(chat_id = %chat_id, "sweep reconcile failed: {e}");
                    report.store_errors += 1;
                    continue;
                }
            };

            if let Outcome::Failed { reason } = &outcome {
                warn!(chat_id = %chat_id, "sweep refresh failed: {reason}");
            }

            if outcome.is_applied() {
                if let Err(e) = self.store.increment_counter(CounterName::AutoRefresh).await {
                    error!(chat_id = %chat_id, "failed to count auto refresh: {e}");
                    report.counter_errors += 1;
                }
            }
            report.record(&outcome);
        }

        report
    }

    /// Send `html` to every chat. Chats that refuse the bot are dropped from
    /// tracking and counted as failed; everything else is still attempted.
    pub async fn broadcast(&self, chats: &[ChatId], html: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for &chat_id in chats {
            match self.messenger.send_html(chat_id, html, None).await {
                Ok(_) => report.succeeded += 1,
                Err(DeliveryError::Forbidden) => {
                    report.failed += 1;
                    let _guard = self.locks.lock_chat(chat_id).await;
                    match self.drop_tracking(chat_id).await {
                        Ok(()) => report.untracked.push(chat_id),
                        Err(e) => error!(chat_id = %chat_id, "failed to drop tracking: {e}"),
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(chat_id = %chat_id, "broadcast send failed: {e}");
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "broadcast finished"
        );
        report
    }

    async fn recreate(&self, chat_id: ChatId, html: &str) -> Result<Outcome> {
        match self.messenger.send_html(chat_id, html, None).await {
            Ok(sent) => {
                self.track_or_retract(sent).await?;
                Ok(Outcome::Recreated {
                    message_id: sent.message_id,
                })
            }
            Err(DeliveryError::Forbidden) => {
                self.drop_tracking(chat_id).await?;
                Ok(Outcome::Untracked)
            }
            Err(e) => Ok(Outcome::Failed {
                reason: format!("recreate failed: {e}"),
            }),
        }
    }

    /// Track a just-sent message. If the store refuses, the message is
    /// deleted again so the chat never holds an untracked schedule.
    async fn track_or_retract(&self, sent: MessageRef) -> Result<()> {
        if let Err(e) = self
            .store
            .set_tracked_message(sent.chat_id, sent.message_id)
            .await
        {
            warn!(chat_id = %sent.chat_id, message_id = %sent.message_id, "could not track new message, retracting it");
            self.delete_best_effort(sent).await;
            return Err(e);
        }
        Ok(())
    }

    async fn drop_tracking(&self, chat_id: ChatId) -> Result<()> {
        warn!(chat_id = %chat_id, "bot lost access to chat, dropping it from tracking");
        self.store.clear_tracked_message(chat_id).await
    }

    async fn delete_best_effort(&self, msg: MessageRef) {
        if let Err(e) = self.messenger.delete_message(msg).await {
            debug!(chat_id = %msg.chat_id, message_id = %msg.message_id, "delete skipped: {e}");
        }
    }
}
