//! Periodic sweep over all tracked chats.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{domain::ChatId, refresh::{local_today, RefreshService}};

#[derive(Clone, Copy, Debug)]
pub struct SweepConfig {
    pub interval: Duration,
    pub initial_delay: Duration,
    /// No chat is started once a sweep has run this long. `None` disables it.
    pub deadline: Option<Duration>,
}

/// Runs [`RefreshService::sweep`] on a fixed interval.
///
/// The sweep runs inside the ticking task, so a slow sweep delays the next
/// tick instead of overlapping it; missed ticks are skipped.
pub struct SweepScheduler {
    service: Arc<RefreshService>,
    cfg: SweepConfig,
    cancel: CancellationToken,
}

impl SweepScheduler {
    pub fn new(service: Arc<RefreshService>, cfg: SweepConfig) -> Self {
        Self {
            service,
            cfg,
            cancel: CancellationToken::new(),
        }
    }

    /// Stops the loop after the current sweep (if any) finishes.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    pub async fn run(&self) {
        info!(
            interval_secs = self.cfg.interval.as_secs(),
            initial_delay_secs = self.cfg.initial_delay.as_secs(),
            "sweep scheduler started"
        );

        tokio::select! {
            _ = self.cancel.cancelled() => return,
            _ = sleep(self.cfg.initial_delay) => {}
        }

        let mut ticker = interval(self.cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut deferred: Vec<ChatId> = Vec::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            deferred = self.tick(&deferred).await;
        }

        info!("sweep scheduler stopped");
    }

    /// One sweep; returns the chats to run first next time.
    async fn tick(&self, deferred: &[ChatId]) -> Vec<ChatId> {
        let started = Instant::now();
        let deadline = self.cfg.deadline.map(|d| started + d);

        match self.service.sweep(local_today(), deadline, deferred).await {
            Ok(report) => {
                info!(
                    updated = report.updated,
                    unchanged = report.unchanged,
                    recreated = report.recreated,
                    untracked = report.untracked,
                    failed = report.failed,
                    store_errors = report.store_errors,
                    counter_errors = report.counter_errors,
                    deferred = report.deferred.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "sweep finished"
                );
                report.deferred
            }
            Err(e) => {
                error!("sweep skipped: {e}");
                deferred.to_vec()
            }
        }
    }
}
