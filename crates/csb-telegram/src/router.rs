use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use csb_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use csb_core::{
    access::AccessPolicy,
    config::Config,
    messaging::port::MessagingPort,
    refresh::RefreshService,
    render::ClubLinks,
    reservations::ReservationSource,
    store::StateStore,
    sweep::{SweepConfig, SweepScheduler},
};

use crate::handlers;
use crate::TelegramMessenger;

/// Everything a handler needs, shared across updates.
pub struct AppState {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub service: Arc<RefreshService>,
    pub policy: AccessPolicy,
    pub links: ClubLinks,
}

impl AppState {
    pub fn new(
        cfg: Arc<Config>,
        messenger: Arc<dyn MessagingPort>,
        store: Arc<dyn StateStore>,
        source: Arc<dyn ReservationSource>,
    ) -> Self {
        let service = Arc::new(RefreshService::new(
            source,
            store,
            messenger.clone(),
            cfg.refresh_cooldown,
        ));
        Self {
            policy: AccessPolicy::new(cfg.bot_owner_ids.clone()),
            links: ClubLinks {
                website_url: cfg.club_website_url.clone(),
                contact_phone: cfg.club_contact_phone.clone(),
            },
            cfg,
            messenger,
            service,
        }
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    store: Arc<dyn StateStore>,
    source: Arc<dyn ReservationSource>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!("csb started: @{}", me.username()),
        Err(e) => warn!("get_me failed: {e}"),
    }
    info!(owners = cfg.bot_owner_ids.len(), "access policy loaded");

    // Sweeps edit every tracked chat back to back; space the calls out so
    // flood control does not turn a large sweep into a wall of failures.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState::new(cfg.clone(), messenger, store, source));

    let scheduler = Arc::new(SweepScheduler::new(
        state.service.clone(),
        SweepConfig {
            interval: cfg.sweep_interval,
            initial_delay: cfg.sweep_initial_delay,
            deadline: Some(cfg.sweep_deadline).filter(|d| !d.is_zero()),
        },
    ));
    let sweeps = scheduler.clone().spawn();

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    scheduler.stop();
    if let Err(e) = sweeps.await {
        warn!("sweep task ended abnormally: {e}");
    }
    info!("csb stopped");
    Ok(())
}
