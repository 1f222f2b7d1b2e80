use std::sync::Arc;

use csb_core::{config::Config, store::JsonFileStore};
use csb_reservations::HttpReservationSource;

#[tokio::main]
async fn main() -> Result<(), csb_core::Error> {
    csb_core::logging::init("csb")?;

    let cfg = Arc::new(Config::load()?);

    let store = Arc::new(JsonFileStore::open(cfg.state_file.clone(), cfg.store_timeout).await?);

    let source = Arc::new(HttpReservationSource::new(
        cfg.reservation_api_url.clone(),
        cfg.reservation_timeout,
    )?);

    csb_telegram::router::run_polling(cfg, store, source)
        .await
        .map_err(|e| csb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
