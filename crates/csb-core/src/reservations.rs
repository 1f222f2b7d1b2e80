//! Reservation feed port and the snapshot it produces.

use async_trait::async_trait;
use chrono::NaiveDate;

/// One day's schedule as reported by the feed. Court and slot order is the
/// feed's order and is preserved all the way into the rendered text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub date: NaiveDate,
    pub courts: Vec<Court>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Court {
    pub name: String,
    pub slots: Vec<Slot>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slot {
    pub start_time: String,
    pub is_available: bool,
    pub occupant: Option<String>,
}

impl ScheduleSnapshot {
    pub fn is_empty(&self) -> bool {
        self.courts.is_empty()
    }

    pub fn available_slots(&self) -> usize {
        self.courts
            .iter()
            .flat_map(|c| c.slots.iter())
            .filter(|s| s.is_available)
            .count()
    }
}

/// The feed could not produce a snapshot (network, non-2xx, bad body).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("reservation feed unavailable: {0}")]
pub struct FetchError(pub String);

#[async_trait]
pub trait ReservationSource: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> Result<ScheduleSnapshot, FetchError>;
}
