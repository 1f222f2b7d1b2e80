//! HTTP adapter for the club's reservation feed.
//!
//! `GET {base}?date=YYYY-MM-DD` returns a JSON array of courts, each with its
//! time slots in display order.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use csb_core::{
    errors::Error,
    reservations::{Court, FetchError, ReservationSource, ScheduleSnapshot, Slot},
    Result,
};

const UNKNOWN_COURT: &str = "زمین نامشخص";
const UNKNOWN_TIME: &str = "N/A";

#[derive(Clone, Debug)]
pub struct HttpReservationSource {
    base_url: String,
    http: reqwest::Client,
}

impl HttpReservationSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("reservation client build failed: {e}")))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }
}

#[async_trait]
impl ReservationSource for HttpReservationSource {
    async fn fetch(&self, date: NaiveDate) -> std::result::Result<ScheduleSnapshot, FetchError> {
        let day = date.format("%Y-%m-%d").to_string();
        debug!(url = %self.base_url, date = %day, "requesting reservations");

        let resp = self
            .http
            .get(&self.base_url)
            .query(&[("date", day.as_str())])
            .send()
            .await
            .map_err(|e| FetchError(format!("request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError(format!(
                "{status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let courts: Vec<CourtDto> = resp
            .json()
            .await
            .map_err(|e| FetchError(format!("json error: {e}")))?;

        Ok(to_snapshot(date, courts))
    }
}

#[derive(Debug, Deserialize)]
struct CourtDto {
    #[serde(default)]
    court: Option<CourtInfoDto>,
    #[serde(default)]
    time_slots: Vec<SlotDto>,
}

#[derive(Debug, Deserialize)]
struct CourtInfoDto {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlotDto {
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    is_available: bool,
    #[serde(default)]
    user: Option<UserDto>,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    #[serde(default)]
    full_name: Option<String>,
}

fn to_snapshot(date: NaiveDate, courts: Vec<CourtDto>) -> ScheduleSnapshot {
    let courts = courts
        .into_iter()
        .map(|c| Court {
            name: c
                .court
                .and_then(|info| info.name)
                .unwrap_or_else(|| UNKNOWN_COURT.to_string()),
            slots: c
                .time_slots
                .into_iter()
                .map(|s| Slot {
                    start_time: s.start_time.unwrap_or_else(|| UNKNOWN_TIME.to_string()),
                    is_available: s.is_available,
                    occupant: s
                        .user
                        .and_then(|u| u.full_name)
                        .filter(|n| !n.trim().is_empty()),
                })
                .collect(),
        })
        .collect();
    ScheduleSnapshot { date, courts }
}
