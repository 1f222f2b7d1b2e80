//! Core domain and application logic for the court schedule bot.
//!
//! This crate is framework-agnostic. Telegram and the reservation feed live
//! behind ports (traits) implemented in adapter crates.

pub mod access;
pub mod calendar;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod locks;
pub mod logging;
pub mod messaging;
pub mod reconcile;
pub mod refresh;
pub mod render;
pub mod reservations;
pub mod store;
pub mod sweep;
pub mod throttle;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
