use crate::messaging::types::DeliveryError;

/// Core error type.
///
/// Adapter crates map their specific errors into this type. Transport failures
/// that the reconciliation engine classifies never surface here; only the
/// store and process-level failures do.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
