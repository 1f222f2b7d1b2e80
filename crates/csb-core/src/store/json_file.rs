use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};

use super::{StateStore, StoreState};
use crate::{
    domain::{ChatId, CounterName, MessageId},
    errors::Error,
    Result,
};

/// JSON-file backed store.
///
/// The whole record set lives in memory behind one lock; each mutation is
/// applied to a copy, written to a numbered temp file next to the real one,
/// renamed over it and only then committed in memory. Only the write is
/// bounded by the timeout; once the rename starts it runs to completion, so a
/// timeout always leaves the file and the in-memory view on the same state.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    timeout: Duration,
    state: Mutex<StoreState>,
    writes: AtomicU64,
}

impl JsonFileStore {
    pub async fn open(path: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let path = path.into();

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(txt) if txt.trim().is_empty() => StoreState::default(),
            Ok(txt) => serde_json::from_str(&txt)?,
            Err(e) if e.kind() == ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(Error::Io(e)),
        };

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        tracing::info!(
            path = %path.display(),
            tracked = state.tracked.len(),
            "state store opened"
        );

        Ok(Self {
            path,
            timeout,
            state: Mutex::new(state),
            writes: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        tokio::time::timeout(self.timeout, self.state.lock())
            .await
            .map_err(|_| {
                Error::StoreUnavailable(format!(
                    "timed out after {:?} waiting for the state lock",
                    self.timeout
                ))
            })
    }

    async fn read<T>(&self, f: impl FnOnce(&StoreState) -> T + Send) -> Result<T> {
        let guard = self.lock().await?;
        Ok(f(&guard))
    }

    async fn mutate<T: Send>(&self, f: impl FnOnce(&mut StoreState) -> T + Send) -> Result<T> {
        let mut guard = self.lock().await?;
        let mut next = guard.clone();
        let out = f(&mut next);

        if next != *guard {
            self.persist(&next).await?;
            *guard = next;
        }

        Ok(out)
    }

    async fn persist(&self, state: &StoreState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        // A timed-out write keeps running in the background; a fresh name
        // per write stops it from clobbering a later one.
        let n = self.writes.fetch_add(1, Ordering::Relaxed);
        let tmp = self.path.with_extension(format!("json.{n}.tmp"));

        tokio::time::timeout(self.timeout, tokio::fs::write(&tmp, json))
            .await
            .map_err(|_| {
                Error::StoreUnavailable(format!(
                    "timed out after {:?} writing {}",
                    self.timeout,
                    tmp.display()
                ))
            })?
            .map_err(|e| unavailable(&tmp, e))?;

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| unavailable(&self.path, e))
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> Error {
    Error::StoreUnavailable(format!("{}: {e}", path.display()))
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn tracked_message(&self, chat_id: ChatId) -> Result<Option<MessageId>> {
        self.read(|st| st.tracked_message(chat_id)).await
    }

    async fn set_tracked_message(&self, chat_id: ChatId, message_id: MessageId) -> Result<()> {
        self.mutate(|st| st.set_tracked_message(chat_id, message_id))
            .await
    }

    async fn clear_tracked_message(&self, chat_id: ChatId) -> Result<()> {
        self.mutate(|st| {
            st.clear_tracked_message(chat_id);
        })
        .await
    }

    async fn tracked_chats(&self) -> Result<Vec<ChatId>> {
        self.read(|st| st.tracked_chats()).await
    }

    async fn cooldown(&self, chat_id: ChatId) -> Result<Option<DateTime<Utc>>> {
        self.read(|st| st.cooldown(chat_id)).await
    }

    async fn set_cooldown(&self, chat_id: ChatId, at: DateTime<Utc>) -> Result<()> {
        self.mutate(|st| st.set_cooldown(chat_id, at)).await
    }

    async fn increment_counter(&self, name: CounterName) -> Result<u64> {
        self.mutate(|st| st.increment_counter(name)).await
    }

    async fn counter(&self, name: CounterName) -> Result<u64> {
        self.read(|st| st.counter(name)).await
    }
}
