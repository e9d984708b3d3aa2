mod file;
mod memory;
mod redis;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use log::{ info, warn };
use std::sync::Arc;
use thiserror::Error;
use crate::cli::ChatArgs;
use crate::models::chat::StoredMessage;

/// Key of the durable conversation record.
pub const RECORD_KEY: &str = "chatMessages";
/// Upper bound on persisted messages.
pub const MAX_PERSISTED: usize = 80;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("history store IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history store JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("history store redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("unsupported history store type: {0}")]
    Unsupported(String),
}

/// String key/value storage that survives the process, in the manner of browser local storage.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

pub fn create_history_store(args: &ChatArgs) -> Result<Arc<dyn DurableStore>, StoreError> {
    info!("Chat history will be stored in: {}", args.history_type);
    match args.history_type.to_lowercase().as_str() {
        "file" => Ok(Arc::new(FileStore::new(&args.history_path))),
        "redis" => Ok(Arc::new(RedisStore::new(&args.history_host)?)),
        "memory" => Ok(Arc::new(MemoryStore::default())),
        other => Err(StoreError::Unsupported(other.to_string())),
    }
}

/// Reads the record. A missing or unparseable record reads as empty; malformed entries are skipped.
pub async fn read_record(store: &dyn DurableStore) -> Result<Vec<StoredMessage>, StoreError> {
    let raw = match store.get(RECORD_KEY).await? {
        Some(raw) => raw,
        None => return Ok(Vec::new()),
    };
    let entries: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Discarding unreadable '{}' record: {}", RECORD_KEY, e);
            return Ok(Vec::new());
        }
    };

    let total = entries.len();
    let messages: Vec<StoredMessage> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping malformed '{}' entry: {}", RECORD_KEY, e);
                None
            }
        })
        .collect();
    if messages.len() != total {
        warn!("Kept {} of {} '{}' entries", messages.len(), total, RECORD_KEY);
    }
    Ok(messages)
}

pub async fn write_record(
    store: &dyn DurableStore,
    messages: &[StoredMessage]
) -> Result<(), StoreError> {
    let json = serde_json::to_string(messages)?;
    store.set(RECORD_KEY, &json).await
}

/// Read-modify-write of a single message, keeping only the newest `MAX_PERSISTED`.
/// Not atomic across processes sharing the store; the last writer wins.
pub async fn append_to_record(
    store: &dyn DurableStore,
    message: StoredMessage
) -> Result<(), StoreError> {
    let mut messages = read_record(store).await?;
    messages.push(message);
    if messages.len() > MAX_PERSISTED {
        let excess = messages.len() - MAX_PERSISTED;
        messages.drain(..excess);
    }
    write_record(store, &messages).await
}

pub async fn clear_record(store: &dyn DurableStore) -> Result<(), StoreError> {
    store.remove(RECORD_KEY).await
}
