use moka::{sync::Cache as MemoryStore, Expiry};
use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;

mod macros;

/// Entry bound of the in-memory backend
pub const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Recommendation reason, keyed by a content hash of its inputs
    Reason(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Reason(hash) => write!(f, "reason:{}", hash),
        }
    }
}

/// Creates a Redis client for caching
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

#[derive(Clone)]
struct MemoryEntry {
    value: String,
    ttl: Duration,
}

/// Expires each memory entry after the TTL it was written with
struct EntryTtl;

impl Expiry<String, MemoryEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &MemoryEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &MemoryEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

#[derive(Clone)]
enum Backend {
    Redis {
        client: Client,
        write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
    },
    Memory(MemoryStore<String, MemoryEntry>),
}

/// Cache handler for storing and retrieving JSON values with a TTL
///
/// Backed by Redis when configured, otherwise by a bounded process-local
/// store that evicts by TTL and by size. Clones share the same storage.
#[derive(Clone)]
pub struct Cache {
    backend: Backend,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Initiates a graceful shutdown of the cache writer
    ///
    /// Sends a shutdown signal to the writer task and waits for it to flush
    /// all pending writes to Redis.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a Redis-backed cache with an async write background task
    ///
    /// This spawns a background task that processes cache writes asynchronously,
    /// preventing cache operations from blocking API responses.
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            backend: Backend::Redis {
                client: redis_client,
                write_tx,
            },
        };

        let handle = CacheWriterHandle { shutdown_tx };

        (cache, handle)
    }

    /// Creates a process-local cache; writes are visible immediately
    pub fn in_memory() -> Self {
        Self::in_memory_with_capacity(DEFAULT_MEMORY_CAPACITY)
    }

    /// Process-local cache holding at most `capacity` entries
    pub fn in_memory_with_capacity(capacity: u64) -> Self {
        let store = MemoryStore::builder()
            .max_capacity(capacity)
            .expire_after(EntryTtl)
            .build();

        Self {
            backend: Backend::Memory(store),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Redis { .. } => "redis",
            Backend::Memory(_) => "memory",
        }
    }

    /// Background task that processes cache write messages
    ///
    /// On shutdown signal, flushes all remaining messages before exiting.
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");
        let mut pending_writes = 0;

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    pending_writes += 1;
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, "Failed to write to Redis cache");
                    } else {
                        pending_writes -= 1;
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!(pending = pending_writes, "Cache writer shutting down, flushing remaining writes");

                    // Drain without waiting on senders still held by cache clones
                    while let Ok(msg) = write_rx.try_recv() {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::error!(error = %e, "Failed to flush cache write during shutdown");
                        }
                    }

                    tracing::info!("Cache writer task stopped");
                    break;
                }
            }
        }
    }

    /// Writes a single message to Redis
    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
        match &self.backend {
            Backend::Redis { client, .. } => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let cached: Option<String> = conn.get(key).await?;
                Ok(cached)
            }
            Backend::Memory(store) => Ok(store.get(key).map(|entry| entry.value)),
        }
    }

    /// Retrieves a value from the cache by key
    ///
    /// If the key exists in the cache, the value is deserialized and returned.
    /// If the key does not exist or has expired, `None` is returned.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        match self.get_raw(&key.to_string()).await? {
            Some(json) => {
                let data = serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    /// Stores a value in the cache without blocking
    ///
    /// For Redis the write is handed to the background worker; for the memory
    /// backend it is applied in place. A zero TTL stores nothing.
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        if ttl == 0 {
            return;
        }

        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        match &self.backend {
            Backend::Redis { write_tx, .. } => {
                let msg = CacheWriteMessage {
                    key: key.to_string(),
                    value: json,
                    ttl,
                };

                if let Err(e) = write_tx.send(msg) {
                    tracing::error!(error = %e, "Failed to send cache write message");
                }
            }
            Backend::Memory(store) => {
                store.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: json,
                        ttl: Duration::from_secs(ttl),
                    },
                );
            }
        }
    }
}
