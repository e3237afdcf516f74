//! Session store: refresh tokens, session records and reset tokens, all
//! with TTL-based expiry.
//!
//! Key patterns:
//!
//! ```text
//! refresh_token:{user_id} -> signed refresh token (7 days)
//! session:{user_id}       -> SessionRecord JSON (7 days)
//! reset_token:{user_id}   -> signed reset token (1 hour)
//! ```
//!
//! One key per user means a second login overwrites the first, which is
//! what invalidates older refresh tokens. Concurrent logins by the same
//! user race last-write-wins; there is no locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

pub fn refresh_token_key(user_id: Uuid) -> String {
    format!("refresh_token:{user_id}")
}

pub fn session_key(user_id: Uuid) -> String {
    format!("session:{user_id}")
}

pub fn reset_token_key(user_id: Uuid) -> String {
    format!("reset_token:{user_id}")
}

/// Server-side marker of an active login, stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub email: String,
}

/// Thin key-value wrapper: set-with-expiry, get, delete.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Redis-backed store. The `ConnectionManager` is cheap to clone and
/// reconnects on its own.
pub struct RedisSessionStore {
    conn: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(500));

        let client = Client::open(redis_url)?;
        let conn = client.get_connection_manager_with_config(config).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        anyhow::ensure!(pong == "PONG", "unexpected PING reply: {pong}");
        Ok(())
    }
}

/// In-memory stand-in with the same TTL semantics, used by tests and
/// `AppState::fake()`.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((_, deadline)) if *deadline <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_templates() {
        let id = Uuid::nil();
        assert_eq!(
            refresh_token_key(id),
            "refresh_token:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            session_key(id),
            "session:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            reset_token_key(id),
            "reset_token:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn session_record_json_roundtrip() {
        let record = SessionRecord {
            user_id: Uuid::new_v4(),
            email: "a@x.com".into(),
        };
        let json = serde_json::to_string(&record).expect("serialize");
        let back: SessionRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(record, back);
    }

    #[tokio::test]
    async fn memory_store_set_get_delete() {
        let store = MemorySessionStore::new();
        let ttl = Duration::from_secs(60);

        store.set("session:u1", "v1", ttl).await.expect("set");
        assert_eq!(
            store.get("session:u1").await.expect("get"),
            Some("v1".to_string())
        );

        store.delete("session:u1").await.expect("delete");
        assert_eq!(store.get("session:u1").await.expect("get"), None);
    }

    #[tokio::test]
    async fn memory_store_overwrites_last_write_wins() {
        let store = MemorySessionStore::new();
        let ttl = Duration::from_secs(60);

        store.set("refresh_token:u1", "first", ttl).await.expect("set");
        store.set("refresh_token:u1", "second", ttl).await.expect("set");

        assert_eq!(
            store.get("refresh_token:u1").await.expect("get"),
            Some("second".to_string())
        );
    }

    #[tokio::test]
    async fn memory_store_expires_entries() {
        let store = MemorySessionStore::new();

        store
            .set("reset_token:u1", "v", Duration::from_millis(10))
            .await
            .expect("set");
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.get("reset_token:u1").await.expect("get"), None);
    }
}
