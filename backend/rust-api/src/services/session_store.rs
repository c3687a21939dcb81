use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{Result, TriviaError};
use crate::metrics::track_session_operation;
use crate::models::ASKED_QUESTIONS_KEY;

/// Key-value state scoped to one client session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>>;

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<()>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

pub struct RedisSessionStore {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    fn key(session_id: &str, key: &str) -> String {
        format!("trivia:session:{}:{}", session_id, key)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>> {
        let mut conn = self.redis.clone();
        let redis_key = Self::key(session_id, key);

        let raw: Option<String> = track_session_operation("get", async {
            redis::cmd("GET")
                .arg(&redis_key)
                .query_async::<Option<String>>(&mut conn)
                .await
        })
        .await?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| TriviaError::Session(format!("Corrupt value at {}: {}", redis_key, e)))
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<()> {
        let mut conn = self.redis.clone();
        let redis_key = Self::key(session_id, key);
        let json = value.to_string();

        track_session_operation("setex", async {
            redis::cmd("SETEX")
                .arg(&redis_key)
                .arg(self.ttl_seconds)
                .arg(json)
                .query_async::<()>(&mut conn)
                .await
        })
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

/// Session identity plus the store it lives in, passed explicitly to the trivia service.
#[derive(Clone)]
pub struct SessionContext {
    id: String,
    store: Arc<dyn SessionStore>,
}

impl SessionContext {
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            id: id.into(),
            store,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Ids already served in this session; empty when nothing was stored yet.
    pub async fn asked_questions(&self) -> Result<Vec<String>> {
        let stored = self.store.get(&self.id, ASKED_QUESTIONS_KEY).await?;

        let asked = match stored {
            None => Vec::new(),
            Some(Value::Array(ids)) => ids
                .into_iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect(),
            Some(other) => {
                tracing::warn!(
                    "Ignoring malformed asked list in session {}: {}",
                    self.id,
                    other
                );
                Vec::new()
            }
        };

        Ok(asked)
    }

    pub async fn set_asked_questions(&self, asked: &[String]) -> Result<()> {
        self.store
            .set(&self.id, ASKED_QUESTIONS_KEY, Value::from(asked.to_vec()))
            .await
    }
}
