use crate::config::Config;
use mongodb::Client as MongoClient;
use redis::aio::ConnectionManager;
use std::sync::Arc;

use document_store::{DocumentStore, MongoDocumentStore};
use question_store::QuestionStore;
use session_store::{RedisSessionStore, SessionContext, SessionStore};
use trivia_service::TriviaService;

pub struct AppState {
    pub config: Config,
    pub documents: Arc<dyn DocumentStore>,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let database = mongo_client.database(&config.mongo_database);
        let documents = MongoDocumentStore::new(database, &config.mongo_collection);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        let sessions = RedisSessionStore::new(redis, config.session_ttl_seconds);

        Ok(Self::with_stores(
            config,
            Arc::new(documents),
            Arc::new(sessions),
        ))
    }

    pub fn with_stores(
        config: Config,
        documents: Arc<dyn DocumentStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            documents,
            sessions,
        }
    }

    pub fn trivia_service(&self) -> TriviaService {
        TriviaService::new(
            QuestionStore::new(self.documents.clone()),
            self.config.question_timeout(),
        )
    }

    pub fn session(&self, session_id: &str) -> SessionContext {
        SessionContext::new(session_id, self.sessions.clone())
    }
}

pub mod document_store;
pub mod memory_store;
pub mod question_store;
pub mod session_store;
pub mod trivia_service;
