//! In-process stores used by the test suite and for running without MongoDB/Redis.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use super::document_store::{next_revision, DocumentStore, RANDOM_VIEW};
use super::session_store::SessionStore;
use crate::error::{Result, TriviaError};
use crate::models::{Direction, QuestionDocument, ViewRow};

const STALL_DURATION: Duration = Duration::from_secs(30);

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<String, QuestionDocument>>,
    writes: AtomicUsize,
    failing: AtomicBool,
    stalled_queries: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents without `_id` are skipped; missing revisions start at generation 1.
    pub fn with_documents(documents: impl IntoIterator<Item = QuestionDocument>) -> Self {
        let documents = documents
            .into_iter()
            .filter_map(|mut document| {
                let id = document.id()?.to_string();
                if document.revision().is_none() {
                    document.set_revision(&next_revision(""));
                }
                Some((id, document))
            })
            .collect();

        Self {
            documents: RwLock::new(documents),
            ..Self::default()
        }
    }

    pub async fn get(&self, id: &str) -> Option<QuestionDocument> {
        self.documents.read().await.get(id).cloned()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent call fail with a store error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The next `count` view queries hang instead of answering.
    pub fn stall_next_queries(&self, count: usize) {
        self.stalled_queries.store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TriviaError::Store("in-memory store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn retrieve_by_id(&self, id: &str) -> Result<Option<QuestionDocument>> {
        self.check_available()?;
        Ok(self.get(id).await)
    }

    async fn query_ordered(
        &self,
        view: &str,
        direction: Direction,
        start_key: f64,
    ) -> Result<Vec<ViewRow>> {
        self.check_available()?;
        if view != RANDOM_VIEW {
            return Err(TriviaError::Store(format!("Unknown view: {}", view)));
        }

        let stalled = self
            .stalled_queries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stalled {
            tokio::time::sleep(STALL_DURATION).await;
        }

        let documents = self.documents.read().await;
        let mut rows: Vec<ViewRow> = documents
            .iter()
            .filter_map(|(id, document)| {
                let key = document.sort_key()?;
                let in_range = match direction {
                    Direction::Ascending => key >= start_key,
                    Direction::Descending => key <= start_key,
                };
                in_range.then(|| ViewRow {
                    id: id.clone(),
                    key,
                    value: document.clone(),
                })
            })
            .collect();

        rows.sort_by(|a, b| a.key.total_cmp(&b.key).then_with(|| a.id.cmp(&b.id)));
        if direction == Direction::Descending {
            rows.reverse();
        }

        Ok(rows)
    }

    async fn update_by_id(
        &self,
        id: &str,
        revision: &str,
        document: QuestionDocument,
    ) -> Result<String> {
        self.check_available()?;
        let mut documents = self.documents.write().await;

        let current = documents
            .get(id)
            .ok_or_else(|| TriviaError::NotFound(format!("Question {}", id)))?;
        if current.revision() != Some(revision) {
            return Err(TriviaError::Conflict(format!(
                "Question {} no longer at revision {}",
                id, revision
            )));
        }

        let (Some(times_attempted), Some(times_correct)) =
            (document.times_attempted(), document.times_correct())
        else {
            return Err(TriviaError::Validation(format!(
                "Question {} has no answer counters",
                id
            )));
        };

        let mut updated = current.clone();
        let new_revision = next_revision(revision);
        updated.set_counters(times_attempted, times_correct);
        updated.set_revision(&new_revision);
        documents.insert(id.to_string(), updated);
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(new_revision)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .and_then(|values| values.get(key))
            .cloned())
    }

    async fn set(&self, session_id: &str, key: &str, value: Value) -> Result<()> {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }
}
