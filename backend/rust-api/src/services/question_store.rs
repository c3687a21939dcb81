use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

use super::document_store::{DocumentStore, RANDOM_VIEW};
use crate::error::{Result, TriviaError};
use crate::metrics::ASKED_LIST_RESETS_TOTAL;
use crate::models::{Direction, QuestionDocument, ViewRow};

/// Random question selection and single-document access on top of a [`DocumentStore`].
#[derive(Clone)]
pub struct QuestionStore {
    store: Arc<dyn DocumentStore>,
}

impl QuestionStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Picks a random question that is not in `asked`.
    ///
    /// Returns the question row together with `asked` plus the new id. When every
    /// question has already been asked the returned list restarts with just the
    /// returned question.
    pub async fn fetch_unseen_question(&self, asked: &[String]) -> Result<(ViewRow, Vec<String>)> {
        let (direction, start_key) = {
            let mut rng = rand::rng();
            (Direction::random(&mut rng), rng.random::<f64>())
        };
        self.fetch_unseen_question_from(asked, direction, start_key)
            .await
    }

    pub(crate) async fn fetch_unseen_question_from(
        &self,
        asked: &[String],
        direction: Direction,
        start_key: f64,
    ) -> Result<(ViewRow, Vec<String>)> {
        let seen: HashSet<&str> = asked.iter().map(String::as_str).collect();
        // first row of the latest non-empty query, served if everything was asked
        let mut fallback: Option<ViewRow> = None;

        for direction in [direction, direction.opposite()] {
            tracing::debug!(
                "Querying {} {:?} from start key {}",
                RANDOM_VIEW,
                direction,
                start_key
            );
            let mut rows = self
                .store
                .query_ordered(RANDOM_VIEW, direction, start_key)
                .await?;

            if let Some(position) = rows.iter().position(|row| !seen.contains(row.id.as_str())) {
                let row = rows.swap_remove(position);
                let mut updated = asked.to_vec();
                updated.push(row.id.clone());
                return Ok((row, updated));
            }

            if let Some(first) = rows.into_iter().next() {
                fallback = Some(first);
            }
        }

        let row = fallback.ok_or_else(|| {
            tracing::warn!("No question documents returned from database");
            TriviaError::NotFound("No questions available".to_string())
        })?;

        tracing::info!(
            "All {} known questions asked, restarting with {}",
            asked.len(),
            row.id
        );
        ASKED_LIST_RESETS_TOTAL.inc();
        let updated = vec![row.id.clone()];
        Ok((row, updated))
    }

    pub async fn read_document(&self, id: &str) -> Result<QuestionDocument> {
        self.store
            .retrieve_by_id(id)
            .await?
            .ok_or_else(|| TriviaError::NotFound(format!("Question {}", id)))
    }

    /// Conflict-checked write; returns the new revision. Conflicts are not retried.
    pub async fn apply_update(
        &self,
        id: &str,
        revision: &str,
        document: QuestionDocument,
    ) -> Result<String> {
        self.store.update_by_id(id, revision, document).await
    }
}
