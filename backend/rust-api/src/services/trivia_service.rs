use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

use super::question_store::QuestionStore;
use super::session_store::SessionContext;
use crate::error::{Result, TriviaError};
use crate::metrics::{ANSWERS_SUBMITTED_TOTAL, BATCH_LOOKUP_TIMEOUTS_TOTAL, QUESTIONS_SERVED_TOTAL};
use crate::models::{Language, QuestionDocument, QuestionView};

const MISSING_QUESTION_TEXT: &str = "Question not found";
const MISSING_ANSWER_TEXT: &str = " ";

pub struct TriviaService {
    questions: QuestionStore,
    lookup_timeout: Duration,
}

impl TriviaService {
    pub fn new(questions: QuestionStore, lookup_timeout: Duration) -> Self {
        Self {
            questions,
            lookup_timeout,
        }
    }

    pub async fn get_one_question(
        &self,
        session: &SessionContext,
        language: Language,
    ) -> Result<QuestionView> {
        let asked = session.asked_questions().await?;

        let (row, updated) = self
            .questions
            .fetch_unseen_question(&asked)
            .await
            .map_err(|e| {
                tracing::warn!("Could not read a question from the database: {}", e);
                e
            })?;

        let view = format_question(&row.value, language, &mut rand::rng());
        session.set_asked_questions(&updated).await?;

        QUESTIONS_SERVED_TOTAL.with_label_values(&["single"]).inc();
        Ok(view)
    }

    /// Serves up to `count` distinct questions.
    ///
    /// Lookups run one after another so each sees the asked list produced by the
    /// previous one. A lookup that fails or exceeds the per-call timeout is left
    /// out of the batch and the next lookup continues from the last good list.
    pub async fn get_many_questions(
        &self,
        session: &SessionContext,
        language: Language,
        count: usize,
    ) -> Result<Vec<QuestionView>> {
        let mut asked = session.asked_questions().await?;
        let mut views = Vec::with_capacity(count);

        for lookup in 0..count {
            let outcome = tokio::time::timeout(
                self.lookup_timeout,
                self.questions.fetch_unseen_question(&asked),
            )
            .await;

            match outcome {
                Ok(Ok((row, updated))) => {
                    asked = updated;
                    views.push(format_question(&row.value, language, &mut rand::rng()));
                }
                Ok(Err(e)) => {
                    tracing::warn!("Question lookup {} of {} failed: {}", lookup + 1, count, e);
                }
                Err(_) => {
                    BATCH_LOOKUP_TIMEOUTS_TOTAL.inc();
                    tracing::warn!(
                        "Question lookup {} of {} timed out after {:?}",
                        lookup + 1,
                        count,
                        self.lookup_timeout
                    );
                }
            }
        }

        if views.is_empty() {
            tracing::error!("Could not read questions from database");
            return Err(TriviaError::NotFound(
                "Could not read questions from database".to_string(),
            ));
        }

        session.set_asked_questions(&asked).await?;

        QUESTIONS_SERVED_TOTAL
            .with_label_values(&["batch"])
            .inc_by(views.len() as u64);
        Ok(views)
    }

    /// Records one attempt at `question_id`; returns the document's new revision.
    pub async fn submit_answer(&self, question_id: &str, correct: bool) -> Result<String> {
        let mut document = self.questions.read_document(question_id).await?;

        let times_attempted = document.times_attempted().ok_or_else(|| {
            TriviaError::Validation(format!("Question {} has no attempted count", question_id))
        })?;
        let times_correct = document.times_correct().ok_or_else(|| {
            TriviaError::Validation(format!("Question {} has no correct count", question_id))
        })?;
        let revision = document
            .revision()
            .map(str::to_string)
            .ok_or_else(|| {
                TriviaError::Validation(format!("Question {} has no revision", question_id))
            })?;

        let (times_attempted, times_correct) = tally(times_attempted, times_correct, correct);
        document.set_counters(times_attempted, times_correct);

        let new_revision = self
            .questions
            .apply_update(question_id, &revision, document)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update question {}: {}", question_id, e);
                e
            })?;

        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[if correct { "true" } else { "false" }])
            .inc();
        tracing::info!(
            "Question {} now at {}/{} correct",
            question_id,
            times_correct,
            times_attempted
        );

        Ok(new_revision)
    }
}

fn tally(times_attempted: u64, times_correct: u64, correct: bool) -> (u64, u64) {
    let times_correct = if correct {
        times_correct + 1
    } else {
        times_correct
    };
    (times_attempted + 1, times_correct)
}

/// Uniform permutation of the correct answer and the three distractors.
pub fn shuffle_answers<R: Rng + ?Sized>(
    correct: &str,
    incorrect: [&str; 3],
    rng: &mut R,
) -> [String; 4] {
    let mut answers = [
        correct.to_string(),
        incorrect[0].to_string(),
        incorrect[1].to_string(),
        incorrect[2].to_string(),
    ];
    answers.shuffle(rng);
    answers
}

pub fn format_question<R: Rng + ?Sized>(
    document: &QuestionDocument,
    language: Language,
    rng: &mut R,
) -> QuestionView {
    let correct = document
        .text("correctAnswer", language)
        .unwrap_or(MISSING_ANSWER_TEXT);
    let incorrect = [0, 1, 2].map(|index| {
        document
            .incorrect_answer(index, language)
            .unwrap_or(MISSING_ANSWER_TEXT)
    });
    let [answer1, answer2, answer3, answer4] = shuffle_answers(correct, incorrect, rng);

    QuestionView {
        question: document
            .text("question", language)
            .unwrap_or(MISSING_QUESTION_TEXT)
            .to_string(),
        answer1,
        answer2,
        answer3,
        answer4,
        id: document.id().unwrap_or_default().to_string(),
        correct: correct.to_string(),
        times_correct: document.times_correct().unwrap_or(0),
        times_attempted: document.times_attempted().unwrap_or(0),
    }
}
