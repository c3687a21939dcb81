use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Session key holding the ids of questions already served to a client.
pub const ASKED_QUESTIONS_KEY: &str = "askedQuestions";

const ID_FIELD: &str = "_id";
const REVISION_FIELD: &str = "_rev";
const SORT_KEY_FIELD: &str = "rand";
const TIMES_ATTEMPTED_FIELD: &str = "timesAttempted";
const TIMES_CORRECT_FIELD: &str = "timesCorrect";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Es,
}

impl Language {
    /// Resolves a route parameter; anything other than a supported code means English.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("ES") => Language::Es,
            _ => Language::En,
        }
    }

    /// Suffix appended to localized field names (`question`, `questionES`, ...).
    pub fn suffix(&self) -> &'static str {
        match self {
            Language::En => "",
            Language::Es => "ES",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            Direction::Descending
        } else {
            Direction::Ascending
        }
    }
}

/// A question as stored: free-form JSON fields with a few well-known keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionDocument(Map<String, Value>);

impl QuestionDocument {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn revision(&self) -> Option<&str> {
        self.0.get(REVISION_FIELD).and_then(Value::as_str)
    }

    pub fn set_revision(&mut self, revision: &str) {
        self.0
            .insert(REVISION_FIELD.to_string(), Value::from(revision));
    }

    pub fn sort_key(&self) -> Option<f64> {
        self.0.get(SORT_KEY_FIELD).and_then(Value::as_f64)
    }

    pub fn times_attempted(&self) -> Option<u64> {
        self.0.get(TIMES_ATTEMPTED_FIELD).and_then(Value::as_u64)
    }

    pub fn times_correct(&self) -> Option<u64> {
        self.0.get(TIMES_CORRECT_FIELD).and_then(Value::as_u64)
    }

    pub fn set_counters(&mut self, times_attempted: u64, times_correct: u64) {
        self.0
            .insert(TIMES_ATTEMPTED_FIELD.to_string(), Value::from(times_attempted));
        self.0
            .insert(TIMES_CORRECT_FIELD.to_string(), Value::from(times_correct));
    }

    /// Localized text field, e.g. `text("question", Language::Es)` reads `questionES`.
    pub fn text(&self, field: &str, language: Language) -> Option<&str> {
        self.0
            .get(&format!("{}{}", field, language.suffix()))
            .and_then(Value::as_str)
    }

    pub fn incorrect_answer(&self, index: usize, language: Language) -> Option<&str> {
        self.0
            .get(&format!("incorrectAnswers{}", language.suffix()))
            .and_then(|answers| answers.get(index))
            .and_then(Value::as_str)
    }
}

/// One row of the randomly keyed question view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub id: String,
    pub key: f64,
    pub value: QuestionDocument,
}

/// Client-facing projection of a question with shuffled answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub question: String,
    pub answer1: String,
    pub answer2: String,
    pub answer3: String,
    pub answer4: String,
    pub id: String,
    pub correct: String,
    pub times_correct: u64,
    pub times_attempted: u64,
}

impl QuestionView {
    pub fn answers(&self) -> [&str; 4] {
        [
            self.answer1.as_str(),
            self.answer2.as_str(),
            self.answer3.as_str(),
            self.answer4.as_str(),
        ]
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnswerRequest {
    #[validate(length(min = 1, message = "question id must not be empty"))]
    pub question: String,
    pub correct: bool,
}
