pub mod question;

pub use question::{
    AnswerRequest, Direction, Language, QuestionDocument, QuestionView, ViewRow,
    ASKED_QUESTIONS_KEY,
};
