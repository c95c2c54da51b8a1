// src/quiz/mod.rs
pub mod models;
pub mod scoring;

pub use models::{MatchingPair, ParsedQuiz, Question, QuestionType};
