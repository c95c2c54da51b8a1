// src/extractors/mod.rs
pub mod answer_key;
pub mod assembler;
pub mod blocks;
pub mod quiz;

// Re-export key extraction types for convenience
#[allow(unused_imports)]
pub use quiz::{derive_title, parse_word_file, QuizExtractor};
