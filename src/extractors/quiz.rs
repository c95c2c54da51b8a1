// src/extractors/quiz.rs

// --- Imports ---
use crate::converter::DocumentConverter;
use crate::extractors::answer_key::extract_answer_key;
use crate::extractors::assembler::{finish, transition, AssemblerState, AssemblyEnv};
use crate::extractors::blocks::{classify_block, flatten, read_blocks, Block, BlockKind};
use crate::quiz::{ParsedQuiz, Question};
use crate::utils::error::ExtractError;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

// Distinguishes parses started within the same millisecond
static PARSE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_id_prefix() -> String {
    let sequence = PARSE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("q-{}-{}", chrono::Utc::now().timestamp_millis(), sequence)
}

/// File name without its last extension ("De thi.v2.docx" -> "De thi.v2").
pub fn derive_title(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => name[..idx].to_string(),
        _ => name,
    }
}

// --- Main Extractor Structure ---
pub struct QuizExtractor;

impl QuizExtractor {
    pub fn new() -> Self {
        Self {}
    }

    /// Reads the file and hands its bytes to the converter.
    pub async fn load_block_stream<C: DocumentConverter>(
        &self,
        converter: &C,
        path: &Path,
    ) -> Result<String, ExtractError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ExtractError::ReadFailure {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!("Read {} bytes from {}", bytes.len(), path.display());

        let stream = converter.convert(&bytes).await?;
        tracing::debug!("Converter produced {} bytes of block stream", stream.len());
        Ok(stream)
    }

    /// Every block of the stream with its classification, for debug output.
    pub fn classify_stream(&self, html: &str) -> Vec<(Block, BlockKind)> {
        read_blocks(html)
            .into_iter()
            .map(|block| {
                let kind = classify_block(&block);
                (block, kind)
            })
            .collect()
    }

    /// Builds the quiz from an HTML block stream.
    pub fn extract(&self, html: &str, title: &str) -> Result<ParsedQuiz, ExtractError> {
        let blocks = read_blocks(html);
        let questions = self.assemble(&blocks)?;
        tracing::info!("Extracted {} questions for '{}'", questions.len(), title);
        Ok(ParsedQuiz {
            title: title.to_string(),
            questions,
        })
    }

    /// Runs the answer key and the question state machine over the blocks.
    /// Fails only when no question comes out.
    pub fn assemble(&self, blocks: &[Block]) -> Result<Vec<Question>, ExtractError> {
        let answer_key = extract_answer_key(&flatten(blocks));
        let id_prefix = next_id_prefix();
        let env = AssemblyEnv {
            answer_key: &answer_key,
            id_prefix: &id_prefix,
        };

        let mut state = AssemblerState::default();
        let mut questions = Vec::new();
        for block in blocks {
            if state.halted {
                break;
            }
            let step = transition(state, classify_block(block), &env);
            questions.extend(step.emitted);
            state = step.state;
        }
        questions.extend(finish(state));

        if questions.is_empty() {
            tracing::error!("No question markers found in {} blocks", blocks.len());
            return Err(ExtractError::NoQuestionsFound);
        }

        let unused = answer_key.len().saturating_sub(questions.len());
        if unused > 0 {
            tracing::debug!("{} answer-key entries have no matching question", unused);
        }
        Ok(questions)
    }
}

impl Default for QuizExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads, converts and extracts one document. The title comes from the file name.
pub async fn parse_word_file<C: DocumentConverter>(
    converter: &C,
    path: &Path,
) -> Result<ParsedQuiz, ExtractError> {
    let extractor = QuizExtractor::new();
    let stream = extractor.load_block_stream(converter, path).await?;
    extractor.extract(&stream, &derive_title(path))
}
