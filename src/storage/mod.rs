use std::fs;
use std::path::{Path, PathBuf};
use crate::quiz::{ParsedQuiz, QuestionType};
use crate::utils::error::StorageError;

/// File-system friendly form of a quiz title.
pub fn slugify(title: &str) -> String {
    let slug: String = title
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if slug.is_empty() {
        "quiz".to_string()
    } else {
        slug
    }
}

pub struct StorageManager {
    base_dir: PathBuf,
    pretty: bool,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P, pretty: bool) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path, pretty })
    }

    pub fn path_for(&self, quiz: &ParsedQuiz, suffix: &str) -> PathBuf {
        self.base_dir.join(format!("{}{}", slugify(&quiz.title), suffix))
    }

    fn write_json(&self, path: &Path, value: &impl serde::Serialize) -> Result<(), StorageError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(path, json).map_err(StorageError::IoError)
    }

    /// Saves the extracted quiz as `<slug>.json`
    pub fn save_quiz(&self, quiz: &ParsedQuiz) -> Result<PathBuf, StorageError> {
        let file_path = self.path_for(quiz, ".json");
        self.write_json(&file_path, quiz)?;

        tracing::info!("Saved {} questions to {}", quiz.questions.len(), file_path.display());
        Ok(file_path)
    }

    /// Saves a summary of the extraction as `<slug>_meta.json`
    pub fn save_quiz_metadata(&self, quiz: &ParsedQuiz, source: &Path) -> Result<PathBuf, StorageError> {
        let file_path = self.path_for(quiz, "_meta.json");

        let metadata = serde_json::json!({
            "title": quiz.title,
            "source_file": source.display().to_string(),
            "question_count": quiz.questions.len(),
            "by_type": {
                (QuestionType::MultipleChoice.label()): quiz.count_of(QuestionType::MultipleChoice),
                (QuestionType::TrueFalse.label()): quiz.count_of(QuestionType::TrueFalse),
                (QuestionType::ShortAnswer.label()): quiz.count_of(QuestionType::ShortAnswer),
                (QuestionType::Matching.label()): quiz.count_of(QuestionType::Matching),
            },
            "parts": quiz.part_ids(),
            "total_points": quiz.total_points(),
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.write_json(&file_path, &metadata)?;

        tracing::info!("Saved metadata to {}", file_path.display());
        Ok(file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::Question;

    fn sample_quiz() -> ParsedQuiz {
        ParsedQuiz {
            title: "Đề thi / HK1".to_string(),
            questions: vec![Question {
                id: "q-1-0-0".to_string(),
                question_type: QuestionType::TrueFalse,
                part_id: "part-1".to_string(),
                part_title: None,
                text: "Trời xanh?".to_string(),
                options: Vec::new(),
                correct_answer: None,
                true_false_answer: Some(true),
                short_answer_text: None,
                matching_pairs: None,
                points: 10.0,
            }],
        }
    }

    #[test]
    fn slug_keeps_letters_and_replaces_separators() {
        assert_eq!(slugify("Đề thi / HK1"), "Đề_thi___HK1");
        assert_eq!(slugify("   "), "quiz");
    }

    #[test]
    fn writes_quiz_and_metadata() {
        let dir = std::env::temp_dir().join(format!("quizdoc-storage-{}", std::process::id()));
        let storage = StorageManager::new(&dir, true).unwrap();
        let quiz = sample_quiz();

        let quiz_path = storage.save_quiz(&quiz).unwrap();
        let saved: ParsedQuiz = serde_json::from_str(&fs::read_to_string(&quiz_path).unwrap()).unwrap();
        assert_eq!(saved, quiz);

        let meta_path = storage.save_quiz_metadata(&quiz, Path::new("de-thi.docx")).unwrap();
        let meta: serde_json::Value = serde_json::from_str(&fs::read_to_string(&meta_path).unwrap()).unwrap();
        assert_eq!(meta["question_count"], 1);
        assert_eq!(meta["by_type"]["true_false"], 1);
        assert_eq!(meta["parts"][0], "part-1");
        assert_eq!(meta["total_points"], 10.0);

        fs::remove_dir_all(&dir).ok();
    }
}
