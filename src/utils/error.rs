// src/utils/error.rs
use thiserror::Error;

// Errors raised while turning raw document bytes into a block stream
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Invalid document archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Document part not found: {0}")]
    MissingPart(String),

    #[error("Malformed document XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Block stream is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Conversion worker failed: {0}")]
    Worker(String),

    #[error("Unsupported document format: {0}")]
    Unsupported(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Could not read {path}: {source}")]
    ReadFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Document conversion failed: {0}")]
    ConversionFailure(#[from] ConvertError),

    #[error(
        "No questions found. Mark each question as 'Câu 1: ...' (or 'Question 1: ...') \
         and each option on its own line as 'A.', 'B.', 'C.', 'D.'"
    )]
    NoQuestionsFound,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConvertError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_questions_message_names_both_markers() {
        let message = ExtractError::NoQuestionsFound.to_string();
        assert!(message.contains("Câu 1:"));
        assert!(message.contains("'A.'"));
        assert!(message.contains("'D.'"));
    }

    #[test]
    fn conversion_errors_are_wrapped_unchanged() {
        let err: ExtractError = ConvertError::MissingPart("word/document.xml".to_string()).into();
        match err {
            ExtractError::ConversionFailure(ConvertError::MissingPart(part)) => {
                assert_eq!(part, "word/document.xml")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
