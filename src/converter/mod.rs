// src/converter/mod.rs
pub mod docx;

use crate::extractors::blocks::escape_html;
use crate::utils::error::ConvertError;
use std::future::Future;
use std::path::Path;

pub use docx::DocxConverter;

/// Turns a raw document buffer into an HTML block stream.
/// This is the only await point of an extraction.
pub trait DocumentConverter {
    fn convert(&self, buffer: &[u8]) -> impl Future<Output = Result<String, ConvertError>> + Send;
}

/// Input that is already a converted block stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlConverter;

impl DocumentConverter for HtmlConverter {
    async fn convert(&self, buffer: &[u8]) -> Result<String, ConvertError> {
        let text = String::from_utf8(buffer.to_vec())?;
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }
}

/// Plain text, one block per non-empty line.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextConverter;

impl PlainTextConverter {
    pub fn to_html(text: &str) -> String {
        text.trim_start_matches('\u{feff}')
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| format!("<p>{}</p>", escape_html(line)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DocumentConverter for PlainTextConverter {
    async fn convert(&self, buffer: &[u8]) -> Result<String, ConvertError> {
        let text = String::from_utf8(buffer.to_vec())?;
        Ok(Self::to_html(&text))
    }
}

/// Converter picked from a file extension.
#[derive(Debug, Clone, Copy)]
pub enum Converter {
    Docx(DocxConverter),
    Html(HtmlConverter),
    PlainText(PlainTextConverter),
}

impl Converter {
    pub fn for_path(path: &Path) -> Result<Self, ConvertError> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let converter = match extension.as_str() {
            "docx" => Converter::Docx(DocxConverter),
            "html" | "htm" => Converter::Html(HtmlConverter),
            "txt" => Converter::PlainText(PlainTextConverter),
            "doc" => {
                return Err(ConvertError::Unsupported(
                    "legacy .doc files are not supported; save the document as .docx".to_string(),
                ))
            }
            _ => return Err(ConvertError::Unsupported(path.display().to_string())),
        };
        tracing::debug!("Using {:?} for {}", converter, path.display());
        Ok(converter)
    }
}

impl DocumentConverter for Converter {
    async fn convert(&self, buffer: &[u8]) -> Result<String, ConvertError> {
        match self {
            Converter::Docx(inner) => inner.convert(buffer).await,
            Converter::Html(inner) => inner.convert(buffer).await,
            Converter::PlainText(inner) => inner.convert(buffer).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_converter_by_extension() {
        assert!(matches!(Converter::for_path(Path::new("de-thi.DOCX")), Ok(Converter::Docx(_))));
        assert!(matches!(Converter::for_path(Path::new("a/b.htm")), Ok(Converter::Html(_))));
        assert!(matches!(Converter::for_path(Path::new("notes.txt")), Ok(Converter::PlainText(_))));
        assert!(matches!(Converter::for_path(Path::new("old.doc")), Err(ConvertError::Unsupported(_))));
        assert!(matches!(Converter::for_path(Path::new("noext")), Err(ConvertError::Unsupported(_))));
    }

    #[test]
    fn plain_text_lines_become_paragraphs() {
        let html = PlainTextConverter::to_html("\u{feff}Câu 1: 1 < 2?\n\n  A. Đúng  \r\n");
        assert_eq!(html, "<p>Câu 1: 1 &lt; 2?</p>\n<p>A. Đúng</p>");
    }

    #[test]
    fn html_passthrough_rejects_invalid_utf8() {
        let result = tokio_test::block_on(HtmlConverter.convert(&[0xff, 0xfe, 0x00]));
        assert!(matches!(result, Err(ConvertError::Encoding(_))));

        let html = tokio_test::block_on(Converter::Html(HtmlConverter).convert(b"<p>x</p>")).unwrap();
        assert_eq!(html, "<p>x</p>");
    }
}
