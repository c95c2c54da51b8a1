// src/utils/html_debug.rs
use std::fs::File;
use std::io::Write;
use std::path::Path;
use crate::extractors::blocks::{escape_html, Block, BlockKind};
use crate::utils::error::AppError;

/// Builds an HTML page where every block is highlighted by how it was classified.
pub fn render_debug_html(classified: &[(Block, BlockKind)]) -> String {
    let mut debug_html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n");

    // CSS for highlight colors
    debug_html.push_str(".highlight-question { background-color: #FFFF00; }\n");
    debug_html.push_str(".highlight-option { background-color: #90EE90; }\n");
    debug_html.push_str(".highlight-part { background-color: #ADD8E6; }\n");
    debug_html.push_str(".highlight-answer-key { background-color: #FFA500; }\n");
    debug_html.push_str(".highlight-continuation { background-color: #F5F5F5; }\n");
    debug_html.push_str("</style>\n</head>\n<body>\n");

    for (index, (block, kind)) in classified.iter().enumerate() {
        let detail = match kind {
            BlockKind::QuestionStart { number, .. } => format!("question {}", number),
            BlockKind::OptionMarker { letter, .. } => format!("option {}", letter),
            BlockKind::OptionRow(entries) => format!("option row x{}", entries.len()),
            other => other.label().to_string(),
        };
        debug_html.push_str(&format!(
            "<div class=\"highlight-{}\" title=\"Block {}: {}\">{}</div>\n",
            kind.label(),
            index,
            escape_html(&detail),
            block.html
        ));
    }

    debug_html.push_str("</body>\n</html>");
    debug_html
}

/// Writes the annotated block stream to `path`.
pub fn save_debug_html(classified: &[(Block, BlockKind)], path: &Path) -> Result<(), AppError> {
    let mut file = File::create(path)?;
    file.write_all(render_debug_html(classified).as_bytes())?;

    tracing::info!("Saved debug HTML to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::blocks::classify_block;

    #[test]
    fn wraps_each_block_with_its_kind() {
        let classified: Vec<(Block, BlockKind)> = ["Câu 3: x?", "A. 1", "ĐÁP ÁN"]
            .iter()
            .map(|line| {
                let block = Block::plain(line);
                let kind = classify_block(&block);
                (block, kind)
            })
            .collect();

        let html = render_debug_html(&classified);
        assert!(html.contains("<div class=\"highlight-question\" title=\"Block 0: question 3\">Câu 3: x?</div>"));
        assert!(html.contains("class=\"highlight-option\" title=\"Block 1: option A\""));
        assert!(html.contains("class=\"highlight-answer-key\""));
    }
}
