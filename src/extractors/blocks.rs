// src/extractors/blocks.rs

// --- Imports ---
use crate::extractors::answer_key::ANSWER_KEY_HEADING_RE;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

// --- CSS Selectors (Lazy Static) ---
// Elements the converter emits for paragraphs, list items and table cells
static BLOCK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("p, li, td, th, h1, h2, h3, h4, h5, h6")
        .expect("Failed to compile BLOCK_SELECTOR")
});

const BLOCK_TAGS: [&str; 10] = ["p", "li", "td", "th", "h1", "h2", "h3", "h4", "h5", "h6"];

// --- Regex Patterns for Text Matching (Lazy Static) ---
// "PHẦN I. TRẮC NGHIỆM", "Part 2: Essay", "Section III"
static PART_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:phần|part|section|mục)\s+(?:\d+|[ivxlc]+)\b\s*(?:[:.\-–]\s*)?(.*)$")
        .expect("Failed to compile PART_HEADER_RE")
});

// "Câu 1:", "Câu hỏi 2.", "Question 3 -", "Câu 4)"
static QUESTION_START_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:câu\s+hỏi|câu|question)\s*(\d+)\s*[:.\-)]\s*(.*)$")
        .expect("Failed to compile QUESTION_START_RE")
});

// Same marker at the start of the markup, possibly wrapped in inline tags:
// "<strong>Câu 1</strong>: ..." keeps "<strong>" and "</strong>"
static QUESTION_MARKUP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^((?:\s*<[^>]+>)*)\s*(?:câu\s+hỏi|câu|question)\s*\d+((?:\s*</[^>]+>)*)\s*[:.\-)]\s*")
        .expect("Failed to compile QUESTION_MARKUP_RE")
});

static OPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Da-d])\s*[:.\-)]\s*(.*)$").expect("Failed to compile OPTION_RE")
});

static OPTION_MARKUP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:\s*<[^>]+>)*)\s*[A-Da-d]((?:\s*</[^>]+>)*)\s*[:.\-)]\s*")
        .expect("Failed to compile OPTION_MARKUP_RE")
});

// Upper-case markers inside a single line: "A. 3   B. 4   C. 5   D. 6"
static INLINE_OPTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)([A-D])\s*[.:)]").expect("Failed to compile INLINE_OPTION_RE")
});

// Inline tags left empty once a marker is cut out of them
static EMPTY_INLINE_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:strong|b|em|i|u|span)(?:\s[^>]*)?>\s*</(?:strong|b|em|i|u|span)>")
        .expect("Failed to compile EMPTY_INLINE_TAG_RE")
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)[^>]*>").expect("Failed to compile TAG_RE")
});

const VOID_TAGS: [&str; 4] = ["br", "hr", "img", "wbr"];

const NBSP_ENTITY: &str = "&nbsp;";

// --- Data Structures ---
/// One paragraph, list item or table cell of the converted document.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Plain text, non-breaking spaces normalized, trimmed.
    pub text: String,
    /// Inner markup, kept so inline formatting and images survive.
    pub html: String,
}

impl Block {
    pub fn new(text: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: html.into(),
        }
    }

    /// Block whose markup is its escaped text.
    pub fn plain(text: &str) -> Self {
        Self::new(text.trim(), escape_html(text.trim()))
    }

    fn from_parts(raw_text: &str, raw_html: &str) -> Option<Self> {
        let text = clean_text(raw_text);
        let html = raw_html.trim().to_string();
        if text.is_empty() && !html.contains("<img") {
            return None;
        }
        Some(Self { text, html })
    }

    fn from_element(element: ElementRef) -> Option<Self> {
        Self::from_parts(&element.text().collect::<String>(), &element.inner_html())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionEntry {
    pub letter: char,
    /// Option content with the marker cut out.
    pub text: String,
    /// The option as written, marker included.
    pub source: String,
}

/// What a block means to the question assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    AnswerKeyHeader,
    PartHeader { title: String },
    QuestionStart { number: u32, body: String },
    OptionMarker { letter: char, text: String, source: String },
    OptionRow(Vec<OptionEntry>),
    Continuation { html: String },
}

impl BlockKind {
    pub fn label(&self) -> &'static str {
        match self {
            BlockKind::AnswerKeyHeader => "answer-key",
            BlockKind::PartHeader { .. } => "part",
            BlockKind::QuestionStart { .. } => "question",
            BlockKind::OptionMarker { .. } | BlockKind::OptionRow(_) => "option",
            BlockKind::Continuation { .. } => "continuation",
        }
    }
}

// --- Block Reader ---
fn clean_text(raw: &str) -> String {
    raw.replace('\u{a0}', " ").replace("&nbsp;", " ").trim().to_string()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn is_block(element: &ElementRef) -> bool {
    BLOCK_TAGS.contains(&element.value().name())
}

/// True when another block element sits inside this one (`<li>..<ol><li>..</li></ol></li>`).
fn has_block_descendant(element: &ElementRef) -> bool {
    element.select(&BLOCK_SELECTOR).next().is_some()
}

/// Inline content of a block collected between its nested blocks.
#[derive(Default)]
struct InlineRun {
    text: String,
    html: String,
}

impl InlineRun {
    fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
        self.html.push_str(&escape_html(text));
    }

    fn push_element(&mut self, element: ElementRef) {
        self.text.extend(element.text());
        self.html.push_str(&element.html());
    }

    fn flush(&mut self, blocks: &mut Vec<Block>) {
        let run = std::mem::take(self);
        blocks.extend(Block::from_parts(&run.text, &run.html));
    }
}

/// Walks `parent` in document order. Leaf blocks become one block each; a block
/// that wraps other blocks contributes its own inline content, split around them.
fn collect_blocks(parent: ElementRef, inside_block: bool, blocks: &mut Vec<Block>) {
    let mut run = InlineRun::default();
    for child in parent.children() {
        if let Some(text) = child.value().as_text() {
            if inside_block {
                run.push_text(text);
            }
            continue;
        }
        let Some(element) = ElementRef::wrap(child) else {
            continue;
        };

        let nested = has_block_descendant(&element);
        if is_block(&element) && !nested {
            run.flush(blocks);
            blocks.extend(Block::from_element(element));
        } else if nested {
            run.flush(blocks);
            collect_blocks(element, is_block(&element), blocks);
        } else if inside_block {
            run.push_element(element);
        }
    }
    run.flush(blocks);
}

/// Reads the block stream in document order.
pub fn read_blocks(html: &str) -> Vec<Block> {
    let document = Html::parse_document(html);
    let mut blocks = Vec::new();
    collect_blocks(document.root_element(), false, &mut blocks);
    tracing::debug!("Read {} blocks from {} bytes of markup", blocks.len(), html.len());
    blocks
}

/// The whole document as plain text, one block per line.
pub fn flatten(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

// --- Block Rules ---
// Evaluated in order, first match wins.
type BlockRule = fn(&Block) -> Option<BlockKind>;

const BLOCK_RULES: [(&str, BlockRule); 4] = [
    ("answer-key", match_answer_key_header),
    ("part", match_part_header),
    ("question", match_question_start),
    ("option", match_option),
];

fn match_answer_key_header(block: &Block) -> Option<BlockKind> {
    ANSWER_KEY_HEADING_RE
        .is_match(&block.text)
        .then_some(BlockKind::AnswerKeyHeader)
}

fn match_part_header(block: &Block) -> Option<BlockKind> {
    PART_HEADER_RE.is_match(&block.text).then(|| BlockKind::PartHeader {
        title: block.text.clone(),
    })
}

/// Cuts a leading marker out of the markup; falls back to the escaped plain remainder.
fn strip_marker(html: &str, markup_re: &Regex, plain_rest: &str) -> String {
    let stripped = match markup_re.captures(html) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.end());
            let opening = caps.get(1).map_or("", |m| m.as_str());
            let closing = caps.get(2).map_or("", |m| m.as_str());
            format!("{}{}{}", opening, closing, &html[whole..])
        }
        None => escape_html(plain_rest),
    };
    let cleaned = EMPTY_INLINE_TAG_RE.replace_all(&stripped, "").trim().to_string();
    if cleaned.is_empty() {
        escape_html(plain_rest)
    } else {
        cleaned
    }
}

fn match_question_start(block: &Block) -> Option<BlockKind> {
    let caps = QUESTION_START_RE.captures(&block.text)?;
    let number = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
    Some(BlockKind::QuestionStart {
        number,
        body: strip_marker(&block.html, &QUESTION_MARKUP_RE, rest),
    })
}

#[derive(Debug, Clone, Copy)]
struct InlineMarker {
    letter: char,
    /// Start of the match, the whitespace before the letter for all but the first marker.
    boundary: usize,
    letter_start: usize,
    content_start: usize,
}

/// Markers of an option row: at least two, the first at the start, letters running A, B, C... in order.
fn inline_markers(text: &str) -> Option<Vec<InlineMarker>> {
    let markers: Vec<InlineMarker> = INLINE_OPTION_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let letter = caps.get(1)?;
            Some(InlineMarker {
                letter: letter.as_str().chars().next()?,
                boundary: whole.start(),
                letter_start: letter.start(),
                content_start: whole.end(),
            })
        })
        .collect();

    if markers.len() < 2 || markers[0].letter_start != 0 {
        return None;
    }
    let ascending = markers
        .windows(2)
        .all(|pair| pair[1].letter as u8 == pair[0].letter as u8 + 1);
    ascending.then_some(markers)
}

/// Characters of a markup fragment outside its tags, each mapped back to the markup it came from.
struct VisibleText {
    text: String,
    /// Markup byte range behind each visible byte.
    spans: Vec<(usize, usize)>,
}

impl VisibleText {
    fn of(html: &str) -> Self {
        let mut text = String::new();
        let mut spans = Vec::new();
        let mut idx = 0;
        while idx < html.len() {
            let rest = &html[idx..];
            if rest.starts_with('<') {
                idx += rest.find('>').map_or(rest.len(), |end| end + 1);
                continue;
            }
            let (ch, width) = if rest.starts_with(NBSP_ENTITY) {
                (' ', NBSP_ENTITY.len())
            } else {
                match rest.chars().next() {
                    Some(ch) => (ch, ch.len_utf8()),
                    None => break,
                }
            };
            text.push(ch);
            spans.extend(std::iter::repeat((idx, idx + width)).take(ch.len_utf8()));
            idx += width;
        }
        Self { text, spans }
    }

    /// Markup position just after the visible character at `visible_idx`,
    /// moved past any closing tags that follow it.
    fn cut_after(&self, html: &str, visible_idx: usize) -> usize {
        let mut cut = self.spans.get(visible_idx).map_or(html.len(), |span| span.1);
        while html[cut..].starts_with("</") {
            match html[cut..].find('>') {
                Some(end) => cut += end + 1,
                None => break,
            }
        }
        cut
    }
}

/// Trims whitespace and `&nbsp;` entities from both ends of a markup fragment.
fn trim_fragment(fragment: &str) -> &str {
    let mut trimmed = fragment.trim();
    loop {
        let next = trimmed
            .trim_start_matches(NBSP_ENTITY)
            .trim_end_matches(NBSP_ENTITY)
            .trim();
        if next.len() == trimmed.len() {
            return trimmed;
        }
        trimmed = next;
    }
}

/// True when every opened tag in the fragment is closed inside it.
fn is_balanced(fragment: &str) -> bool {
    let mut open: Vec<String> = Vec::new();
    for caps in TAG_RE.captures_iter(fragment) {
        let whole = caps.get(0).map_or("", |m| m.as_str());
        let closing = caps.get(1).is_some_and(|m| m.as_str() == "/");
        let name = caps.get(2).map_or(String::new(), |m| m.as_str().to_ascii_lowercase());
        if VOID_TAGS.contains(&name.as_str()) || whole.ends_with("/>") {
            continue;
        }
        if closing {
            if open.pop().as_deref() != Some(name.as_str()) {
                return false;
            }
        } else {
            open.push(name);
        }
    }
    open.is_empty()
}

/// Splits "A. 3  B. 4  C. 5" into entries, cutting the markup so formatting stays with each option.
/// Returns None when the markers cannot be located in the markup or a cut would break a tag.
fn split_option_row(block: &Block) -> Option<Vec<OptionEntry>> {
    let plain = inline_markers(&block.text)?;
    let visible = VisibleText::of(&block.html);
    let marked = inline_markers(&visible.text)?;

    let same_letters = plain.len() == marked.len()
        && plain.iter().zip(&marked).all(|(a, b)| a.letter == b.letter);
    if !same_letters {
        tracing::debug!("Option row '{}' could not be located in its markup", block.text);
        return None;
    }

    let mut cuts = vec![0];
    cuts.extend(
        marked
            .iter()
            .skip(1)
            .map(|marker| visible.cut_after(&block.html, marker.boundary)),
    );
    cuts.push(block.html.len());

    let mut entries = Vec::with_capacity(plain.len());
    for (i, marker) in plain.iter().enumerate() {
        let source = trim_fragment(block.html.get(cuts[i]..cuts[i + 1])?);
        if !is_balanced(source) {
            tracing::debug!("Option {} of row '{}' splits a tag; keeping the row whole", marker.letter, block.text);
            return None;
        }
        let plain_end = plain.get(i + 1).map_or(block.text.len(), |next| next.letter_start);
        let plain_rest = block.text[marker.content_start..plain_end].trim();
        entries.push(OptionEntry {
            letter: marker.letter,
            text: strip_marker(source, &OPTION_MARKUP_RE, plain_rest),
            source: source.to_string(),
        });
    }
    Some(entries)
}

fn match_option(block: &Block) -> Option<BlockKind> {
    let caps = OPTION_RE.captures(&block.text)?;
    let letter = caps.get(1)?.as_str().chars().next()?.to_ascii_uppercase();

    if let Some(entries) = split_option_row(block) {
        return Some(BlockKind::OptionRow(entries));
    }

    let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
    Some(BlockKind::OptionMarker {
        letter,
        text: strip_marker(&block.html, &OPTION_MARKUP_RE, rest),
        source: block.html.clone(),
    })
}

/// Classifies one block; anything no rule claims is continuation text.
pub fn classify_block(block: &Block) -> BlockKind {
    BLOCK_RULES
        .iter()
        .find_map(|(name, rule)| {
            let kind = rule(block)?;
            tracing::trace!("Block '{}' matched rule '{}'", block.text, name);
            Some(kind)
        })
        .unwrap_or_else(|| BlockKind::Continuation {
            html: block.html.clone(),
        })
}
