// src/extractors/answer_key.rs

// --- Imports ---
use crate::quiz::{MatchingPair, QuestionType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

// --- Regex Patterns (Lazy Static) ---
// A line that opens the trailing answer-key section: "BẢNG ĐÁP ÁN", "Đáp án:", "ĐÁP ÁN: 1-A, 2-B",
// "ĐÁP ÁN ĐỀ 101". The phrase must end the line or be followed by entries or an upper-case title,
// so a stem such as "Đáp án nào sau đây đúng?" is not a heading. Group 1 is the heading itself.
pub static ANSWER_KEY_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*((?i:bảng[ \t]+)?(?i:đáp[ \t]+án)[ \t]*[:.\-]?)[ \t]*(?:$|\d|\p{Lu}[\p{Lu}\d \t]*$)",
    )
    .expect("Failed to compile ANSWER_KEY_HEADING_RE")
});

// `<number><separator><value>` shapes, tried in order
static ENTRY_RE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // 1-B, 2. Đ, 3: Paris, Câu 4) (1-a, 2-b)
        r"^(?i:câu\s*)?(\d+)\s*[.\-–:=)/]\s*(.+)$",
        // 1 B
        r"^(?i:câu\s*)?(\d+)\s+(.+)$",
        // 1B
        r"^(?i:câu\s*)?(\d+)(\p{L}.*)$",
    ]
    .iter()
    .map(|pat| Regex::new(pat).expect("Failed to compile ENTRY_RE"))
    .collect()
});

// Whitespace followed by the next entry number, as in "1.B 2.C 3.A", "1A 2B 3C" or "1 A  2 B"
static ITEM_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+\d+\s*(?:[.\-–:=)/]|[A-Da-dĐđSsTtFf]\b)").expect("Failed to compile ITEM_BOUNDARY_RE")
});

static CHOICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\(?\s*([A-Da-d])\s*\)?\.?$").expect("Failed to compile CHOICE_RE")
});

static PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(.+?)\s*(?:->|→|-|–|:|=)\s*(.+?)\s*$").expect("Failed to compile PAIR_RE")
});

const TRUE_FALSE_TOKENS: [&str; 8] = ["đ", "đúng", "s", "sai", "t", "true", "f", "false"];

const SEGMENT_SEPARATORS: [char; 6] = [',', ';', '\n', '\r', '|', '\t'];

// --- Data Structures ---
/// A classified answer-key value. The variant is the inferred question type.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerToken {
    /// Zero-based option index (A=0 ... D=3).
    Choice(usize),
    TrueFalse(bool),
    /// Inner text of a parenthesized pair list, plus the pairs it decomposes into.
    Matching { raw: String, pairs: Vec<MatchingPair> },
    ShortAnswer(String),
}

impl AnswerToken {
    pub fn question_type(&self) -> QuestionType {
        match self {
            AnswerToken::Choice(_) => QuestionType::MultipleChoice,
            AnswerToken::TrueFalse(_) => QuestionType::TrueFalse,
            AnswerToken::Matching { .. } => QuestionType::Matching,
            AnswerToken::ShortAnswer(_) => QuestionType::ShortAnswer,
        }
    }
}

/// Question number (1-based, as written) to classified answer.
pub type AnswerKey = BTreeMap<u32, AnswerToken>;

// --- Answer Grammars ---
// Evaluated in order, first match wins. New grammars slot in without touching the others.
type Grammar = fn(&str) -> Option<AnswerToken>;

const ANSWER_GRAMMARS: [(&str, Grammar); 4] = [
    ("choice", classify_choice),
    ("true-false", classify_true_false),
    ("matching", classify_matching),
    ("short-answer", classify_short_answer),
];

/// Maps an A-D letter (either case, optionally parenthesized or followed by '.') to its index.
pub fn choice_index(value: &str) -> Option<usize> {
    let caps = CHOICE_RE.captures(value.trim())?;
    let letter = caps.get(1)?.as_str().chars().next()?.to_ascii_uppercase();
    Some((letter as u8 - b'A') as usize)
}

fn classify_choice(value: &str) -> Option<AnswerToken> {
    choice_index(value).map(AnswerToken::Choice)
}

fn classify_true_false(value: &str) -> Option<AnswerToken> {
    let lowered = value
        .trim()
        .trim_end_matches(['.', '!', ';'])
        .trim_end()
        .to_lowercase();
    if !TRUE_FALSE_TOKENS.contains(&lowered.as_str()) {
        return None;
    }
    match lowered.chars().next()? {
        'đ' | 't' => Some(AnswerToken::TrueFalse(true)),
        _ => Some(AnswerToken::TrueFalse(false)),
    }
}

fn classify_matching(value: &str) -> Option<AnswerToken> {
    let inner = value.trim().strip_prefix('(')?.strip_suffix(')')?.trim();
    if inner.is_empty() {
        return None;
    }
    Some(AnswerToken::Matching {
        raw: inner.to_string(),
        pairs: decompose_pairs(inner),
    })
}

fn classify_short_answer(value: &str) -> Option<AnswerToken> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| AnswerToken::ShortAnswer(trimmed.to_string()))
}

/// Runs the grammar list over one answer value.
pub fn classify_value(value: &str) -> Option<AnswerToken> {
    ANSWER_GRAMMARS.iter().find_map(|(name, grammar)| {
        let token = grammar(value)?;
        tracing::trace!("Answer value '{}' matched grammar '{}'", value, name);
        Some(token)
    })
}

/// Splits "1-a, 2-b; 3 -> c" into left/right pairs. Items without a separator are dropped.
pub fn decompose_pairs(inner: &str) -> Vec<MatchingPair> {
    inner
        .split([',', ';'])
        .filter_map(|item| {
            let caps = PAIR_RE.captures(item)?;
            Some(MatchingPair {
                left: caps.get(1)?.as_str().to_string(),
                right: caps.get(2)?.as_str().to_string(),
            })
        })
        .collect()
}

// --- Segmentation ---
/// Splits on list separators, except inside parentheses.
fn split_segments(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (idx, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if depth == 0 && SEGMENT_SEPARATORS.contains(&c) => {
                segments.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    segments.push(&text[start..]);

    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_entry(segment: &str) -> Option<(u32, &str)> {
    ENTRY_RE.iter().find_map(|re| {
        let caps = re.captures(segment)?;
        let number = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let value = caps.get(2)?.as_str().trim();
        (!value.is_empty()).then_some((number, value))
    })
}

/// "1.B 2.C 3.A" holds several entries separated only by spaces.
/// The split is kept only when every piece is a letter or true/false answer,
/// so free-text answers that happen to contain numbers stay whole.
fn split_inline_entries(segment: &str) -> Vec<&str> {
    let mut cuts: Vec<usize> = ITEM_BOUNDARY_RE.find_iter(segment).map(|m| m.start()).collect();
    if cuts.is_empty() {
        return vec![segment];
    }
    cuts.push(segment.len());

    let mut pieces = Vec::with_capacity(cuts.len());
    let mut start = 0;
    for cut in cuts {
        pieces.push(segment[start..cut].trim());
        start = cut;
    }

    let all_short = pieces.iter().all(|piece| {
        matches!(
            parse_entry(piece).and_then(|(_, value)| classify_value(value)),
            Some(AnswerToken::Choice(_)) | Some(AnswerToken::TrueFalse(_))
        )
    });
    if all_short {
        pieces
    } else {
        vec![segment]
    }
}

/// Scans the flattened document text for the trailing answer key.
/// Returns an empty key when the document has no answer-key heading.
pub fn extract_answer_key(flattened: &str) -> AnswerKey {
    let mut key = AnswerKey::new();

    let heading = match ANSWER_KEY_HEADING_RE.captures(flattened).and_then(|caps| caps.get(1)) {
        Some(m) => m,
        None => {
            tracing::info!("No answer-key heading found; every question defaults to short answer");
            return key;
        }
    };
    let section = &flattened[heading.end()..];
    tracing::debug!("Answer-key section starts at byte {} ({} bytes)", heading.start(), section.len());

    for segment in split_segments(section) {
        for piece in split_inline_entries(segment) {
            let Some((number, value)) = parse_entry(piece) else {
                tracing::trace!("Skipping answer segment with no number: '{}'", piece);
                continue;
            };
            let Some(token) = classify_value(value) else {
                continue;
            };
            if let Some(previous) = key.insert(number, token) {
                // Last entry wins; a conflicting duplicate usually means a typo in the key.
                tracing::warn!(
                    "Answer key lists question {} more than once; replacing {:?} with the later entry",
                    number,
                    previous
                );
            }
        }
    }

    tracing::info!("Answer key holds {} entries", key.len());
    key
}
