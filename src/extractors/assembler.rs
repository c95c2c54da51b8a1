// src/extractors/assembler.rs
//! Question assembly as an explicit state machine.
//!
//! Blocks are fed one at a time through [`transition`], which consumes the
//! current [`AssemblerState`] and returns the next one together with any
//! question finalized by that block. Nothing else is mutated, so every
//! transition can be exercised on its own.

use crate::extractors::answer_key::{choice_index, AnswerKey, AnswerToken};
use crate::extractors::blocks::{BlockKind, OptionEntry};
use crate::quiz::{MatchingPair, Question, QuestionType};

pub const MAX_OPTIONS: usize = 4;

/// Section context for the questions that follow it.
#[derive(Debug, Clone, PartialEq)]
pub struct PartContext {
    pub ordinal: usize,
    pub title: Option<String>,
    /// Whether any question was created under this part yet.
    pub used: bool,
}

impl PartContext {
    /// The implicit part used before any section header.
    pub fn implicit() -> Self {
        Self {
            ordinal: 1,
            title: None,
            used: false,
        }
    }

    pub fn id(&self) -> String {
        format!("part-{}", self.ordinal)
    }

    /// A header before any question replaces the current part; otherwise a new one opens.
    fn enter(self, title: String) -> Self {
        let ordinal = if self.used { self.ordinal + 1 } else { self.ordinal };
        Self {
            ordinal,
            title: Some(title),
            used: false,
        }
    }
}

/// Type-specific part of an in-flight question.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftBody {
    MultipleChoice {
        options: Vec<String>,
        correct: Option<usize>,
    },
    TrueFalse(bool),
    ShortAnswer(String),
    Matching {
        raw: String,
        pairs: Vec<MatchingPair>,
    },
}

impl DraftBody {
    /// Seeds the body from the answer-key entry; no entry means an empty short answer.
    pub fn seeded(entry: Option<&AnswerToken>) -> Self {
        if let Some(token) = entry {
            tracing::trace!("Answer-key entry {:?} reads as {:?}", token, token.question_type());
        }
        match entry {
            Some(AnswerToken::Choice(index)) => DraftBody::MultipleChoice {
                options: Vec::new(),
                correct: Some(*index),
            },
            Some(AnswerToken::TrueFalse(value)) => DraftBody::TrueFalse(*value),
            Some(AnswerToken::Matching { raw, pairs }) => DraftBody::Matching {
                raw: raw.clone(),
                pairs: pairs.clone(),
            },
            Some(AnswerToken::ShortAnswer(text)) => DraftBody::ShortAnswer(text.clone()),
            None => DraftBody::ShortAnswer(String::new()),
        }
    }

    /// Promotion: a short-answer draft that turns out to carry option markers becomes
    /// a multiple-choice draft. This repairs answer keys where a letter answer was
    /// written as free text ("B.", "(c)"); such text becomes the correct answer.
    pub fn promote(self) -> Self {
        match self {
            DraftBody::ShortAnswer(reference) => DraftBody::MultipleChoice {
                options: Vec::new(),
                correct: choice_index(&reference),
            },
            other => other,
        }
    }

    pub fn question_type(&self) -> QuestionType {
        match self {
            DraftBody::MultipleChoice { .. } => QuestionType::MultipleChoice,
            DraftBody::TrueFalse(_) => QuestionType::TrueFalse,
            DraftBody::ShortAnswer(_) => QuestionType::ShortAnswer,
            DraftBody::Matching { .. } => QuestionType::Matching,
        }
    }
}

/// A question being built.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub id: String,
    pub number: u32,
    pub part_id: String,
    pub part_title: Option<String>,
    pub text: String,
    pub body: DraftBody,
}

impl Draft {
    fn append_text(mut self, fragment: &str) -> Self {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return self;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
        self
    }

    fn add_option(mut self, option: &OptionEntry) -> Self {
        if matches!(self.body, DraftBody::ShortAnswer(_)) {
            tracing::debug!(
                "Question {} has option marker '{}' but a short-answer key; promoting to multiple choice",
                self.number,
                option.letter
            );
            self.body = self.body.promote();
        }

        match self.body {
            DraftBody::MultipleChoice { ref mut options, .. } => {
                if options.len() < MAX_OPTIONS {
                    options.push(option.text.clone());
                } else {
                    tracing::debug!(
                        "Question {} already has {} options; ignoring option '{}'",
                        self.number,
                        MAX_OPTIONS,
                        option.letter
                    );
                }
                self
            }
            // True/false and matching items keep option-looking lines as written
            _ => self.append_text(&option.source),
        }
    }

    fn add_continuation(self, html: &str) -> Self {
        if let DraftBody::MultipleChoice { ref options, .. } = self.body {
            if options.len() >= MAX_OPTIONS {
                tracing::trace!("Question {} is complete; ignoring trailing text", self.number);
                return self;
            }
        }
        self.append_text(html)
    }

    /// Freezes the draft. An answer index outside the collected options is dropped.
    pub fn finish(self) -> Question {
        let question_type = self.body.question_type();
        let mut question = Question {
            id: self.id,
            question_type,
            part_id: self.part_id,
            part_title: self.part_title,
            text: self.text,
            options: Vec::new(),
            correct_answer: None,
            true_false_answer: None,
            short_answer_text: None,
            matching_pairs: None,
            points: 0.0,
        };

        match self.body {
            DraftBody::MultipleChoice { options, correct } => {
                question.correct_answer = match correct {
                    Some(index) if index >= options.len() => {
                        tracing::warn!(
                            "Question {} answer index {} is outside its {} options; leaving it unset",
                            self.number,
                            index,
                            options.len()
                        );
                        None
                    }
                    other => other,
                };
                question.options = options;
            }
            DraftBody::TrueFalse(value) => question.true_false_answer = Some(value),
            DraftBody::ShortAnswer(text) => question.short_answer_text = Some(text),
            DraftBody::Matching { raw, pairs } => {
                if pairs.is_empty() {
                    tracing::warn!("Question {} matching answer '({})' has no left-right pairs", self.number, raw);
                }
                question.matching_pairs = Some(pairs);
            }
        }
        question
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuilderState {
    Idle,
    Building(Draft),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblerState {
    pub builder: BuilderState,
    pub part: PartContext,
    /// Questions created so far; also the ordinal of the next one.
    pub created: usize,
    /// Set once the answer-key heading is reached.
    pub halted: bool,
}

impl Default for AssemblerState {
    fn default() -> Self {
        Self {
            builder: BuilderState::Idle,
            part: PartContext::implicit(),
            created: 0,
            halted: false,
        }
    }
}

/// Read-only inputs shared by every transition of one parse.
pub struct AssemblyEnv<'a> {
    pub answer_key: &'a AnswerKey,
    /// Per-parse id prefix; question ids are `<prefix>-<ordinal>`.
    pub id_prefix: &'a str,
}

#[derive(Debug)]
pub struct Step {
    pub state: AssemblerState,
    pub emitted: Option<Question>,
}

impl Step {
    fn stay(state: AssemblerState) -> Self {
        Self { state, emitted: None }
    }
}

/// Applies one classified block to the state.
pub fn transition(state: AssemblerState, kind: BlockKind, env: &AssemblyEnv) -> Step {
    if state.halted {
        return Step::stay(state);
    }

    match kind {
        BlockKind::AnswerKeyHeader => {
            tracing::debug!("Reached answer-key heading; remaining blocks are ignored");
            Step::stay(AssemblerState { halted: true, ..state })
        }
        BlockKind::PartHeader { title } => {
            tracing::debug!("Entering part '{}'", title);
            let part = state.part.clone().enter(title);
            Step::stay(AssemblerState { part, ..state })
        }
        BlockKind::QuestionStart { number, body } => {
            let AssemblerState { builder, part, created, halted } = state;
            let emitted = match builder {
                BuilderState::Building(draft) => Some(draft.finish()),
                BuilderState::Idle => None,
            };

            let entry = env.answer_key.get(&number);
            if entry.is_none() {
                tracing::debug!("Question {} has no answer-key entry; defaulting to short answer", number);
            }
            let draft = Draft {
                id: format!("{}-{}", env.id_prefix, created),
                number,
                part_id: part.id(),
                part_title: part.title.clone(),
                text: body.trim().to_string(),
                body: DraftBody::seeded(entry),
            };
            tracing::trace!("Started question {} as {:?}", number, draft.body.question_type());

            Step {
                state: AssemblerState {
                    builder: BuilderState::Building(draft),
                    part: PartContext { used: true, ..part },
                    created: created + 1,
                    halted,
                },
                emitted,
            }
        }
        BlockKind::OptionMarker { letter, text, source } => {
            apply_options(state, vec![OptionEntry { letter, text, source }])
        }
        BlockKind::OptionRow(entries) => apply_options(state, entries),
        BlockKind::Continuation { html } => {
            let AssemblerState { builder, part, created, halted } = state;
            let builder = match builder {
                BuilderState::Building(draft) => BuilderState::Building(draft.add_continuation(&html)),
                // Title lines and instructions before the first question
                BuilderState::Idle => BuilderState::Idle,
            };
            Step::stay(AssemblerState { builder, part, created, halted })
        }
    }
}

fn apply_options(state: AssemblerState, entries: Vec<OptionEntry>) -> Step {
    let AssemblerState { builder, part, created, halted } = state;
    let builder = match builder {
        BuilderState::Building(draft) => {
            BuilderState::Building(entries.iter().fold(draft, Draft::add_option))
        }
        BuilderState::Idle => {
            tracing::trace!("Option marker outside any question; ignoring");
            BuilderState::Idle
        }
    };
    Step::stay(AssemblerState { builder, part, created, halted })
}

/// Ends the stream: emits the in-flight question if it has any text.
pub fn finish(state: AssemblerState) -> Option<Question> {
    match state.builder {
        BuilderState::Building(draft) if !draft.text.trim().is_empty() => Some(draft.finish()),
        BuilderState::Building(draft) => {
            tracing::debug!("Dropping trailing question {} with empty text", draft.number);
            None
        }
        BuilderState::Idle => None,
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::blocks::{classify_block, Block};

    fn env_with(key: &AnswerKey) -> AssemblyEnv<'_> {
        AssemblyEnv { answer_key: key, id_prefix: "q-test" }
    }

    fn start(number: u32, body: &str) -> BlockKind {
        BlockKind::QuestionStart { number, body: body.to_string() }
    }

    fn option(letter: char, text: &str) -> BlockKind {
        BlockKind::OptionMarker {
            letter,
            text: text.to_string(),
            source: format!("{}. {}", letter, text),
        }
    }

    fn text(html: &str) -> BlockKind {
        BlockKind::Continuation { html: html.to_string() }
    }

    fn draft_of(state: &AssemblerState) -> &Draft {
        match &state.builder {
            BuilderState::Building(draft) => draft,
            BuilderState::Idle => panic!("expected a question in progress"),
        }
    }

    #[test]
    fn question_start_seeds_type_from_key() {
        let mut key = AnswerKey::new();
        key.insert(1, AnswerToken::TrueFalse(false));
        let env = env_with(&key);

        let step = transition(AssemblerState::default(), start(1, "Trời xanh?"), &env);
        assert!(step.emitted.is_none());
        let draft = draft_of(&step.state);
        assert_eq!(draft.body, DraftBody::TrueFalse(false));
        assert_eq!(draft.id, "q-test-0");
        assert_eq!(draft.part_id, "part-1");
        assert_eq!(step.state.created, 1);
    }

    #[test]
    fn next_question_start_emits_previous() {
        let key = AnswerKey::new();
        let env = env_with(&key);

        let step = transition(AssemblerState::default(), start(1, "first"), &env);
        let step = transition(step.state, start(2, "second"), &env);
        let emitted = step.emitted.expect("first question emitted");
        assert_eq!(emitted.text, "first");
        assert_eq!(emitted.question_type, QuestionType::ShortAnswer);
        assert_eq!(emitted.short_answer_text.as_deref(), Some(""));
        assert_eq!(draft_of(&step.state).id, "q-test-1");
    }

    #[test]
    fn promotion_turns_short_answer_into_choice() {
        let mut key = AnswerKey::new();
        key.insert(1, AnswerToken::ShortAnswer("C.".to_string()));
        let env = env_with(&key);

        let mut state = transition(AssemblerState::default(), start(1, "Pick"), &env).state;
        for (letter, value) in [('A', "1"), ('B', "2"), ('C', "3"), ('D', "4")] {
            state = transition(state, option(letter, value), &env).state;
        }
        let question = finish(state).expect("question");
        assert_eq!(question.question_type, QuestionType::MultipleChoice);
        assert_eq!(question.options, vec!["1", "2", "3", "4"]);
        assert_eq!(question.correct_answer, Some(2));
        assert!(question.short_answer_text.is_none());
    }

    #[test]
    fn promotion_without_letter_leaves_answer_unset() {
        assert_eq!(
            DraftBody::ShortAnswer("Paris".to_string()).promote(),
            DraftBody::MultipleChoice { options: Vec::new(), correct: None }
        );
        assert_eq!(DraftBody::TrueFalse(true).promote(), DraftBody::TrueFalse(true));
    }

    #[test]
    fn fifth_option_and_trailing_text_are_ignored() {
        let mut key = AnswerKey::new();
        key.insert(1, AnswerToken::Choice(0));
        let env = env_with(&key);

        let mut state = transition(AssemblerState::default(), start(1, "Q"), &env).state;
        for letter in ['A', 'B', 'C', 'D', 'A'] {
            state = transition(state, option(letter, &letter.to_string()), &env).state;
        }
        state = transition(state, text("footer"), &env).state;
        let question = finish(state).expect("question");
        assert_eq!(question.options.len(), MAX_OPTIONS);
        assert_eq!(question.text, "Q");
    }

    #[test]
    fn continuation_joins_with_single_space() {
        let key = AnswerKey::new();
        let env = env_with(&key);

        let mut state = transition(AssemblerState::default(), start(1, "Cho hình vẽ:"), &env).state;
        state = transition(state, text("<img src=\"a.png\">"), &env).state;
        state = transition(state, text("Tính diện tích."), &env).state;
        assert_eq!(draft_of(&state).text, "Cho hình vẽ: <img src=\"a.png\"> Tính diện tích.");
    }

    #[test]
    fn options_on_true_false_items_become_text() {
        let mut key = AnswerKey::new();
        key.insert(1, AnswerToken::TrueFalse(true));
        let env = env_with(&key);

        let mut state = transition(AssemblerState::default(), start(1, "Nhận định:"), &env).state;
        state = transition(state, option('A', "x &gt; 0"), &env).state;
        let question = finish(state).expect("question");
        assert_eq!(question.question_type, QuestionType::TrueFalse);
        assert_eq!(question.text, "Nhận định: A. x &gt; 0");
    }

    #[test]
    fn true_false_sub_statements_keep_their_markup() {
        let mut key = AnswerKey::new();
        key.insert(1, AnswerToken::TrueFalse(true));
        let env = env_with(&key);

        let line = classify_block(&Block::new("a) x > 0", "a) <em>x</em> &gt; 0"));
        let mut state = transition(AssemblerState::default(), start(1, "Xét các mệnh đề:"), &env).state;
        state = transition(state, line, &env).state;
        let question = finish(state).expect("question");
        assert_eq!(question.text, "Xét các mệnh đề: a) <em>x</em> &gt; 0");
        assert!(question.options.is_empty());
    }

    #[test]
    fn answer_key_heading_halts() {
        let key = AnswerKey::new();
        let env = env_with(&key);

        let mut state = transition(AssemblerState::default(), start(1, "Q"), &env).state;
        state = transition(state, BlockKind::AnswerKeyHeader, &env).state;
        let step = transition(state, start(2, "ignored"), &env);
        assert!(step.emitted.is_none());
        assert!(step.state.halted);
        assert_eq!(finish(step.state).map(|q| q.text), Some("Q".to_string()));
    }

    #[test]
    fn part_headers_number_parts_in_encounter_order() {
        let key = AnswerKey::new();
        let env = env_with(&key);

        // Header before any question replaces the implicit part
        let mut state = transition(AssemblerState::default(), BlockKind::PartHeader { title: "PHẦN I".into() }, &env).state;
        state = transition(state, start(1, "a"), &env).state;
        state = transition(state, BlockKind::PartHeader { title: "PHẦN II".into() }, &env).state;
        let step = transition(state, start(2, "b"), &env);

        let first = step.emitted.expect("first question");
        assert_eq!(first.part_id, "part-1");
        assert_eq!(first.part_title.as_deref(), Some("PHẦN I"));
        let second = draft_of(&step.state);
        assert_eq!(second.part_id, "part-2");
        assert_eq!(second.part_title.as_deref(), Some("PHẦN II"));
    }

    #[test]
    fn out_of_range_answer_is_cleared() {
        let mut key = AnswerKey::new();
        key.insert(1, AnswerToken::Choice(3));
        let env = env_with(&key);

        let mut state = transition(AssemblerState::default(), start(1, "Q"), &env).state;
        state = transition(state, option('A', "x"), &env).state;
        state = transition(state, option('B', "y"), &env).state;
        let question = finish(state).expect("question");
        assert_eq!(question.options.len(), 2);
        assert_eq!(question.correct_answer, None);
    }

    #[test]
    fn empty_trailing_question_is_dropped() {
        let key = AnswerKey::new();
        let env = env_with(&key);

        let state = transition(AssemblerState::default(), start(1, ""), &env).state;
        assert!(finish(state).is_none());
    }

    #[test]
    fn idle_ignores_text_and_options() {
        let key = AnswerKey::new();
        let env = env_with(&key);

        let state = transition(AssemblerState::default(), text("ĐỀ THI THỬ"), &env).state;
        let state = transition(state, option('A', "stray"), &env).state;
        assert_eq!(state, AssemblerState::default());
    }
}
