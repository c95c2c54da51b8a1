// src/quiz/models.rs
use serde::{Deserialize, Serialize};

/// Kind of exam item. Serialized the way the quiz editor stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Matching,
}

impl QuestionType {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::Matching => "matching",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingPair {
    pub left: String,
    pub right: String,
}

/// One exam item as produced by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub part_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_title: Option<String>,
    pub text: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub true_false_answer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_answer_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matching_pairs: Option<Vec<MatchingPair>>,
    pub points: f64,
}

/// Output of one extraction: the questions in document order plus a title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuiz {
    pub title: String,
    pub questions: Vec<Question>,
}

impl ParsedQuiz {
    /// Number of questions of the given type.
    pub fn count_of(&self, question_type: QuestionType) -> usize {
        self.questions
            .iter()
            .filter(|q| q.question_type == question_type)
            .count()
    }

    /// Part ids in first-encounter order, without repeats.
    pub fn part_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for question in &self.questions {
            if !ids.contains(&question.part_id.as_str()) {
                ids.push(&question.part_id);
            }
        }
        ids
    }

    pub fn total_points(&self) -> f64 {
        self.questions.iter().map(|q| q.points).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str, part: &str, question_type: QuestionType) -> Question {
        Question {
            id: id.to_string(),
            question_type,
            part_id: part.to_string(),
            part_title: None,
            text: "stem".to_string(),
            options: Vec::new(),
            correct_answer: None,
            true_false_answer: None,
            short_answer_text: None,
            matching_pairs: None,
            points: 0.0,
        }
    }

    #[test]
    fn serializes_with_editor_field_names() {
        let mut q = question("q-1", "part-1", QuestionType::MultipleChoice);
        q.options = vec!["3".to_string(), "4".to_string()];
        q.correct_answer = Some(1);

        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["type"], "MULTIPLE_CHOICE");
        assert_eq!(json["partId"], "part-1");
        assert_eq!(json["correctAnswer"], 1);
        assert!(json.get("trueFalseAnswer").is_none());
        assert!(json.get("partTitle").is_none());
    }

    #[test]
    fn part_ids_keep_encounter_order() {
        let quiz = ParsedQuiz {
            title: "t".to_string(),
            questions: vec![
                question("a", "part-2", QuestionType::ShortAnswer),
                question("b", "part-1", QuestionType::TrueFalse),
                question("c", "part-2", QuestionType::ShortAnswer),
            ],
        };
        assert_eq!(quiz.part_ids(), vec!["part-2", "part-1"]);
        assert_eq!(quiz.count_of(QuestionType::ShortAnswer), 2);
        assert_eq!(quiz.count_of(QuestionType::Matching), 0);
    }
}
