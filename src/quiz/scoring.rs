// src/quiz/scoring.rs
use crate::quiz::models::Question;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Spreads `total` evenly over the questions, two decimals each.
/// The last question absorbs the rounding remainder so the points add up to `total`.
pub fn distribute_even(questions: &mut [Question], total: f64) {
    let count = questions.len();
    if count == 0 {
        return;
    }

    let per_question = round2(total / count as f64);
    let remainder = round2(total - per_question * (count - 1) as f64);

    for (index, question) in questions.iter_mut().enumerate() {
        question.points = if index == count - 1 { remainder } else { per_question };
    }

    tracing::debug!(
        "Distributed {} points over {} questions ({} each, last {})",
        total,
        count,
        per_question,
        remainder
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::models::QuestionType;

    fn blank(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                id: format!("q-{}", i),
                question_type: QuestionType::ShortAnswer,
                part_id: "part-1".to_string(),
                part_title: None,
                text: "x".to_string(),
                options: Vec::new(),
                correct_answer: None,
                true_false_answer: None,
                short_answer_text: Some(String::new()),
                matching_pairs: None,
                points: 0.0,
            })
            .collect()
    }

    #[test]
    fn last_question_takes_the_remainder() {
        let mut questions = blank(3);
        distribute_even(&mut questions, 10.0);
        let points: Vec<f64> = questions.iter().map(|q| q.points).collect();
        assert_eq!(points, vec![3.33, 3.33, 3.34]);
        assert!((points.iter().sum::<f64>() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn even_split_has_no_remainder() {
        let mut questions = blank(4);
        distribute_even(&mut questions, 10.0);
        assert!(questions.iter().all(|q| (q.points - 2.5).abs() < 1e-9));
    }

    #[test]
    fn empty_list_is_untouched() {
        let mut questions = blank(0);
        distribute_even(&mut questions, 10.0);
        assert!(questions.is_empty());
    }
}
