//! Grade aggregation: totals, percentage, banded feedback, and
//! strengths / areas-for-improvement.

use crate::model::{QuestionGrade, ValidationResult};

/// Points available per question.
pub const MAX_SCORE_PER_QUESTION: f64 = 10.0;
/// A question scoring at least this is correct, and counts as a strength.
pub const CORRECT_THRESHOLD: f64 = 8.0;
/// A question scoring below this is an area for improvement.
pub const IMPROVEMENT_THRESHOLD: f64 = 6.0;

const GENERIC_STRENGTH: &str = "Careful problem solving on the questions you got right";
const GENERIC_IMPROVEMENT: &str = "Reviewing the steps of the questions you missed";

/// Operation vocabulary used to name strengths and weaknesses.
const SKILL_VOCABULARY: &[(&str, &[&str])] = &[
    ("addition", &["add", "plus", "sum", "total", "altogether", "+"]),
    ("subtraction", &["subtract", "minus", "difference", "left", "fewer", "take away", " - "]),
    ("multiplication", &["multiply", "times", "product", "×", "*", "each row"]),
    ("division", &["divide", "divided", "quotient", "share", "split", "÷", "equal groups"]),
    ("fractions", &["fraction", "numerator", "denominator", "half", "quarter", "third"]),
    ("decimals", &["decimal", "tenths", "hundredths"]),
];

pub fn is_correct(score: f64) -> bool {
    score >= CORRECT_THRESHOLD
}

/// round(total / max × 100), or 0 for an empty set.
pub fn percentage(total: f64, max: f64) -> u32 {
    if max <= 0.0 {
        return 0;
    }
    (total / max * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Encouraging summary chosen by percentage band.
pub fn overall_feedback(percentage: u32, correct: usize, total: usize) -> String {
    match percentage {
        90.. => format!(
            "Excellent work! You answered {correct} out of {total} questions correctly and showed a strong understanding."
        ),
        75..=89 => format!(
            "Great job! You answered {correct} out of {total} questions correctly. A little more practice will make you even stronger."
        ),
        60..=74 => format!(
            "Good effort! You answered {correct} out of {total} questions correctly. Review the questions you missed to build confidence."
        ),
        _ => format!(
            "Keep practicing! You answered {correct} out of {total} questions correctly. Work through the explanations and try again."
        ),
    }
}

fn matches_keyword(text: &str, keyword: &str) -> bool {
    if keyword.chars().all(|c| c.is_alphabetic() || c == ' ') {
        // Word keywords match at word starts ("adding" counts for "add").
        let mut rest = text;
        while let Some(pos) = rest.find(keyword) {
            let at_word_start = rest[..pos]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric());
            if at_word_start {
                return true;
            }
            rest = &rest[pos + keyword.len()..];
        }
        false
    } else {
        text.contains(keyword)
    }
}

/// Skills whose vocabulary appears in a question.
pub fn detect_skills(question_text: &str) -> Vec<&'static str> {
    let text = question_text.to_lowercase();
    SKILL_VOCABULARY
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| matches_keyword(&text, k)))
        .map(|(skill, _)| *skill)
        .collect()
}

fn push_unique(list: &mut Vec<String>, item: String) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Derive strengths and areas for improvement from graded questions.
///
/// Each entry of `graded` pairs the question text with its grade.
pub fn skill_summary(graded: &[(&str, &QuestionGrade)]) -> (Vec<String>, Vec<String>) {
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();
    let mut any_strong = false;
    let mut any_weak = false;

    for (text, grade) in graded {
        if grade.score >= CORRECT_THRESHOLD {
            any_strong = true;
            for skill in detect_skills(text) {
                push_unique(&mut strengths, format!("Strong {skill} skills"));
            }
        } else if grade.score < IMPROVEMENT_THRESHOLD {
            any_weak = true;
            for skill in detect_skills(text) {
                push_unique(&mut improvements, format!("Practice {skill}"));
            }
        }
    }

    if any_strong && strengths.is_empty() {
        strengths.push(GENERIC_STRENGTH.to_string());
    }
    if any_weak && improvements.is_empty() {
        improvements.push(GENERIC_IMPROVEMENT.to_string());
    }
    (strengths, improvements)
}

/// Assemble the final result from per-question grades.
///
/// `question_texts` must be index-aligned with `grades`.
pub fn aggregate(question_texts: &[&str], grades: Vec<QuestionGrade>) -> ValidationResult {
    let total_score: f64 = grades.iter().map(|g| g.score).sum();
    let max_score = MAX_SCORE_PER_QUESTION * grades.len() as f64;
    let percentage_score = percentage(total_score, max_score);
    let correct = grades.iter().filter(|g| g.is_correct).count();

    let paired: Vec<(&str, &QuestionGrade)> = question_texts
        .iter()
        .copied()
        .zip(grades.iter())
        .collect();
    let (strengths, areas_for_improvement) = skill_summary(&paired);

    ValidationResult {
        total_score,
        max_score,
        percentage_score,
        overall_feedback: overall_feedback(percentage_score, correct, grades.len()),
        questions: grades,
        strengths,
        areas_for_improvement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(id: &str, score: f64) -> QuestionGrade {
        QuestionGrade {
            question_id: id.into(),
            score,
            max_score: MAX_SCORE_PER_QUESTION,
            feedback: "ok".into(),
            is_correct: is_correct(score),
        }
    }

    #[test]
    fn percentage_rounds() {
        assert_eq!(percentage(9.0, 10.0), 90);
        assert_eq!(percentage(17.0, 30.0), 57);
        assert_eq!(percentage(2.0, 30.0), 7);
        assert_eq!(percentage(0.0, 0.0), 0);
    }

    #[test]
    fn feedback_bands() {
        assert!(overall_feedback(90, 1, 1).starts_with("Excellent work!"));
        assert!(overall_feedback(89, 8, 10).starts_with("Great job!"));
        assert!(overall_feedback(75, 3, 4).starts_with("Great job!"));
        assert!(overall_feedback(60, 3, 5).starts_with("Good effort!"));
        assert!(overall_feedback(59, 2, 5).starts_with("Keep practicing!"));
        assert!(overall_feedback(59, 2, 5).contains("2 out of 5"));
    }

    #[test]
    fn skill_detection() {
        assert_eq!(detect_skills("What is 5 + 3?"), vec!["addition"]);
        assert_eq!(detect_skills("Maya shares 12 cookies among 4 friends."), vec!["division"]);
        assert_eq!(detect_skills("What is 6 × 7?"), vec!["multiplication"]);
        assert!(detect_skills("Name a shape with 4 sides.").is_empty());
        assert_eq!(detect_skills("Try adding 4 and 5."), vec!["addition"]);
        // Keywords only match at word starts.
        assert!(detect_skills("Maddie drew a map.").is_empty());
    }

    #[test]
    fn strengths_and_improvements_are_deduplicated() {
        let a = grade("1", 9.0);
        let b = grade("2", 10.0);
        let c = grade("3", 3.0);
        let d = grade("4", 7.0);
        let graded = vec![
            ("What is 5 + 3?", &a),
            ("Add 10 and 4.", &b),
            ("What is 9 - 4?", &c),
            ("What is 6 × 7?", &d),
        ];
        let (strengths, improvements) = skill_summary(&graded);
        assert_eq!(strengths, vec!["Strong addition skills"]);
        assert_eq!(improvements, vec!["Practice subtraction"]);
    }

    #[test]
    fn generic_fallbacks_when_no_keyword_matches() {
        let strong = grade("1", 8.0);
        let weak = grade("2", 1.0);
        let graded = vec![("Name a shape.", &strong), ("Count the dots.", &weak)];
        let (strengths, improvements) = skill_summary(&graded);
        assert_eq!(strengths, vec![GENERIC_STRENGTH]);
        assert_eq!(improvements, vec![GENERIC_IMPROVEMENT]);
    }

    #[test]
    fn middle_band_contributes_nothing() {
        let mid = grade("1", 7.0);
        let (strengths, improvements) = skill_summary(&[("What is 5 + 3?", &mid)]);
        assert!(strengths.is_empty());
        assert!(improvements.is_empty());
    }

    #[test]
    fn aggregate_single_nine() {
        let result = aggregate(&["What is 5 + 3?"], vec![grade("q1", 9.0)]);
        assert_eq!(result.total_score, 9.0);
        assert_eq!(result.max_score, 10.0);
        assert_eq!(result.percentage_score, 90);
        assert!(result.questions[0].is_correct);
        assert!(result.overall_feedback.starts_with("Excellent work!"));
        assert!(result.overall_feedback.contains("1 out of 1"));
        assert_eq!(result.strengths, vec!["Strong addition skills"]);
    }
}
