//! Parsing of free-text LLM replies.
//!
//! Question replies go through three layers, each a pure function returning
//! `Result<ParsedQuestion, ParseMiss>`:
//!
//! 1. [`parse_labeled`]: `Question:` / `Answer:` / `Explanation:` lines
//! 2. [`parse_equation`]: a bare `a op b = c` equation
//! 3. [`parse_raw`]: the whole reply becomes the question, answer 0
//!
//! [`parse_question_response`] chains them with `or_else`. Grading replies
//! use [`extract_json_object`].

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-?\d{1,3}(?:,\d{3})+(?:\.\d+)?|-?\d+(?:\.\d+)?(?:\s*/\s*\d+)?")
        .expect("valid regex")
});

static EQUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(-?\d+(?:\.\d+)?)\s*([+\-*/×÷xX])\s*(-?\d+(?:\.\d+)?)\s*=\s*(-?\d+(?:\.\d+)?)",
    )
    .expect("valid regex")
});

/// A question reconstructed from an LLM reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuestion {
    pub question: String,
    pub answer: f64,
    pub explanation: Option<String>,
}

/// Why a parsing layer could not handle a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseMiss {
    #[error("reply is empty")]
    Empty,
    #[error("no `{0}:` line found")]
    MissingLabel(&'static str),
    #[error("answer `{0}` is not a number")]
    NonNumericAnswer(String),
    #[error("no `a op b = c` equation found")]
    NoEquation,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Label {
    Question,
    Answer,
    Explanation,
}

/// Strip list markers and markdown emphasis, then match a known label.
fn split_label(line: &str) -> Option<(Label, &str)> {
    let trimmed = line
        .trim()
        .trim_start_matches(['-', '*', '#', '>', ' '])
        .trim_start_matches("**");
    let (head, rest) = trimmed.split_once(':')?;
    let head = head.trim().trim_matches('*').trim();
    let label = if head.eq_ignore_ascii_case("question") {
        Label::Question
    } else if head.eq_ignore_ascii_case("answer") {
        Label::Answer
    } else if head.eq_ignore_ascii_case("explanation") {
        Label::Explanation
    } else {
        return None;
    };
    Some((label, rest.trim().trim_start_matches("**").trim()))
}

/// Parse the first number in `text`. Handles thousands separators, decimals,
/// and simple `a/b` fractions.
pub fn parse_number(text: &str) -> Option<f64> {
    let found = NUMBER.find(text)?.as_str();
    if let Some((num, den)) = found.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    found.replace(',', "").parse().ok()
}

/// Layer 1: labeled lines, case-insensitive. Text following a label runs
/// until the next label, so multi-line questions and explanations survive.
pub fn parse_labeled(text: &str) -> Result<ParsedQuestion, ParseMiss> {
    if text.trim().is_empty() {
        return Err(ParseMiss::Empty);
    }

    let mut question: Option<String> = None;
    let mut answer: Option<String> = None;
    let mut explanation: Option<String> = None;
    let mut current: Option<Label> = None;

    for line in text.lines() {
        if let Some((label, rest)) = split_label(line) {
            let slot = match label {
                Label::Question => &mut question,
                Label::Answer => &mut answer,
                Label::Explanation => &mut explanation,
            };
            // First occurrence wins; a repeated label ends the block.
            if slot.is_some() {
                current = None;
                continue;
            }
            *slot = Some(rest.to_string());
            current = Some(label);
            continue;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let slot = match current {
            Some(Label::Question) => &mut question,
            Some(Label::Explanation) => &mut explanation,
            // Answers are single-line.
            Some(Label::Answer) | None => continue,
        };
        if let Some(existing) = slot.as_mut() {
            if !existing.is_empty() {
                existing.push(' ');
            }
            existing.push_str(line);
        }
    }

    let question = question
        .filter(|q| !q.is_empty())
        .ok_or(ParseMiss::MissingLabel("Question"))?;
    let raw_answer = answer.ok_or(ParseMiss::MissingLabel("Answer"))?;
    let answer = parse_number(&raw_answer).ok_or(ParseMiss::NonNumericAnswer(raw_answer))?;

    Ok(ParsedQuestion {
        question,
        answer,
        explanation: explanation.filter(|e| !e.is_empty()),
    })
}

/// Layer 2: rebuild a minimal question from a bare equation.
pub fn parse_equation(text: &str) -> Result<ParsedQuestion, ParseMiss> {
    let caps = EQUATION.captures(text).ok_or(ParseMiss::NoEquation)?;
    let answer: f64 = caps[4]
        .parse()
        .map_err(|_| ParseMiss::NonNumericAnswer(caps[4].to_string()))?;
    Ok(ParsedQuestion {
        question: format!("What is {} {} {}?", &caps[1], &caps[2], &caps[3]),
        answer,
        explanation: None,
    })
}

/// Layer 3: take the reply verbatim.
pub fn parse_raw(text: &str) -> Result<ParsedQuestion, ParseMiss> {
    let question = text.trim();
    if question.is_empty() {
        return Err(ParseMiss::Empty);
    }
    Ok(ParsedQuestion {
        question: question.to_string(),
        answer: 0.0,
        explanation: None,
    })
}

/// Run all three layers in order.
pub fn parse_question_response(text: &str) -> Result<ParsedQuestion, ParseMiss> {
    parse_labeled(text)
        .or_else(|miss| {
            tracing::debug!("labeled parse missed ({miss}), trying equation");
            parse_equation(text)
        })
        .or_else(|_| parse_raw(text))
}

/// Return the first balanced `{...}` object in `text`, if any.
///
/// Braces inside JSON strings are ignored. An unclosed object yields `None`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeled_basic() {
        let parsed = parse_question_response("Question: Q\nAnswer: 8\nExplanation: E").unwrap();
        assert_eq!(
            parsed,
            ParsedQuestion {
                question: "Q".into(),
                answer: 8.0,
                explanation: Some("E".into()),
            }
        );
    }

    #[test]
    fn labeled_case_insensitive_with_markdown() {
        let reply = "Sure! Here you go.\n\n**QUESTION:** Maya has 3 apples and buys 4 more. How many now?\n- answer: 7 apples\n**Explanation:** 3 + 4 = 7.\nShe ends with seven.";
        let parsed = parse_labeled(reply).unwrap();
        assert_eq!(
            parsed.question,
            "Maya has 3 apples and buys 4 more. How many now?"
        );
        assert_eq!(parsed.answer, 7.0);
        assert_eq!(
            parsed.explanation.as_deref(),
            Some("3 + 4 = 7. She ends with seven.")
        );
    }

    #[test]
    fn labeled_without_explanation() {
        let parsed = parse_labeled("Question: What is 9 - 4?\nAnswer: 5").unwrap();
        assert_eq!(parsed.answer, 5.0);
        assert!(parsed.explanation.is_none());
    }

    #[test]
    fn labeled_requires_numeric_answer() {
        let miss = parse_labeled("Question: Pick one\nAnswer: seven").unwrap_err();
        assert_eq!(miss, ParseMiss::NonNumericAnswer("seven".into()));
    }

    #[test]
    fn labeled_missing_answer() {
        assert_eq!(
            parse_labeled("Question: What is 2 + 2?").unwrap_err(),
            ParseMiss::MissingLabel("Answer")
        );
    }

    #[test]
    fn equation_fallback() {
        let parsed = parse_question_response("5 + 3 = 8").unwrap();
        assert_eq!(parsed.question, "What is 5 + 3?");
        assert_eq!(parsed.answer, 8.0);
        assert!(parsed.explanation.is_none());
    }

    #[test]
    fn equation_inside_prose() {
        let parsed = parse_equation("Try this one: 12 × 3 = 36, good luck!").unwrap();
        assert_eq!(parsed.question, "What is 12 × 3?");
        assert_eq!(parsed.answer, 36.0);
    }

    #[test]
    fn raw_fallback() {
        let parsed = parse_question_response("  How many legs do 3 spiders have?  ").unwrap();
        assert_eq!(parsed.question, "How many legs do 3 spiders have?");
        assert_eq!(parsed.answer, 0.0);
    }

    #[test]
    fn empty_reply_is_a_miss() {
        assert_eq!(parse_question_response("   \n"), Err(ParseMiss::Empty));
    }

    #[test]
    fn number_formats() {
        assert_eq!(parse_number("1,250 marbles"), Some(1250.0));
        assert_eq!(parse_number("about 2.75"), Some(2.75));
        assert_eq!(parse_number("3/4 of the pizza"), Some(0.75));
        assert_eq!(parse_number("-6"), Some(-6.0));
        assert_eq!(parse_number("5/0"), None);
        assert_eq!(parse_number("none"), None);
    }

    #[test]
    fn json_object_extraction() {
        let reply = "Here is my grade:\n```json\n{\"score\": 9, \"feedback\": \"Nice {work}\", \"isCorrect\": true}\n```\n{\"ignored\": 1}";
        assert_eq!(
            extract_json_object(reply),
            Some("{\"score\": 9, \"feedback\": \"Nice {work}\", \"isCorrect\": true}")
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{\"score\": 9"), None);
    }

    #[test]
    fn json_nested_and_escaped() {
        let reply = r#"{"a": {"b": "quote \" and }"}, "c": 1} trailing"#;
        assert_eq!(
            extract_json_object(reply),
            Some(r#"{"a": {"b": "quote \" and }"}, "c": 1}"#)
        );
    }
}
